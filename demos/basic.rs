//! Basic example — downloads the model and synthesises speech to a WAV file.
//!
//! Usage:
//!   cargo run --example basic --features espeak
//!   cargo run --example basic --features espeak -- --voice af --text "Hello from Rust!"
//!
//! Requirements:
//!   - libespeak-ng (apt install libespeak-ng-dev / brew install espeak-ng)
//!   - Internet access for the first run (model is cached afterwards)

use kokorotts::{download, OutputName, SynthesisDriver};

fn main() -> anyhow::Result<()> {
    // ── Parse simple CLI arguments ───────────────────────────────────────────
    let mut args = std::env::args().skip(1);

    let mut model_id = "kokorotts/kokoro-onnx".to_string();
    let mut voice    = "af".to_string();
    let mut text     = "How could I know? It's an unanswerable question.".to_string();
    let mut out_dir  = "outputs".to_string();
    let mut budget   = kokorotts::DEFAULT_CHUNK_BUDGET;
    let mut stamped  = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--model"       => { if let Some(v) = args.next() { model_id = v; } }
            "--voice"       => { if let Some(v) = args.next() { voice    = v; } }
            "--text"        => { if let Some(v) = args.next() { text     = v; } }
            "--output-dir"  => { if let Some(v) = args.next() { out_dir  = v; } }
            "--budget"      => { if let Some(v) = args.next() { budget   = v.parse().unwrap_or(budget); } }
            "--timestamped" => { stamped = true; }
            "--help"        => {
                println!(
                    "Usage: basic [--model REPO_ID] [--voice NAME] [--text TEXT] \
                     [--output-dir DIR] [--budget N] [--timestamped]"
                );
                return Ok(());
            }
            _ => {}
        }
    }

    // ── Check espeak-ng ──────────────────────────────────────────────────────
    if !kokorotts::phonemize::is_espeak_available() {
        eprintln!(
            "WARNING: libespeak-ng failed to initialise.\n\
             Install with:  apt install libespeak-ng-dev  (Debian/Ubuntu)\n\
             Or:            brew install espeak-ng  (macOS)"
        );
    }

    // ── Download / load model ────────────────────────────────────────────────
    println!("Model  : {}", model_id);
    println!("Voice  : {}", voice);
    println!("Text   : {:?}", text);
    println!();

    let model = download::load_from_hub(&model_id)?;
    println!("Available voices: {:?}", model.available_voices());

    // ── Generate audio ───────────────────────────────────────────────────────
    println!("\nSynthesising speech…");
    let naming = if stamped { OutputName::Timestamped } else { OutputName::Fixed };
    let driver = SynthesisDriver::new(model)
        .with_chunk_budget(budget)
        .with_output_dir(out_dir)
        .with_naming(naming);

    let (path, out) = driver.synthesize_to_file(&text, &voice)?;
    println!("Phonemes: {}", out.phonemes);
    println!("Wrote {}", path.display());
    Ok(())
}
