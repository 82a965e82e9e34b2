//! Browser demo server.
//!
//! Serves the demo form (text box, voice selector, synthesize button) and a
//! small JSON API over the chunked synthesis driver:
//!
//! | Route              | Method | Description                               |
//! |--------------------|--------|-------------------------------------------|
//! | `/`                | GET    | HTML form                                 |
//! | `/voices`          | GET    | JSON list of available voices             |
//! | `/synthesize`      | POST   | `{text, voice}` → `{audio_url, phonemes}` |
//! | `/outputs/<file>`  | GET    | generated WAV files                       |
//!
//! Synthesis failures come back as a text message in the `phonemes` field
//! with no audio URL, which the form renders in place of the phonemes.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use axum::{
    extract::State,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{error, info};

use kokorotts::{download, DriverError, KokoroOnnx, OutputName, SynthesisDriver};

#[derive(Parser, Debug)]
#[command(name = "kokorotts-server", about = "Kokoro TTS browser demo")]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 7860)]
    port: u16,

    /// HuggingFace repository serving the model and voice packs.
    #[arg(long, default_value = "kokorotts/kokoro-onnx")]
    model: String,

    /// Directory for generated WAV files.
    #[arg(long, default_value = "outputs")]
    output_dir: PathBuf,

    /// Maximum characters per synthesis chunk.
    #[arg(long, default_value_t = kokorotts::DEFAULT_CHUNK_BUDGET)]
    chunk_budget: usize,

    /// Name output files `output-<unix_secs>.wav` instead of `output.wav`.
    /// Timestamps have one-second granularity.
    #[arg(long)]
    timestamped: bool,
}

#[derive(Clone)]
struct AppState {
    driver: Arc<SynthesisDriver<KokoroOnnx>>,
    voices: Vec<String>,
}

#[derive(Deserialize)]
struct SynthesizeRequest {
    text: String,
    voice: String,
}

#[derive(Serialize)]
struct SynthesizeResponse {
    /// URL of the generated WAV, absent on failure.
    audio_url: Option<String>,
    /// Phoneme annotation on success, error message on failure.
    phonemes: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Loading model from {}…", args.model);
    let model = download::load_from_hub(&args.model)?;
    let voices = model.available_voices();
    info!("Loaded {} voices", voices.len());

    let naming = if args.timestamped {
        OutputName::Timestamped
    } else {
        OutputName::Fixed
    };
    let driver = SynthesisDriver::new(model)
        .with_chunk_budget(args.chunk_budget)
        .with_output_dir(&args.output_dir)
        .with_naming(naming);

    let state = AppState { driver: Arc::new(driver), voices };

    let app = Router::new()
        .route("/", get(index))
        .route("/voices", get(list_voices))
        .route("/synthesize", post(synthesize))
        .nest_service("/outputs", ServeDir::new(&args.output_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn list_voices(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.voices.clone())
}

async fn synthesize(
    State(state): State<AppState>,
    Json(req): Json<SynthesizeRequest>,
) -> Json<SynthesizeResponse> {
    let driver = state.driver.clone();

    // ONNX inference is synchronous; keep it off the async runtime.
    let result = tokio::task::spawn_blocking(move || {
        driver.synthesize_to_file(&req.text, &req.voice)
    })
    .await;

    let response = match result {
        Ok(Ok((path, out))) => {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "output.wav".to_string());
            SynthesizeResponse {
                audio_url: Some(format!("/outputs/{file_name}")),
                phonemes: format!("Generated phonemes: {}", out.phonemes),
            }
        }
        Ok(Err(DriverError::NoAudio)) => SynthesizeResponse {
            audio_url: None,
            phonemes: "Failed to generate audio.".to_string(),
        },
        Ok(Err(DriverError::Fatal(e))) => {
            error!("Synthesis failed: {e:#}");
            SynthesizeResponse { audio_url: None, phonemes: format!("Error: {e}") }
        }
        Err(e) => {
            error!("Synthesis task panicked: {e}");
            SynthesizeResponse { audio_url: None, phonemes: format!("Error: {e}") }
        }
    };

    Json(response)
}

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Kokoro TTS Demo</title>
  <style>
    body { font-family: sans-serif; max-width: 42rem; margin: 2rem auto; padding: 0 1rem; }
    textarea { width: 100%; box-sizing: border-box; }
    .row { display: flex; gap: 1rem; margin: 1rem 0; align-items: center; }
    pre { white-space: pre-wrap; background: #f4f4f4; padding: 0.5rem; }
  </style>
</head>
<body>
  <h1>Kokoro TTS Demo</h1>
  <textarea id="text" rows="3" placeholder="Enter text to synthesize"></textarea>
  <div class="row">
    <label for="voice">Select Voice</label>
    <select id="voice"></select>
    <button id="go">Synthesize</button>
  </div>
  <audio id="audio" controls style="width:100%"></audio>
  <pre id="phonemes"></pre>
  <script>
    const voiceSel = document.getElementById('voice');
    fetch('/voices')
      .then(r => r.json())
      .then(voices => {
        for (const v of voices) {
          const opt = document.createElement('option');
          opt.value = opt.textContent = v;
          voiceSel.appendChild(opt);
        }
      });

    document.getElementById('go').addEventListener('click', async () => {
      const phonemes = document.getElementById('phonemes');
      phonemes.textContent = 'Synthesizing…';
      const res = await fetch('/synthesize', {
        method: 'POST',
        headers: {'Content-Type': 'application/json'},
        body: JSON.stringify({
          text: document.getElementById('text').value,
          voice: voiceSel.value,
        }),
      });
      const body = await res.json();
      phonemes.textContent = body.phonemes;
      if (body.audio_url) {
        const audio = document.getElementById('audio');
        audio.src = body.audio_url + '?t=' + Date.now();
        audio.play();
      }
    });
  </script>
</body>
</html>
"#;
