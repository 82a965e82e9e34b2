//! # kokorotts
//!
//! Rust port of the Kokoro TTS demo — a chunked, ONNX-based text-to-speech
//! pipeline with a browser front-end.
//!
//! ## Quick start
//!
//! ```no_run
//! use kokorotts::{download, SynthesisDriver};
//!
//! // Download the model and voice packs (cached after first run)
//! let model = download::load_from_hub("kokorotts/kokoro-onnx").unwrap();
//!
//! // Chunk, synthesize, concatenate, write outputs/output.wav
//! let driver = SynthesisDriver::new(model);
//! let (path, out) = driver
//!     .synthesize_to_file("Hello from Rust!", "af")
//!     .unwrap();
//! println!("{} → {}", out.phonemes, path.display());
//! ```
//!
//! ## Pipeline
//! 1. **Chunking** — input text split into ≤ 500-char whole-word chunks.
//! 2. **Phonemisation** — `libespeak-ng` converts each chunk to IPA.
//! 3. **Normalisation** — IPA rewritten to the model's conventions.
//! 4. **Tokenisation** — characters mapped to integer token IDs.
//! 5. **ONNX inference** — model takes `(input_ids, style, speed)`, outputs audio.
//! 6. **Concat** — per-chunk audio concatenated; failed chunks skipped.
//! 7. **WAV** — 16-bit PCM mono at 22 050 Hz, written to `outputs/`.
//!
//! Steps 2–5 live behind the injected [`SpeechSynthesizer`] capability, so
//! the driver (the only part with testable logic) runs against a test
//! double without the model.
//!
//! ## Build requirements
//! The text-input pipeline (`espeak` feature) links `libespeak-ng`:
//! `apt install libespeak-ng-dev` / `brew install espeak-ng`.  Without the
//! feature the crate still builds and exposes the IPA-input API.

pub mod chunk;
pub mod download;
pub mod driver;
pub mod lang;
pub mod model;
pub mod tokenize;
pub mod voice;

// Text-to-phoneme conversion needs the native espeak-ng library.
#[cfg(feature = "espeak")]
pub mod phonemize;

// ─── Re-exports for convenience ─────────────────────────────────────────────

/// The speech model — use [`download::load_from_hub`] to obtain one.
pub use model::KokoroOnnx;

/// Audio sample rate produced by the model.
pub use model::SAMPLE_RATE;

pub use chunk::{chunk_text, DEFAULT_CHUNK_BUDGET};
pub use driver::{
    ChunkAudio, DriverError, OutputName, SpeechSynthesizer, Synthesis, SynthesisDriver,
};
pub use lang::LangCode;
