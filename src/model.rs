//! ONNX model runner for the Kokoro speech synthesizer.
//!
//! Uses [`ort`] (ONNX Runtime Rust bindings) for inference.
//! The three model inputs are positional:
//!
//! | Name        | Shape          | dtype   |
//! |-------------|----------------|---------|
//! | `input_ids` | `[1, seq_len]` | int64   |
//! | `style`     | `[1, style_d]` | float32 |
//! | `speed`     | `[1]`          | float32 |
//!
//! Output 0 is the raw waveform.  The style vector comes from the selected
//! voice pack, indexed by the token count of the current chunk.

use std::{collections::HashMap, path::Path, sync::Mutex};

use anyhow::{bail, Context, Result};
use ort::{session::Session, value::Tensor};

use crate::{
    lang::LangCode,
    tokenize::{normalize_phonemes, phonemes_to_ids, MAX_TOKENS},
    voice::VoicePack,
};

#[cfg(feature = "espeak")]
use crate::driver::{ChunkAudio, SpeechSynthesizer};
#[cfg(feature = "espeak")]
use crate::phonemize::phonemize;

/// Audio sample rate produced by the model.
pub const SAMPLE_RATE: u32 = 22_050;

/// The speech model plus its loaded voice packs.
pub struct KokoroOnnx {
    session: Mutex<Session>,
    voices: HashMap<String, VoicePack>,
    speed: f32,
}

impl KokoroOnnx {
    /// Load the model from an ONNX file.  Voices are registered separately
    /// with [`add_voice`](Self::add_voice).
    pub fn load(model_path: &Path) -> Result<Self> {
        let session = Session::builder()
            .context("Failed to create ORT session builder")?
            .commit_from_file(model_path)
            .with_context(|| format!("Cannot load ONNX model: {}", model_path.display()))?;

        Ok(Self {
            session: Mutex::new(session),
            voices: HashMap::new(),
            speed: 1.0,
        })
    }

    /// Register a voice pack under `name`.
    pub fn add_voice(&mut self, name: impl Into<String>, pack: VoicePack) {
        self.voices.insert(name.into(), pack);
    }

    /// Playback-speed multiplier passed to the model (default 1.0).
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    /// Names of all registered voices, sorted.
    pub fn available_voices(&self) -> Vec<String> {
        let mut names: Vec<String> = self.voices.keys().cloned().collect();
        names.sort();
        names
    }

    fn voice(&self, name: &str) -> Result<&VoicePack> {
        self.voices.get(name).with_context(|| {
            format!(
                "Voice '{}' not found. Available: {:?}",
                name,
                self.available_voices()
            )
        })
    }

    /// Core inference step: padded token IDs + style vector → audio samples.
    fn infer(&self, ids: Vec<i64>, style: &[f32]) -> Result<Vec<f32>> {
        let seq_len = ids.len();
        let style_dim = style.len();

        let t_input_ids = Tensor::<i64>::from_array(([1usize, seq_len], ids))
            .context("Failed to build input_ids tensor")?;
        let t_style = Tensor::<f32>::from_array(([1usize, style_dim], style.to_vec()))
            .context("Failed to build style tensor")?;
        let t_speed = Tensor::<f32>::from_array(([1usize], vec![self.speed]))
            .context("Failed to build speed tensor")?;

        let mut session = self.session.lock().unwrap_or_else(|p| p.into_inner());
        let outputs = session
            .run(ort::inputs![t_input_ids, t_style, t_speed])
            .context("ONNX inference failed")?;

        // Output 0 is the waveform (shape [1, T] or [T]).
        let (_shape, audio) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract audio tensor")?;

        Ok(audio.to_vec())
    }

    /// Run inference from a pre-computed IPA phoneme string.
    ///
    /// Use this when IPA comes from another source — a server round-trip or
    /// a different G2P library.  The string is normalised to the model's
    /// conventions first; the normalised form is returned alongside the
    /// samples as the chunk's phoneme annotation.
    pub fn synthesize_ipa(
        &self,
        ipa: &str,
        voice: &str,
        lang: LangCode,
    ) -> Result<(Vec<f32>, String)> {
        let pack = self.voice(voice)?;

        let ps = normalize_phonemes(ipa, lang);
        if ps.is_empty() {
            bail!("No phonemes to synthesize");
        }

        let ids = phonemes_to_ids(&ps);
        let token_count = ids.len() - 2;
        if token_count > MAX_TOKENS {
            bail!(
                "Phoneme sequence too long: {} tokens (max {})",
                token_count,
                MAX_TOKENS
            );
        }

        let style = pack.style_row(token_count);
        let samples = self.infer(ids, style)?;
        Ok((samples, ps))
    }

    /// Phonemise one chunk of text with espeak-ng and run inference.
    ///
    /// The language is derived from the voice name's prefix.
    #[cfg(feature = "espeak")]
    pub fn synthesize_chunk(&self, text: &str, voice: &str) -> Result<(Vec<f32>, String)> {
        let lang = LangCode::from_voice_name(voice);
        let ipa = phonemize(text, lang)
            .with_context(|| format!("Phonemisation failed for {:?}", text))?;
        self.synthesize_ipa(&ipa, voice, lang)
    }
}

/// The real synthesizer behind the driver.
///
/// Internal failures are absorbed into the per-chunk null result, matching
/// the original demo where the generation call caught its own exceptions
/// and returned nothing for the failed chunk.
#[cfg(feature = "espeak")]
impl SpeechSynthesizer for KokoroOnnx {
    fn synthesize(&self, text: &str, voice: &str) -> Result<Option<ChunkAudio>> {
        match self.synthesize_chunk(text, voice) {
            Ok((samples, phonemes)) => Ok(Some(ChunkAudio { samples, phonemes })),
            Err(e) => {
                eprintln!("Error generating speech for chunk {:?}: {:#}", text, e);
                Ok(None)
            }
        }
    }
}
