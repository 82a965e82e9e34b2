//! Chunked synthesis driver.
//!
//! Takes arbitrary-length text and a voice name, splits the text into
//! budget-bounded chunks ([`crate::chunk`]), synthesizes each chunk through
//! an injected [`SpeechSynthesizer`], concatenates the per-chunk audio and
//! phoneme annotations in order, and optionally writes the result to a WAV
//! file in an output directory.
//!
//! The synthesizer is a trait so the driver can be exercised against a test
//! double — the ONNX model behind the real implementation is the one part
//! of the pipeline that cannot run in a unit test.

use std::{
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::chunk::{chunk_text, DEFAULT_CHUNK_BUDGET};
use crate::model::SAMPLE_RATE;

/// Default directory for generated WAV files, created on first use.
pub const DEFAULT_OUTPUT_DIR: &str = "outputs";

// ─────────────────────────────────────────────────────────────────────────────
// Synthesizer seam
// ─────────────────────────────────────────────────────────────────────────────

/// Audio and phoneme annotation produced for one chunk of text.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkAudio {
    /// Amplitude samples in `[-1.0, 1.0]` at [`SAMPLE_RATE`] Hz.
    pub samples: Vec<f32>,
    /// Textual pronunciation units for the chunk.
    pub phonemes: String,
}

/// One-operation capability over the external model code.
///
/// `Ok(None)` is the per-chunk null result: the synthesizer failed for this
/// chunk alone and the driver skips it silently.  `Err` is an unexpected
/// failure that aborts the whole request.
pub trait SpeechSynthesizer {
    fn synthesize(&self, text: &str, voice: &str) -> Result<Option<ChunkAudio>>;
}

impl<T: SpeechSynthesizer + ?Sized> SpeechSynthesizer for &T {
    fn synthesize(&self, text: &str, voice: &str) -> Result<Option<ChunkAudio>> {
        (**self).synthesize(text, voice)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Driver failure taxonomy.
///
/// Per-chunk null results are absorbed before an error is ever produced;
/// they never appear here.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Every chunk failed, or the input text was empty.
    #[error("failed to generate audio: no chunk produced any samples")]
    NoAudio,

    /// Setup, chunk-level, or output failure that aborts the request.
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Output naming
// ─────────────────────────────────────────────────────────────────────────────

/// Naming policy for the written WAV file.
///
/// Timestamps have one-second granularity: two requests within the same
/// second produce the same name either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputName {
    /// Always `output.wav`; a later request overwrites an earlier one.
    Fixed,
    /// `output-<unix_seconds>.wav`.
    Timestamped,
}

impl OutputName {
    fn file_name(self) -> String {
        match self {
            OutputName::Fixed => "output.wav".to_string(),
            OutputName::Timestamped => {
                let secs = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                format!("output-{}.wav", secs)
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Driver
// ─────────────────────────────────────────────────────────────────────────────

/// Assembled output of one synthesis request.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    /// All successful chunks' samples, concatenated in chunk order with no
    /// resampling and no inserted silence.
    pub samples: Vec<f32>,
    /// All successful chunks' phoneme strings, joined with single spaces.
    pub phonemes: String,
}

/// Sequential, single-threaded synthesis driver.
pub struct SynthesisDriver<S> {
    synth: S,
    chunk_budget: usize,
    output_dir: PathBuf,
    naming: OutputName,
}

impl<S: SpeechSynthesizer> SynthesisDriver<S> {
    pub fn new(synth: S) -> Self {
        Self {
            synth,
            chunk_budget: DEFAULT_CHUNK_BUDGET,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            naming: OutputName::Fixed,
        }
    }

    pub fn with_chunk_budget(mut self, budget: usize) -> Self {
        self.chunk_budget = budget;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_naming(mut self, naming: OutputName) -> Self {
        self.naming = naming;
        self
    }

    /// Access the wrapped synthesizer.
    pub fn synthesizer(&self) -> &S {
        &self.synth
    }

    /// Chunk `text`, synthesize every chunk in order, and assemble the
    /// results.
    ///
    /// A chunk whose result is absent is skipped entirely — no placeholder
    /// silence is inserted, so the output may have audible discontinuities
    /// where chunks failed.  If no chunk produced samples (or the input was
    /// empty) the request fails with [`DriverError::NoAudio`].
    pub fn synthesize(&self, text: &str, voice: &str) -> Result<Synthesis, DriverError> {
        let chunks = chunk_text(text, self.chunk_budget);

        let mut samples: Vec<f32> = Vec::new();
        let mut phonemes: Vec<String> = Vec::new();

        for chunk in &chunks {
            match self.synth.synthesize(chunk, voice)? {
                Some(audio) => {
                    samples.extend(audio.samples);
                    phonemes.push(audio.phonemes);
                }
                // Per-chunk failure: skip, keep going.
                None => {}
            }
        }

        if samples.is_empty() {
            return Err(DriverError::NoAudio);
        }

        Ok(Synthesis {
            samples,
            phonemes: phonemes.join(" "),
        })
    }

    /// Run [`synthesize`](Self::synthesize) and write the assembled audio to
    /// a WAV file in the driver's output directory (created if absent).
    ///
    /// No file is written on failure.
    pub fn synthesize_to_file(
        &self,
        text: &str,
        voice: &str,
    ) -> Result<(PathBuf, Synthesis), DriverError> {
        let out = self.synthesize(text, voice)?;

        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Cannot create output directory: {}", self.output_dir.display())
        })?;
        let path = self.output_dir.join(self.naming.file_name());
        write_wav(&out.samples, &path)?;

        Ok((path, out))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WAV writer
// ─────────────────────────────────────────────────────────────────────────────

/// Write `samples` to a 16-bit PCM mono WAV file at [`SAMPLE_RATE`] Hz.
pub fn write_wav(samples: &[f32], path: &Path) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Cannot create WAV: {}", path.display()))?;
    for &s in samples {
        // Convert f32 [-1.0, 1.0] → i16 [-32768, 32767].
        let s16 = (s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        writer.write_sample(s16).context("WAV write error")?;
    }
    writer.finalize().context("WAV finalise error")?;
    println!(
        "Saved {} samples ({:.2} s) to {}",
        samples.len(),
        samples.len() as f32 / SAMPLE_RATE as f32,
        path.display()
    );
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    /// Test double: each chunk yields one sample per word and the chunk's
    /// words upper-cased as "phonemes", except words listed in `fail` make
    /// the whole chunk return the null result.
    struct FakeSynth {
        fail: Vec<&'static str>,
    }

    impl FakeSynth {
        fn new() -> Self {
            Self { fail: Vec::new() }
        }

        fn failing_on(words: Vec<&'static str>) -> Self {
            Self { fail: words }
        }
    }

    impl SpeechSynthesizer for FakeSynth {
        fn synthesize(&self, text: &str, _voice: &str) -> Result<Option<ChunkAudio>> {
            if text.split_whitespace().any(|w| self.fail.contains(&w)) {
                return Ok(None);
            }
            let n = text.split_whitespace().count();
            Ok(Some(ChunkAudio {
                samples: vec![0.5; n],
                phonemes: text.to_uppercase(),
            }))
        }
    }

    /// Test double whose every call is a hard failure.
    struct BrokenSynth;

    impl SpeechSynthesizer for BrokenSynth {
        fn synthesize(&self, _text: &str, _voice: &str) -> Result<Option<ChunkAudio>> {
            Err(anyhow!("session exploded"))
        }
    }

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("kokorotts-test-{}-{}", tag, std::process::id()))
    }

    #[test]
    fn test_all_chunks_succeed() {
        let driver = SynthesisDriver::new(FakeSynth::new()).with_chunk_budget(4);
        // Budget 4 → chunks ["a b", "c d", "e f"].
        let out = driver.synthesize("a b c d e f", "af").unwrap();
        assert_eq!(out.samples.len(), 6);
        assert_eq!(out.phonemes, "A B C D E F");
    }

    #[test]
    fn test_failed_chunk_is_skipped() {
        let driver = SynthesisDriver::new(FakeSynth::failing_on(vec!["c"])).with_chunk_budget(4);
        // Middle chunk "c d" fails; the two survivors concatenate in order.
        let out = driver.synthesize("a b c d e f", "af").unwrap();
        assert_eq!(out.samples.len(), 4);
        assert_eq!(out.phonemes, "A B E F");
    }

    #[test]
    fn test_all_chunks_fail_is_no_audio() {
        let driver =
            SynthesisDriver::new(FakeSynth::failing_on(vec!["a", "c", "e"])).with_chunk_budget(4);
        let err = driver.synthesize("a b c d e f", "af").unwrap_err();
        assert!(matches!(err, DriverError::NoAudio));
    }

    #[test]
    fn test_empty_input_is_no_audio() {
        let driver = SynthesisDriver::new(FakeSynth::new());
        assert!(matches!(
            driver.synthesize("", "af").unwrap_err(),
            DriverError::NoAudio
        ));
        assert!(matches!(
            driver.synthesize("   ", "af").unwrap_err(),
            DriverError::NoAudio
        ));
    }

    #[test]
    fn test_hard_failure_aborts() {
        let driver = SynthesisDriver::new(BrokenSynth);
        let err = driver.synthesize("hello world", "af").unwrap_err();
        match err {
            DriverError::Fatal(e) => assert!(e.to_string().contains("session exploded")),
            DriverError::NoAudio => panic!("expected a fatal error, got NoAudio"),
        }
    }

    #[test]
    fn test_no_file_written_on_total_failure() {
        let dir = temp_dir("nofile");
        let _ = std::fs::remove_dir_all(&dir);
        let driver = SynthesisDriver::new(FakeSynth::failing_on(vec!["a"]))
            .with_output_dir(&dir);
        let err = driver.synthesize_to_file("a a a", "af").unwrap_err();
        assert!(matches!(err, DriverError::NoAudio));
        assert!(!dir.exists(), "output directory must not be created on failure");
    }

    #[test]
    fn test_file_written_on_success() {
        let dir = temp_dir("file");
        let driver = SynthesisDriver::new(FakeSynth::new()).with_output_dir(&dir);
        let (path, out) = driver.synthesize_to_file("hello world", "af").unwrap();
        assert_eq!(path, dir.join("output.wav"));
        assert_eq!(out.samples.len(), 2);

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, SAMPLE_RATE);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_timestamped_name() {
        let name = OutputName::Timestamped.file_name();
        assert!(name.starts_with("output-") && name.ends_with(".wav"), "got {name}");
        assert_eq!(OutputName::Fixed.file_name(), "output.wav");
    }
}
