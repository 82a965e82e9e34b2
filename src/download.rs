//! HuggingFace Hub model source.
//!
//! A model repository holds `config.json`, the ONNX model file, and the
//! voice packs — either one `.npy` file per voice under a voices directory,
//! or a single packed NPZ archive.  Files are cached in the HuggingFace Hub
//! cache directory (`~/.cache/huggingface/hub` by default), so repeat runs
//! do not re-download.
//!
//! No retry and no timeout policy: a remote failure propagates as a fatal
//! error for the request that triggered the download.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use hf_hub::api::sync::{Api, ApiRepo};
use serde::Deserialize;

use crate::model::KokoroOnnx;
use crate::voice::{load_voice_archive, VoicePack};

// ─────────────────────────────────────────────────────────────────────────────
// config.json schema
// ─────────────────────────────────────────────────────────────────────────────

fn default_voices_dir() -> String {
    "voices".to_string()
}

/// Deserialised `config.json` from a model repository.
#[derive(Debug, Deserialize)]
pub struct ModelConfig {
    /// Must be `"ONNX1"` or `"ONNX2"`.
    #[serde(rename = "type")]
    pub model_type: String,

    /// Filename of the ONNX model inside the repo (e.g. `"kokoro-v0_19.onnx"`).
    pub model_file: String,

    /// Optional packed voice archive (NPZ with one array per voice).
    /// When present it takes precedence over `voices_dir`.
    #[serde(default)]
    pub voices: Option<String>,

    /// Directory of per-voice `.npy` files inside the repo.
    #[serde(default = "default_voices_dir")]
    pub voices_dir: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// HubSource
// ─────────────────────────────────────────────────────────────────────────────

/// A connected model repository: API handle plus its parsed configuration.
pub struct HubSource {
    repo: ApiRepo,
    config: ModelConfig,
}

impl HubSource {
    /// Connect to `repo_id` and fetch + parse its `config.json`.
    pub fn connect(repo_id: &str) -> Result<Self> {
        println!("Downloading config from {}…", repo_id);
        let api = Api::new().context("Failed to initialise HuggingFace Hub client")?;
        let repo = api.model(repo_id.to_string());

        let config_path = repo
            .get("config.json")
            .with_context(|| format!("Failed to download 'config.json' from '{}'", repo_id))?;
        let config_bytes = std::fs::read(&config_path)
            .with_context(|| format!("Cannot read config: {}", config_path.display()))?;
        let config: ModelConfig =
            serde_json::from_slice(&config_bytes).context("Failed to parse config.json")?;

        if !matches!(config.model_type.as_str(), "ONNX1" | "ONNX2") {
            bail!(
                "Unsupported model type '{}' — expected ONNX1 or ONNX2",
                config.model_type
            );
        }

        Ok(Self { repo, config })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Names of the voices this repository serves, sorted.
    ///
    /// With a packed archive the names are its member arrays; otherwise the
    /// repo file listing is filtered to `<voices_dir>/<name>.npy`.
    pub fn list_voices(&self) -> Result<Vec<String>> {
        if self.config.voices.is_some() {
            let voices = self.fetch_voice_archive()?;
            let mut names: Vec<String> = voices.into_keys().collect();
            names.sort();
            return Ok(names);
        }

        let info = self.repo.info().context("Failed to list repository files")?;
        let prefix = format!("{}/", self.config.voices_dir);
        let mut names: Vec<String> = info
            .siblings
            .iter()
            .filter_map(|s| {
                s.rfilename
                    .strip_prefix(&prefix)
                    .and_then(|rest| rest.strip_suffix(".npy"))
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        Ok(names)
    }

    /// Download the ONNX model file, returning its cached path.
    pub fn fetch_model_file(&self) -> Result<PathBuf> {
        println!("Downloading model file ({})…", self.config.model_file);
        self.repo
            .get(&self.config.model_file)
            .with_context(|| format!("Failed to download '{}'", self.config.model_file))
    }

    /// Download and parse one voice pack by name.
    pub fn fetch_voice(&self, name: &str) -> Result<VoicePack> {
        if let Some(archive) = &self.config.voices {
            let mut voices = self.fetch_voice_archive()?;
            return voices
                .remove(name)
                .with_context(|| format!("Voice '{}' not in archive '{}'", name, archive));
        }

        let filename = format!("{}/{}.npy", self.config.voices_dir, name);
        let path = self
            .repo
            .get(&filename)
            .with_context(|| format!("Failed to download voice '{}'", filename))?;
        VoicePack::from_npy_file(&path)
    }

    /// Build the model without any voices registered.
    pub fn load_model(&self) -> Result<KokoroOnnx> {
        let model_path = self.fetch_model_file()?;
        println!("Loading model…");
        KokoroOnnx::load(&model_path)
    }

    fn fetch_voice_archive(&self) -> Result<std::collections::HashMap<String, VoicePack>> {
        let archive = self
            .config
            .voices
            .as_deref()
            .context("Repository has no packed voice archive")?;
        let path = self
            .repo
            .get(archive)
            .with_context(|| format!("Failed to download voices '{}'", archive))?;
        load_voice_archive(&path)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public convenience
// ─────────────────────────────────────────────────────────────────────────────

/// Download everything from `repo_id` and return a ready-to-use model with
/// all of the repository's voices registered.
pub fn load_from_hub(repo_id: &str) -> Result<KokoroOnnx> {
    let source = HubSource::connect(repo_id)?;
    let mut model = source.load_model()?;

    if source.config().voices.is_some() {
        for (name, pack) in source.fetch_voice_archive()? {
            model.add_voice(name, pack);
        }
    } else {
        for name in source.list_voices()? {
            let pack = source.fetch_voice(&name)?;
            println!("Loaded voice: {}", name);
            model.add_voice(name, pack);
        }
    }

    if model.available_voices().is_empty() {
        bail!("Repository '{}' serves no voices", repo_id);
    }
    Ok(model)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_with_voices_dir() {
        let cfg: ModelConfig = serde_json::from_str(
            r#"{"type": "ONNX1", "model_file": "kokoro-v0_19.onnx"}"#,
        )
        .unwrap();
        assert_eq!(cfg.model_type, "ONNX1");
        assert_eq!(cfg.model_file, "kokoro-v0_19.onnx");
        assert_eq!(cfg.voices, None);
        assert_eq!(cfg.voices_dir, "voices");
    }

    #[test]
    fn test_config_with_packed_archive() {
        let cfg: ModelConfig = serde_json::from_str(
            r#"{"type": "ONNX2", "model_file": "model.onnx", "voices": "voices.npz"}"#,
        )
        .unwrap();
        assert_eq!(cfg.voices.as_deref(), Some("voices.npz"));
    }

    #[test]
    fn test_config_rejects_unknown_fields_gracefully() {
        // Extra fields in config.json must not break parsing.
        let cfg: ModelConfig = serde_json::from_str(
            r#"{"type": "ONNX1", "model_file": "m.onnx", "sample_rate": 22050}"#,
        )
        .unwrap();
        assert_eq!(cfg.model_file, "m.onnx");
    }
}
