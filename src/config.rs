//! Session tunables, validation, and credential-file loading.
//!
//! Credentials live under `<base>/config/` next to the deployed binary, the
//! same place the engine model is kept. Resolution of that base directory is
//! the caller's business; everything here just reads and sanity-checks.

use std::env;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Frames of consecutive silence before the recognizer is skipped entirely.
pub const DEFAULT_LONG_MUTE_FRAMES: u32 = 50;

/// Frames of consecutive silence that force an utterance endpoint.
pub const DEFAULT_FORCE_ENDPOINT_FRAMES: u32 = 25;

/// Character cap for accumulated and finalized transcripts.
pub const DEFAULT_MAX_TEXT_CHARS: usize = 1000;

/// Expected length of the engine access key after trimming line endings.
pub const DEFAULT_KEY_LENGTH: usize = 56;

/// Configuration problems that abort `start`. Never retried automatically;
/// the caller fixes the configuration and calls `start` again.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing or unreadable key file: {0}")]
    MissingKeyFile(PathBuf),
    #[error("bad key in {path}: expected {expected} chars, got {actual}")]
    BadKeyLength {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },
    #[error("missing engine model: {0}")]
    MissingModel(PathBuf),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Everything a recognition engine needs at construction time. Produced by
/// [`SessionConfig::engine_settings`] and consumed by the engine factory
/// passed to `Session::start`.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Engine access key, empty when the session runs without a credential.
    pub access_key: String,
    pub model_path: PathBuf,
    /// How aggressively the engine should declare endpoints (0.0 to 1.0).
    pub endpoint_sensitivity: f32,
    pub enable_automatic_punctuation: bool,
}

/// Tunables for one capture session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Directory holding the `config/` subdirectory with key and model.
    /// `None` means the current working directory.
    pub base_dir: Option<PathBuf>,
    /// Key file name under `<base>/config/`; `None` skips credential loading
    /// (engines like local Whisper take no key).
    pub key_file: Option<String>,
    /// Required key length after trimming trailing CR/LF.
    pub key_length: usize,
    /// Model file name under `<base>/config/`.
    pub model_file: String,
    pub endpoint_sensitivity: f32,
    pub enable_automatic_punctuation: bool,
    /// Preferred input device name; `None` uses the system default.
    pub input_device: Option<String>,
    pub long_mute_frames: u32,
    pub force_endpoint_frames: u32,
    pub max_text_chars: usize,
    /// Emit in-progress transcripts at debug level as fragments accumulate.
    pub trace_partials: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            key_file: Some("speech.key".to_string()),
            key_length: DEFAULT_KEY_LENGTH,
            model_file: "speech.model".to_string(),
            endpoint_sensitivity: 0.5,
            enable_automatic_punctuation: false,
            input_device: None,
            long_mute_frames: DEFAULT_LONG_MUTE_FRAMES,
            force_endpoint_frames: DEFAULT_FORCE_ENDPOINT_FRAMES,
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
            trace_partials: false,
        }
    }
}

impl SessionConfig {
    /// Check bound relationships before any device or engine work happens.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.force_endpoint_frames == 0 {
            return Err(ConfigError::Invalid(
                "force_endpoint_frames must be at least 1".into(),
            ));
        }
        if self.force_endpoint_frames >= self.long_mute_frames {
            return Err(ConfigError::Invalid(format!(
                "force_endpoint_frames ({}) must be strictly below long_mute_frames ({})",
                self.force_endpoint_frames, self.long_mute_frames
            )));
        }
        if self.max_text_chars == 0 {
            return Err(ConfigError::Invalid(
                "max_text_chars must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.endpoint_sensitivity) {
            return Err(ConfigError::Invalid(format!(
                "endpoint_sensitivity must be within 0.0..=1.0, got {}",
                self.endpoint_sensitivity
            )));
        }
        Ok(())
    }

    /// Resolve the credential and model location into [`EngineSettings`].
    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        let base = match &self.base_dir {
            Some(dir) => dir.clone(),
            None => env::current_dir()
                .map_err(|err| ConfigError::Invalid(format!("cannot resolve cwd: {err}")))?,
        };
        let config_dir = base.join("config");

        let access_key = match &self.key_file {
            Some(name) => {
                let path = config_dir.join(name);
                let raw = fs::read_to_string(&path)
                    .map_err(|_| ConfigError::MissingKeyFile(path.clone()))?;
                let key = raw.trim_end_matches(['\r', '\n']);
                if key.len() != self.key_length {
                    return Err(ConfigError::BadKeyLength {
                        path,
                        expected: self.key_length,
                        actual: key.len(),
                    });
                }
                key.to_string()
            }
            None => String::new(),
        };

        let model_path = config_dir.join(&self.model_file);
        if !model_path.is_file() {
            return Err(ConfigError::MissingModel(model_path));
        }

        Ok(EngineSettings {
            access_key,
            model_path,
            endpoint_sensitivity: self.endpoint_sensitivity,
            enable_automatic_punctuation: self.enable_automatic_punctuation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup(key: Option<&str>, model: bool) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("config")).expect("config dir");
        if let Some(key) = key {
            fs::write(dir.path().join("config/speech.key"), key).expect("key file");
        }
        if model {
            fs::write(dir.path().join("config/speech.model"), b"model").expect("model file");
        }
        dir
    }

    fn config_for(dir: &tempfile::TempDir) -> SessionConfig {
        SessionConfig {
            base_dir: Some(dir.path().to_path_buf()),
            ..SessionConfig::default()
        }
    }

    #[test]
    fn defaults_validate() {
        SessionConfig::default().validate().expect("defaults valid");
    }

    #[test]
    fn endpoint_bound_must_precede_long_mute() {
        let config = SessionConfig {
            force_endpoint_frames: 50,
            long_mute_frames: 50,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn loads_key_trimming_line_endings() {
        let key = "k".repeat(DEFAULT_KEY_LENGTH);
        let dir = setup(Some(&format!("{key}\r\n")), true);
        let settings = config_for(&dir).engine_settings().expect("settings");
        assert_eq!(settings.access_key, key);
    }

    #[test]
    fn wrong_key_length_is_rejected() {
        let dir = setup(Some("too-short"), true);
        let err = config_for(&dir).engine_settings().unwrap_err();
        assert!(matches!(err, ConfigError::BadKeyLength { actual: 9, .. }));
    }

    #[test]
    fn missing_key_file_is_rejected() {
        let dir = setup(None, true);
        let err = config_for(&dir).engine_settings().unwrap_err();
        assert!(matches!(err, ConfigError::MissingKeyFile(_)));
    }

    #[test]
    fn missing_model_is_rejected() {
        let key = "k".repeat(DEFAULT_KEY_LENGTH);
        let dir = setup(Some(&key), false);
        let err = config_for(&dir).engine_settings().unwrap_err();
        assert!(matches!(err, ConfigError::MissingModel(_)));
    }

    #[test]
    fn keyless_engines_skip_credential_loading() {
        let dir = setup(None, true);
        let mut config = config_for(&dir);
        config.key_file = None;
        let settings = config.engine_settings().expect("settings");
        assert!(settings.access_key.is_empty());
    }
}
