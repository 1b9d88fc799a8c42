//! TOML configuration file loading
//!
//! Supports `~/.config/hark/config.toml` (or the path in `HARK_CONFIG`) as a
//! persistent config source. All fields are optional, the file is a partial
//! overlay on top of defaults and is itself overridden by the environment.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct HarkConfigFile {
    /// Wake word configuration
    #[serde(default)]
    pub wake: WakeFileConfig,

    /// Chat service configuration
    #[serde(default)]
    pub chat: ChatFileConfig,

    /// Speech-to-text configuration
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Text-to-speech configuration
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Command recording configuration
    #[serde(default)]
    pub recording: RecordingFileConfig,
}

/// Wake word configuration
#[derive(Debug, Default, Deserialize)]
pub struct WakeFileConfig {
    /// Engine ("porcupine" or "transcript")
    pub engine: Option<String>,

    /// Path to the Porcupine keyword model (`.ppn`)
    pub keyword_path: Option<PathBuf>,

    /// Spoken keyword (e.g. "Krishna")
    pub keyword: Option<String>,
}

/// Chat service configuration
#[derive(Debug, Default, Deserialize)]
pub struct ChatFileConfig {
    /// Model identifier (e.g. "sonar")
    pub model: Option<String>,

    /// OpenAI-compatible base URL
    pub base_url: Option<String>,

    /// Replacement for the built-in persona instruction
    pub persona: Option<String>,
}

/// Speech-to-text configuration
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// Provider ("google", "whisper" or "deepgram")
    pub provider: Option<String>,

    /// Model identifier
    pub model: Option<String>,

    /// OpenAI-compatible base URL (whisper only)
    pub base_url: Option<String>,

    /// Recognition language for the google provider (e.g. "en-US")
    pub lang: Option<String>,
}

/// Text-to-speech configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// Provider ("google", "openai" or "elevenlabs")
    pub provider: Option<String>,

    /// Language code for the google provider
    pub lang: Option<String>,

    /// Voice identifier
    pub voice: Option<String>,

    /// Model identifier
    pub model: Option<String>,

    /// Speed multiplier (openai only)
    pub speed: Option<f32>,
}

/// Command recording configuration
#[derive(Debug, Default, Deserialize)]
pub struct RecordingFileConfig {
    /// Length of the command window in seconds
    pub seconds: Option<u32>,
}

/// Load the config file from its default location
///
/// Returns `HarkConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> HarkConfigFile {
    config_file_path().map_or_else(HarkConfigFile::default, |path| load_config_file_from(&path))
}

/// Load the config file at `path`
///
/// Returns `HarkConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file_from(path: &Path) -> HarkConfigFile {
    if !path.exists() {
        return HarkConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                HarkConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            HarkConfigFile::default()
        }
    }
}

/// Return the config file path: `$HARK_CONFIG` or `~/.config/hark/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("HARK_CONFIG") {
        return Some(PathBuf::from(path));
    }

    directories::BaseDirs::new().map(|d| d.config_dir().join("hark").join("config.toml"))
}
