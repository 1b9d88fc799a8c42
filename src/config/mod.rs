//! Configuration management for the hark assistant
//!
//! Configuration is built once at startup and is immutable afterwards.
//! Precedence: environment (including `.env`) > TOML file > defaults.

pub mod file;

use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;

use crate::chat::PERSONA_INSTRUCTION;
use crate::{Error, Result};

/// Default Porcupine keyword model
pub const DEFAULT_KEYWORD_PATH: &str = "Krishna_en_raspberry-pi_v3_0_0.ppn";

/// Default spoken keyword
pub const DEFAULT_KEYWORD: &str = "Krishna";

/// Default command window in seconds
pub const DEFAULT_RECORD_SECONDS: u32 = 10;

/// Assistant configuration
#[derive(Debug)]
pub struct Config {
    /// Wake word configuration
    pub wake: WakeConfig,

    /// Chat service configuration
    pub chat: ChatConfig,

    /// Speech-to-text configuration
    pub stt: SttConfig,

    /// Text-to-speech configuration
    pub tts: TtsConfig,

    /// Length of the command recording window in seconds
    pub record_seconds: u32,
}

/// Which wake word engine to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeEngineKind {
    /// Picovoice Porcupine with a `.ppn` keyword model
    Porcupine,
    /// Energy-gated segments checked by the STT service
    Transcript,
}

impl FromStr for WakeEngineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "porcupine" => Ok(Self::Porcupine),
            "transcript" => Ok(Self::Transcript),
            other => Err(Error::Config(format!("unknown wake engine: {other}"))),
        }
    }
}

/// Wake word configuration
#[derive(Debug)]
pub struct WakeConfig {
    /// Engine selection
    pub engine: WakeEngineKind,

    /// Picovoice access key
    pub access_key: Option<SecretString>,

    /// Porcupine keyword model path
    pub keyword_path: PathBuf,

    /// Spoken keyword
    pub keyword: String,
}

/// Chat service configuration
#[derive(Debug)]
pub struct ChatConfig {
    /// Perplexity API key
    pub api_key: Option<SecretString>,

    /// OpenAI-compatible base URL
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// System persona instruction sent with every request
    pub persona: String,
}

/// Speech-to-text provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SttProviderKind {
    /// Keyless Google speech endpoint
    Google,
    /// `OpenAI` Whisper (or any compatible endpoint)
    Whisper,
    /// Deepgram
    Deepgram,
}

impl FromStr for SttProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "whisper" | "openai" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }
}

/// Speech-to-text configuration
#[derive(Debug)]
pub struct SttConfig {
    /// Provider selection
    pub provider: SttProviderKind,

    /// Provider API key (optional for google)
    pub api_key: Option<SecretString>,

    /// Model identifier
    pub model: String,

    /// OpenAI-compatible base URL (whisper only)
    pub base_url: String,

    /// Recognition language (google)
    pub lang: String,
}

/// Text-to-speech provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsProviderKind {
    /// Keyless Google Translate voice
    Google,
    /// `OpenAI` speech API
    OpenAI,
    /// `ElevenLabs`
    ElevenLabs,
}

impl FromStr for TtsProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "google" | "gtts" => Ok(Self::Google),
            "openai" => Ok(Self::OpenAI),
            "elevenlabs" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Text-to-speech configuration
#[derive(Debug)]
pub struct TtsConfig {
    /// Provider selection
    pub provider: TtsProviderKind,

    /// Provider API key (unused by google)
    pub api_key: Option<SecretString>,

    /// Language code (google)
    pub lang: String,

    /// Voice identifier (openai voice name or elevenlabs voice id)
    pub voice: String,

    /// Model identifier
    pub model: String,

    /// Speed multiplier (openai)
    pub speed: f32,
}

impl Config {
    /// Load configuration from the process environment and config file
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns error if a setting has an unrecognized value
    pub fn load() -> Result<Self> {
        Self::from_sources(|key| std::env::var(key).ok(), file::load_config_file())
    }

    /// Build configuration from an environment lookup and a parsed config file
    ///
    /// # Errors
    ///
    /// Returns error if a setting has an unrecognized value
    pub fn from_sources<F>(env: F, fc: file::HarkConfigFile) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let secret = |key: &str| var(key).map(SecretString::from);

        let wake_engine = var("HARK_WAKE_ENGINE")
            .or(fc.wake.engine)
            .map_or(Ok(WakeEngineKind::Porcupine), |s| s.parse())?;
        let wake = WakeConfig {
            engine: wake_engine,
            access_key: secret("PICOVOICE_ACCESS_KEY"),
            keyword_path: var("HARK_KEYWORD_PATH")
                .map(PathBuf::from)
                .or(fc.wake.keyword_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_KEYWORD_PATH)),
            keyword: var("HARK_KEYWORD_NAME")
                .or(fc.wake.keyword)
                .unwrap_or_else(|| DEFAULT_KEYWORD.to_string()),
        };

        let chat = ChatConfig {
            api_key: secret("PERPLEXITY_API_KEY"),
            base_url: var("HARK_CHAT_BASE_URL")
                .or(fc.chat.base_url)
                .unwrap_or_else(|| "https://api.perplexity.ai".to_string()),
            model: var("HARK_CHAT_MODEL")
                .or(fc.chat.model)
                .unwrap_or_else(|| "sonar".to_string()),
            persona: var("HARK_PERSONA")
                .or(fc.chat.persona)
                .unwrap_or_else(|| PERSONA_INSTRUCTION.to_string()),
        };

        let stt_provider = var("HARK_STT_PROVIDER")
            .or(fc.stt.provider)
            .map_or(Ok(SttProviderKind::Google), |s| s.parse())?;
        let stt = SttConfig {
            provider: stt_provider,
            api_key: match stt_provider {
                SttProviderKind::Google => secret("GOOGLE_SPEECH_API_KEY"),
                SttProviderKind::Whisper => secret("OPENAI_API_KEY"),
                SttProviderKind::Deepgram => secret("DEEPGRAM_API_KEY"),
            },
            model: var("HARK_STT_MODEL").or(fc.stt.model).unwrap_or_else(|| {
                match stt_provider {
                    SttProviderKind::Google => "",
                    SttProviderKind::Whisper => "whisper-1",
                    SttProviderKind::Deepgram => "nova-2",
                }
                .to_string()
            }),
            base_url: var("HARK_STT_BASE_URL")
                .or(fc.stt.base_url)
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            lang: var("HARK_STT_LANG")
                .or(fc.stt.lang)
                .unwrap_or_else(|| "en-US".to_string()),
        };

        let tts_provider = var("HARK_TTS_PROVIDER")
            .or(fc.tts.provider)
            .map_or(Ok(TtsProviderKind::Google), |s| s.parse())?;
        let tts = TtsConfig {
            provider: tts_provider,
            api_key: match tts_provider {
                TtsProviderKind::Google => None,
                TtsProviderKind::OpenAI => secret("OPENAI_API_KEY"),
                TtsProviderKind::ElevenLabs => secret("ELEVENLABS_API_KEY"),
            },
            lang: var("HARK_TTS_LANG")
                .or(fc.tts.lang)
                .unwrap_or_else(|| "en".to_string()),
            voice: var("HARK_TTS_VOICE").or(fc.tts.voice).unwrap_or_else(|| {
                match tts_provider {
                    // Rachel
                    TtsProviderKind::ElevenLabs => "21m00Tcm4TlvDq8ikWAM",
                    _ => "alloy",
                }
                .to_string()
            }),
            model: var("HARK_TTS_MODEL").or(fc.tts.model).unwrap_or_else(|| {
                match tts_provider {
                    TtsProviderKind::ElevenLabs => "eleven_monolingual_v1",
                    _ => "tts-1",
                }
                .to_string()
            }),
            speed: fc.tts.speed.unwrap_or(1.0),
        };

        let record_seconds = match var("HARK_RECORD_SECONDS") {
            Some(s) => s.trim().parse().map_err(|_| {
                Error::Config(format!("HARK_RECORD_SECONDS is not a whole number: {s}"))
            })?,
            None => fc.recording.seconds.unwrap_or(DEFAULT_RECORD_SECONDS),
        };

        Ok(Self {
            wake,
            chat,
            stt,
            tts,
            record_seconds,
        })
    }

    /// Check that everything needed to start is present
    ///
    /// # Errors
    ///
    /// Returns a descriptive `Error::Config` for the first missing credential
    /// or file; callers treat it as fatal
    pub fn validate(&self) -> Result<()> {
        let needs_access_key = self.wake.engine == WakeEngineKind::Porcupine;

        if self.chat.api_key.is_none() || (needs_access_key && self.wake.access_key.is_none()) {
            return Err(Error::Config(
                "an API key is missing: set PICOVOICE_ACCESS_KEY and PERPLEXITY_API_KEY \
                 (a .env file works)"
                    .to_string(),
            ));
        }

        if needs_access_key && !self.wake.keyword_path.exists() {
            return Err(Error::Config(format!(
                "wake word file '{}' not found",
                self.wake.keyword_path.display()
            )));
        }

        if self.wake.engine == WakeEngineKind::Transcript && self.wake.keyword.trim().is_empty() {
            return Err(Error::Config(
                "HARK_KEYWORD_NAME required for the transcript wake engine".to_string(),
            ));
        }

        let stt_key = match self.stt.provider {
            SttProviderKind::Google => None,
            SttProviderKind::Whisper => Some("OPENAI_API_KEY"),
            SttProviderKind::Deepgram => Some("DEEPGRAM_API_KEY"),
        };
        if let Some(key) = stt_key
            && self.stt.api_key.is_none()
        {
            return Err(Error::Config(format!("{key} required for speech recognition")));
        }

        match self.tts.provider {
            TtsProviderKind::Google => {}
            TtsProviderKind::OpenAI if self.tts.api_key.is_none() => {
                return Err(Error::Config(
                    "OPENAI_API_KEY required for OpenAI TTS".to_string(),
                ));
            }
            TtsProviderKind::ElevenLabs if self.tts.api_key.is_none() => {
                return Err(Error::Config(
                    "ELEVENLABS_API_KEY required for ElevenLabs TTS".to_string(),
                ));
            }
            _ => {}
        }

        if self.record_seconds == 0 {
            return Err(Error::Config(
                "recording window must be at least one second".to_string(),
            ));
        }

        Ok(())
    }
}
