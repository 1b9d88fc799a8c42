//! Error types for the hark assistant

use thiserror::Error;

/// Result type alias for hark operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (fatal at startup)
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or stream error
    #[error("audio error: {0}")]
    Audio(String),

    /// Wake word engine error
    #[error("wake word error: {0}")]
    WakeWord(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Chat completion error
    #[error("chat error: {0}")]
    Chat(String),

    /// Shutdown was requested while waiting on a blocking operation
    #[error("interrupted")]
    Interrupted,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Why a command could not be transcribed
///
/// Every variant is recoverable: the assistant apologises and goes back to
/// listening.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscribeError {
    /// The audio held no recognizable speech
    #[error("no speech recognized")]
    NoSpeech,

    /// The recognition service could not be reached or rejected the request
    #[error("recognition service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Anything else that went wrong during transcription
    #[error("transcription failed: {0}")]
    Unknown(String),
}

/// Why the chat service did not produce a reply
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// The chat service errored or was unreachable
    #[error("chat service error: {0}")]
    Service(String),

    /// Unexpected failure while handling the reply
    #[error("unexpected chat failure: {0}")]
    Unknown(String),
}
