//! Hark - wake-word voice assistant
//!
//! Listens for a wake word on the microphone, records a short spoken
//! command, transcribes it, asks a chat-completion service for a one
//! sentence answer and speaks the reply.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │                     Assistant                       │
//! │  idle → recording → processing → speaking → idle    │
//! └──────┬──────────────────┬───────────────────┬──────┘
//!        │                  │                   │
//! ┌──────▼──────┐   ┌───────▼───────┐   ┌───────▼──────┐
//! │   Session   │   │ Transcriber / │   │   Speaker    │
//! │ engine, mic │   │   Responder   │   │  TTS + play  │
//! └─────────────┘   └───────────────┘   └──────────────┘
//! ```

pub mod assistant;
pub mod chat;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod session;
pub mod voice;

pub use assistant::{Assistant, AssistantSettings, AssistantState, Flow, is_exit_phrase};
pub use chat::{ChatClient, PERSONA_INSTRUCTION, Responder};
pub use config::Config;
pub use error::{ChatError, Error, Result, TranscribeError};
pub use lifecycle::ShutdownSignal;
pub use session::{Released, Session};
