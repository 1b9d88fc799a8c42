//! The listen, record, transcribe, respond, speak loop
//!
//! The assistant runs strictly in sequence on one task: it never captures
//! while it speaks. Each wake word starts one turn. A turn always ends in
//! something spoken, either the chat reply or a fixed apology, and then the
//! assistant goes back to listening.

use crate::chat::Responder;
use crate::config::Config;
use crate::error::{ChatError, TranscribeError};
use crate::lifecycle::ShutdownSignal;
use crate::session::Session;
use crate::voice::{CommandBuffer, Speaker, Transcriber};
use crate::{Error, Result};

/// Fixed phrases the assistant speaks
pub mod phrases {
    /// Spoken once at startup
    pub const READY: &str = "Assistant is ready.";
    /// Spoken when the wake word fires, before recording
    pub const ACK: &str = "Yes?";
    /// Spoken after an exit phrase
    pub const FAREWELL: &str = "Goodbye!";
    /// Nothing recognizable in the recording
    pub const NO_SPEECH: &str = "Sorry, I didn't catch that.";
    /// The speech recognition service failed
    pub const STT_UNAVAILABLE: &str = "Speech recognition service is unavailable.";
    /// The chat service failed
    pub const CHAT_FAILED: &str = "Sorry, I had an issue with the Perplexity service.";
    /// Anything else went wrong during a turn
    pub const UNEXPECTED: &str = "Sorry, an unexpected error occurred.";
}

/// Commands that end the session
pub const EXIT_PHRASES: [&str; 4] = ["exit", "quit", "goodbye", "stop"];

/// Whether `command` is one of [`EXIT_PHRASES`], ignoring case and
/// surrounding whitespace
#[must_use]
pub fn is_exit_phrase(command: &str) -> bool {
    let command = command.trim().to_lowercase();
    EXIT_PHRASES.contains(&command.as_str())
}

/// Where the assistant is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantState {
    /// Feeding frames to the wake word engine
    IdleListening,
    /// Acknowledging and recording the command window
    RecordingCommand,
    /// Transcribing and asking the chat service
    Processing,
    /// Speaking the reply or an apology
    Speaking,
    /// Terminal; resources are being or have been released
    ShuttingDown,
}

/// Whether the loop should keep going after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Go back to listening
    Continue,
    /// An exit phrase was heard
    Exit,
}

/// Per-run settings for the assistant
#[derive(Debug, Clone)]
pub struct AssistantSettings {
    /// Spoken keyword, used in the ready message
    pub keyword: String,
    /// System instruction sent with every chat request
    pub persona: String,
    /// Length of the command window in seconds
    pub record_seconds: u32,
}

impl AssistantSettings {
    /// Take the settings from the loaded configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            keyword: config.wake.keyword.clone(),
            persona: config.chat.persona.clone(),
            record_seconds: config.record_seconds,
        }
    }
}

/// The voice assistant
pub struct Assistant {
    session: Session,
    transcriber: Box<dyn Transcriber>,
    responder: Box<dyn Responder>,
    speaker: Box<dyn Speaker>,
    settings: AssistantSettings,
    shutdown: ShutdownSignal,
    state: AssistantState,
    turns: usize,
}

impl Assistant {
    /// Assemble an assistant around an open session
    #[must_use]
    pub fn new(
        session: Session,
        transcriber: Box<dyn Transcriber>,
        responder: Box<dyn Responder>,
        speaker: Box<dyn Speaker>,
        settings: AssistantSettings,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            session,
            transcriber,
            responder,
            speaker,
            settings,
            shutdown,
            state: AssistantState::IdleListening,
            turns: 0,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> AssistantState {
        self.state
    }

    /// Completed turns (wake word through spoken reply)
    #[must_use]
    pub const fn turns(&self) -> usize {
        self.turns
    }

    /// The session, for inspection
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Run until an exit phrase, an interrupt, or an unrecoverable error
    ///
    /// Resources are released on every path before returning.
    ///
    /// # Errors
    ///
    /// Returns errors raised outside a turn, such as a failed frame read or a
    /// rejected frame. Interrupts are not errors.
    pub async fn run(&mut self) -> Result<()> {
        let outcome = match self.run_loop().await {
            Err(Error::Interrupted) => {
                tracing::info!("Stopping assistant.");
                Ok(())
            }
            other => other,
        };

        self.cleanup();
        outcome
    }

    async fn run_loop(&mut self) -> Result<()> {
        tracing::info!(
            "Assistant is ready. Listening for '{}'...",
            self.settings.keyword
        );
        self.say(phrases::READY).await?;

        loop {
            if self.step().await? == Flow::Exit {
                return Ok(());
            }
        }
    }

    /// One loop iteration: read a frame and, if the wake word fired, run a
    /// full turn
    ///
    /// # Errors
    ///
    /// `Error::Interrupted` once shutdown is requested; frame read, engine
    /// and recording errors as-is
    pub async fn step(&mut self) -> Result<Flow> {
        self.checkpoint()?;
        self.state = AssistantState::IdleListening;

        let Some(listened) = self
            .shutdown
            .run_until_triggered(self.session.listen())
            .await
        else {
            return self.interrupted();
        };
        let keyword_index = listened?;
        if keyword_index < 0 {
            return Ok(Flow::Continue);
        }

        tracing::info!(keyword_index, "Wake word detected!");
        self.turn().await
    }

    async fn turn(&mut self) -> Result<Flow> {
        self.state = AssistantState::RecordingCommand;
        self.say(phrases::ACK).await?;
        self.checkpoint()?;

        tracing::info!("Listening for command...");
        let audio = self.session.record(self.settings.record_seconds)?;

        self.state = AssistantState::Processing;
        let reply = match self.process(&audio).await {
            None => return self.interrupted(),
            Some(Reply::Farewell) => {
                self.say(phrases::FAREWELL).await?;
                self.state = AssistantState::ShuttingDown;
                return Ok(Flow::Exit);
            }
            Some(Reply::Say(text)) => text,
        };
        self.checkpoint()?;

        self.state = AssistantState::Speaking;
        self.say(&reply).await?;
        self.turns += 1;

        tracing::info!("Returning to wake word listening...");
        self.state = AssistantState::IdleListening;
        Ok(Flow::Continue)
    }

    /// Transcribe and answer; every failure becomes a spoken apology
    ///
    /// `None` when shutdown was requested while a service call was pending.
    async fn process(&self, audio: &CommandBuffer) -> Option<Reply> {
        tracing::info!("Recognizing command...");
        let transcribed = self
            .shutdown
            .run_until_triggered(self.transcriber.transcribe(audio))
            .await?;
        let command = match transcribed {
            Ok(command) => command,
            Err(e) => return Some(Reply::Say(apology_for_transcription(&e).to_string())),
        };

        tracing::info!("You (command): {command}");
        if is_exit_phrase(&command) {
            return Some(Reply::Farewell);
        }

        tracing::info!("Processing your request...");
        let answered = self
            .shutdown
            .run_until_triggered(self.responder.complete(&self.settings.persona, &command))
            .await?;
        Some(match answered {
            Ok(reply) => Reply::Say(reply),
            Err(e) => Reply::Say(apology_for_chat(&e).to_string()),
        })
    }

    /// Speak `text`, abandoning synthesis and playback on interrupt
    async fn say(&mut self, text: &str) -> Result<()> {
        let spoken = self
            .shutdown
            .run_until_triggered(self.speaker.speak(text))
            .await;
        if spoken.is_none() {
            return self.interrupted();
        }
        Ok(())
    }

    fn checkpoint(&mut self) -> Result<()> {
        if self.shutdown.is_triggered() {
            return self.interrupted();
        }
        Ok(())
    }

    fn interrupted<T>(&mut self) -> Result<T> {
        self.state = AssistantState::ShuttingDown;
        Err(Error::Interrupted)
    }

    /// Release all session resources; safe to call repeatedly
    pub fn cleanup(&mut self) {
        self.state = AssistantState::ShuttingDown;
        self.session.shutdown();
        tracing::info!("Cleanup complete.");
    }
}

enum Reply {
    Say(String),
    Farewell,
}

/// Phrase spoken when transcription fails
#[must_use]
pub fn apology_for_transcription(error: &TranscribeError) -> &'static str {
    match error {
        TranscribeError::NoSpeech => phrases::NO_SPEECH,
        TranscribeError::ServiceUnavailable(reason) => {
            tracing::warn!(%reason, "speech recognition unavailable");
            phrases::STT_UNAVAILABLE
        }
        TranscribeError::Unknown(reason) => {
            tracing::error!("An unexpected error occurred: {reason}");
            phrases::UNEXPECTED
        }
    }
}

/// Phrase spoken when the chat service fails
#[must_use]
pub fn apology_for_chat(error: &ChatError) -> &'static str {
    match error {
        ChatError::Service(reason) => {
            tracing::warn!(%reason, "chat service error");
            phrases::CHAT_FAILED
        }
        ChatError::Unknown(reason) => {
            tracing::error!("An unexpected error occurred: {reason}");
            phrases::UNEXPECTED
        }
    }
}
