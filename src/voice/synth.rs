//! Spoken output: synthesize, write to a temp file, play, clean up

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::playback::AudioPlayback;
use super::tts::TextToSpeech;
use crate::Result;

/// File name used for the synthesized clip
pub const RESPONSE_AUDIO_FILE: &str = "response_audio.mp3";

/// Says things out loud
#[async_trait(?Send)]
pub trait Speaker {
    /// Speak `text`, returning once playback has finished
    ///
    /// Failures are logged and swallowed; the caller carries on either way.
    async fn speak(&mut self, text: &str);
}

/// Speaker backed by a TTS provider and the default output device
pub struct SpeechSynthesizer {
    tts: TextToSpeech,
    playback: Option<AudioPlayback>,
    audio_path: PathBuf,
}

impl SpeechSynthesizer {
    /// Create a synthesizer writing its clip into the OS temp directory
    #[must_use]
    pub fn new(tts: TextToSpeech) -> Self {
        Self::with_audio_path(tts, std::env::temp_dir().join(RESPONSE_AUDIO_FILE))
    }

    /// Create a synthesizer writing its clip to `audio_path`
    #[must_use]
    pub const fn with_audio_path(tts: TextToSpeech, audio_path: PathBuf) -> Self {
        Self {
            tts,
            playback: None,
            audio_path,
        }
    }

    /// Where the clip is written while it plays
    #[must_use]
    pub fn audio_path(&self) -> &Path {
        &self.audio_path
    }

    async fn render(&mut self, text: &str) -> Result<()> {
        let audio = self.tts.synthesize(text).await?;
        tokio::fs::write(&self.audio_path, &audio).await?;

        let played = self.play_file().await;
        remove_clip(&self.audio_path).await;
        played
    }

    async fn play_file(&mut self) -> Result<()> {
        if self.playback.is_none() {
            self.playback = Some(AudioPlayback::new()?);
        }

        let data = tokio::fs::read(&self.audio_path).await?;
        match self.playback.as_mut() {
            Some(playback) => playback.play_mp3(&data).await,
            None => Ok(()),
        }
    }
}

#[async_trait(?Send)]
impl Speaker for SpeechSynthesizer {
    async fn speak(&mut self, text: &str) {
        tracing::info!("Assistant (speaking): {text}");

        if let Err(e) = self.render(text).await {
            tracing::error!(error = %e, "error in text-to-speech");
            remove_clip(&self.audio_path).await;
        }
    }
}

async fn remove_clip(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(error = %e, path = %path.display(), "could not remove clip"),
    }
}
