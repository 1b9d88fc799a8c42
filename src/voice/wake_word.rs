//! Wake word detection
//!
//! Engines consume one frame at a time and report a keyword index, `>= 0`
//! when the configured keyword fired and [`NO_KEYWORD`] otherwise.
//!
//! Two engines are available: Picovoice Porcupine (feature `porcupine`) and
//! [`KeywordSpotter`], which gates speech segments by energy and verifies the
//! keyword through the speech-to-text service.

use async_trait::async_trait;

use super::capture::{SAMPLE_WIDTH, rms};
use super::recorder::CommandBuffer;
use super::stt::Transcriber;
use crate::config::{WakeConfig, WakeEngineKind};
use crate::error::TranscribeError;
use crate::{Error, Result};

/// Index returned when no keyword was detected in a frame
pub const NO_KEYWORD: i32 = -1;

/// A frame-by-frame wake word engine
#[async_trait(?Send)]
pub trait WakeWordEngine {
    /// Sample rate the engine expects
    fn sample_rate(&self) -> u32;

    /// Exact number of samples per frame the engine expects
    fn frame_length(&self) -> usize;

    /// Process one frame
    ///
    /// # Errors
    ///
    /// Returns `Error::WakeWord` if the frame has the wrong length or the
    /// engine has been deleted
    async fn process(&mut self, frame: &[i16]) -> Result<i32>;

    /// Release engine resources; later calls to `process` fail
    fn delete(&mut self);
}

/// Build the engine selected by the configuration
///
/// `transcriber` is only used by the transcript engine.
///
/// # Errors
///
/// Returns error if the engine cannot be initialized
pub fn build_engine(
    config: &WakeConfig,
    transcriber: Box<dyn Transcriber>,
) -> Result<Box<dyn WakeWordEngine>> {
    match config.engine {
        WakeEngineKind::Transcript => Ok(Box::new(KeywordSpotter::new(
            &config.keyword,
            transcriber,
        )?)),
        WakeEngineKind::Porcupine => porcupine_engine(config),
    }
}

#[cfg(feature = "porcupine")]
fn porcupine_engine(config: &WakeConfig) -> Result<Box<dyn WakeWordEngine>> {
    use secrecy::ExposeSecret;

    let access_key = config
        .access_key
        .as_ref()
        .ok_or_else(|| Error::Config("PICOVOICE_ACCESS_KEY required".to_string()))?;

    Ok(Box::new(PorcupineEngine::new(
        access_key.expose_secret(),
        &config.keyword_path,
    )?))
}

#[cfg(not(feature = "porcupine"))]
fn porcupine_engine(_config: &WakeConfig) -> Result<Box<dyn WakeWordEngine>> {
    Err(Error::Config(
        "built without the `porcupine` feature; set HARK_WAKE_ENGINE=transcript".to_string(),
    ))
}

fn check_frame(frame: &[i16], expected: usize) -> Result<()> {
    if frame.len() == expected {
        Ok(())
    } else {
        Err(Error::WakeWord(format!(
            "frame has {} samples, engine expects {expected}",
            frame.len()
        )))
    }
}

/// Picovoice Porcupine engine with a single keyword model
#[cfg(feature = "porcupine")]
pub struct PorcupineEngine {
    inner: Option<porcupine::Porcupine>,
    sample_rate: u32,
    frame_length: usize,
}

#[cfg(feature = "porcupine")]
impl PorcupineEngine {
    /// Create an engine for the keyword model at `keyword_path`
    ///
    /// # Errors
    ///
    /// Returns error if the access key is rejected or the model cannot be loaded
    pub fn new(access_key: &str, keyword_path: &std::path::Path) -> Result<Self> {
        let inner =
            porcupine::PorcupineBuilder::new_with_keyword_paths(access_key, &[keyword_path])
                .init()
                .map_err(|e| Error::WakeWord(e.to_string()))?;

        let sample_rate = inner.sample_rate();
        let frame_length = inner.frame_length() as usize;

        tracing::debug!(
            keyword_path = %keyword_path.display(),
            sample_rate,
            frame_length,
            "porcupine initialized"
        );

        Ok(Self {
            inner: Some(inner),
            sample_rate,
            frame_length,
        })
    }
}

#[cfg(feature = "porcupine")]
#[async_trait(?Send)]
impl WakeWordEngine for PorcupineEngine {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frame_length(&self) -> usize {
        self.frame_length
    }

    async fn process(&mut self, frame: &[i16]) -> Result<i32> {
        let engine = self
            .inner
            .as_ref()
            .ok_or_else(|| Error::WakeWord("engine already deleted".to_string()))?;
        check_frame(frame, self.frame_length)?;

        engine
            .process(frame)
            .map_err(|e| Error::WakeWord(e.to_string()))
    }

    fn delete(&mut self) {
        if self.inner.take().is_some() {
            tracing::debug!("porcupine released");
        }
    }
}

/// Sample rate of the keyword spotter
pub const SPOTTER_SAMPLE_RATE: u32 = 16000;

/// Frame length of the keyword spotter (32 ms at 16 kHz)
pub const SPOTTER_FRAME_LENGTH: usize = 512;

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum voiced samples for a segment to be worth checking
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Silence duration that ends a segment (in samples)
const SILENCE_SAMPLES: usize = 8000; // 0.5 seconds

/// Segments are cut off at this length
const MAX_SEGMENT_SAMPLES: usize = SPOTTER_SAMPLE_RATE as usize * 5;

/// State of the keyword spotter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotterState {
    /// Waiting for speech
    Idle,
    /// Detected potential speech, accumulating
    Listening,
}

/// Detects a spoken keyword by transcribing energy-gated speech segments
pub struct KeywordSpotter {
    keyword: String,
    transcriber: Option<Box<dyn Transcriber>>,
    state: SpotterState,
    speech_buffer: Vec<i16>,
    voiced_samples: usize,
    silence_counter: usize,
}

impl KeywordSpotter {
    /// Create a keyword spotter
    ///
    /// # Errors
    ///
    /// Returns error if the keyword is empty
    pub fn new(keyword: &str, transcriber: Box<dyn Transcriber>) -> Result<Self> {
        let keyword = keyword.trim().to_lowercase();
        if keyword.is_empty() {
            return Err(Error::WakeWord("keyword must not be empty".to_string()));
        }

        tracing::debug!(keyword = %keyword, "keyword spotter initialized");

        Ok(Self {
            keyword,
            transcriber: Some(transcriber),
            state: SpotterState::Idle,
            speech_buffer: Vec::new(),
            voiced_samples: 0,
            silence_counter: 0,
        })
    }

    /// Check if a transcript contains the keyword
    #[must_use]
    pub fn matches(&self, transcript: &str) -> bool {
        transcript.to_lowercase().contains(&self.keyword)
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> SpotterState {
        self.state
    }

    /// Get the normalized keyword
    #[must_use]
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Feed one frame, returning a completed speech segment if one just ended
    fn segment(&mut self, frame: &[i16]) -> Option<Vec<i16>> {
        let energy = rms(frame);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            SpotterState::Idle => {
                if is_speech {
                    self.state = SpotterState::Listening;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(frame);
                    self.voiced_samples = frame.len();
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech detected, listening");
                }
                None
            }
            SpotterState::Listening => {
                self.speech_buffer.extend_from_slice(frame);

                if is_speech {
                    self.voiced_samples += frame.len();
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += frame.len();
                }

                let ended = self.silence_counter > SILENCE_SAMPLES;
                let enough_speech = self.voiced_samples > MIN_SPEECH_SAMPLES;

                if (ended && enough_speech) || self.speech_buffer.len() >= MAX_SEGMENT_SAMPLES {
                    let segment = std::mem::take(&mut self.speech_buffer);
                    tracing::debug!(samples = segment.len(), "speech segment complete");
                    self.reset();
                    return Some(segment);
                }

                if ended {
                    tracing::trace!("too little speech - resetting");
                    self.reset();
                }

                None
            }
        }
    }

    /// Reset to idle
    pub fn reset(&mut self) {
        self.state = SpotterState::Idle;
        self.speech_buffer.clear();
        self.voiced_samples = 0;
        self.silence_counter = 0;
    }
}

#[async_trait(?Send)]
impl WakeWordEngine for KeywordSpotter {
    fn sample_rate(&self) -> u32 {
        SPOTTER_SAMPLE_RATE
    }

    fn frame_length(&self) -> usize {
        SPOTTER_FRAME_LENGTH
    }

    async fn process(&mut self, frame: &[i16]) -> Result<i32> {
        if self.transcriber.is_none() {
            return Err(Error::WakeWord("engine already deleted".to_string()));
        }
        check_frame(frame, SPOTTER_FRAME_LENGTH)?;

        let Some(segment) = self.segment(frame) else {
            return Ok(NO_KEYWORD);
        };
        let Some(transcriber) = self.transcriber.as_ref() else {
            return Ok(NO_KEYWORD);
        };

        let audio = CommandBuffer::new(segment, SPOTTER_SAMPLE_RATE, SAMPLE_WIDTH);
        match transcriber.transcribe(&audio).await {
            Ok(transcript) if self.matches(&transcript) => {
                tracing::info!(
                    keyword = %self.keyword,
                    transcript = %transcript,
                    "wake word detected"
                );
                Ok(0)
            }
            Ok(transcript) => {
                tracing::debug!(transcript = %transcript, "no wake word in segment");
                Ok(NO_KEYWORD)
            }
            Err(TranscribeError::NoSpeech) => Ok(NO_KEYWORD),
            Err(e) => {
                tracing::warn!(error = %e, "wake word check failed");
                Ok(NO_KEYWORD)
            }
        }
    }

    fn delete(&mut self) {
        if self.transcriber.take().is_some() {
            self.reset();
            tracing::debug!("keyword spotter released");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::voice::stt::TranscribeResult;

    struct FakeTranscriber {
        reply: TranscribeResult,
        calls: Rc<RefCell<usize>>,
    }

    #[async_trait(?Send)]
    impl Transcriber for FakeTranscriber {
        async fn transcribe(&self, _audio: &CommandBuffer) -> TranscribeResult {
            *self.calls.borrow_mut() += 1;
            self.reply.clone()
        }
    }

    fn spotter(reply: TranscribeResult) -> (KeywordSpotter, Rc<RefCell<usize>>) {
        let calls = Rc::new(RefCell::new(0));
        let transcriber = FakeTranscriber {
            reply,
            calls: Rc::clone(&calls),
        };
        (
            KeywordSpotter::new("  Krishna ", Box::new(transcriber)).unwrap(),
            calls,
        )
    }

    fn loud() -> Vec<i16> {
        (0..SPOTTER_FRAME_LENGTH)
            .map(|i| if i % 2 == 0 { 8000 } else { -8000 })
            .collect()
    }

    fn quiet() -> Vec<i16> {
        vec![0; SPOTTER_FRAME_LENGTH]
    }

    /// Feed 0.5 s of speech then silence until the segment closes
    async fn speak_segment(spotter: &mut KeywordSpotter) -> Vec<i32> {
        let mut results = Vec::new();
        for _ in 0..16 {
            results.push(spotter.process(&loud()).await.unwrap());
        }
        for _ in 0..16 {
            results.push(spotter.process(&quiet()).await.unwrap());
        }
        results
    }

    #[test]
    fn test_keyword_normalized() {
        let (spotter, _) = spotter(Ok(String::new()));
        assert_eq!(spotter.keyword(), "krishna");
        assert!(spotter.matches("Hey KRISHNA, you there?"));
        assert!(!spotter.matches("hello world"));
    }

    #[test]
    fn test_empty_keyword_rejected() {
        let calls = Rc::new(RefCell::new(0));
        let transcriber = FakeTranscriber {
            reply: Ok(String::new()),
            calls,
        };
        assert!(KeywordSpotter::new("   ", Box::new(transcriber)).is_err());
    }

    #[tokio::test]
    async fn test_silence_never_fires() {
        let (mut spotter, calls) = spotter(Ok("krishna".to_string()));
        for _ in 0..100 {
            assert_eq!(spotter.process(&quiet()).await.unwrap(), NO_KEYWORD);
        }
        assert_eq!(spotter.state(), SpotterState::Idle);
        assert_eq!(*calls.borrow(), 0);
    }

    #[tokio::test]
    async fn test_segment_with_keyword_fires() {
        let (mut spotter, calls) = spotter(Ok("Krishna what time is it".to_string()));
        let results = speak_segment(&mut spotter).await;

        assert_eq!(results.iter().filter(|&&r| r == 0).count(), 1);
        assert_eq!(*results.last().unwrap(), 0);
        assert_eq!(*calls.borrow(), 1);
        assert_eq!(spotter.state(), SpotterState::Idle);
    }

    #[tokio::test]
    async fn test_segment_without_keyword_is_ignored() {
        let (mut spotter, calls) = spotter(Ok("good morning".to_string()));
        let results = speak_segment(&mut spotter).await;

        assert!(results.iter().all(|&r| r == NO_KEYWORD));
        assert_eq!(*calls.borrow(), 1);
    }

    #[tokio::test]
    async fn test_stt_failure_is_not_a_match() {
        let (mut spotter, _) = spotter(Err(TranscribeError::ServiceUnavailable(
            "offline".to_string(),
        )));
        let results = speak_segment(&mut spotter).await;
        assert!(results.iter().all(|&r| r == NO_KEYWORD));
    }

    #[tokio::test]
    async fn test_short_noise_is_discarded() {
        let (mut spotter, calls) = spotter(Ok("krishna".to_string()));
        spotter.process(&loud()).await.unwrap();
        assert_eq!(spotter.state(), SpotterState::Listening);

        for _ in 0..20 {
            spotter.process(&quiet()).await.unwrap();
        }
        assert_eq!(spotter.state(), SpotterState::Idle);
        assert_eq!(*calls.borrow(), 0);
    }

    #[tokio::test]
    async fn test_wrong_frame_length_rejected() {
        let (mut spotter, _) = spotter(Ok(String::new()));
        assert!(spotter.process(&[0; 100]).await.is_err());
    }

    #[tokio::test]
    async fn test_deleted_engine_rejects_frames() {
        let (mut spotter, _) = spotter(Ok(String::new()));
        spotter.delete();
        spotter.delete();
        assert!(spotter.process(&quiet()).await.is_err());
    }
}
