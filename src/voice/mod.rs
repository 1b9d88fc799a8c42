//! Voice processing module
//!
//! Handles audio capture, wake word detection, command recording,
//! speech-to-text, text-to-speech and playback.

mod capture;
mod playback;
mod recorder;
mod stt;
mod synth;
mod tts;
mod wake_word;

pub use capture::{
    AudioHost, CaptureStream, FrameSource, InputDevice, SAMPLE_WIDTH, rms, samples_to_wav,
};
pub use playback::{AudioPlayback, DecodedAudio, decode_mp3, sine_tone};
pub use recorder::{CommandBuffer, frames_for_window, monitor_input, record_command};
pub use stt::{SpeechToText, TranscribeResult, Transcriber};
pub use synth::{RESPONSE_AUDIO_FILE, Speaker, SpeechSynthesizer};
pub use tts::TextToSpeech;
#[cfg(feature = "porcupine")]
pub use wake_word::PorcupineEngine;
pub use wake_word::{
    KeywordSpotter, NO_KEYWORD, SPOTTER_FRAME_LENGTH, SPOTTER_SAMPLE_RATE, SpotterState,
    WakeWordEngine, build_engine,
};
