//! Fixed-window command recording

use std::time::Duration;

use super::capture::{FrameSource, SAMPLE_WIDTH};
use crate::{Error, Result};

/// Audio recorded for one command, tagged with its format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBuffer {
    /// Mono 16-bit samples in capture order
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Bytes per sample
    pub sample_width: u16,
}

impl CommandBuffer {
    /// Wrap recorded samples
    #[must_use]
    pub const fn new(samples: Vec<i16>, sample_rate: u32, sample_width: u16) -> Self {
        Self {
            samples,
            sample_rate,
            sample_width,
        }
    }

    /// Playback length of the buffer
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.samples.len() as u64 * 1000 / u64::from(self.sample_rate))
    }

    /// Whether any samples were recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Number of frames that make up a window of `seconds`
///
/// Truncates, so 16 kHz with 512-sample frames over 10 s gives 312 frames.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
#[must_use]
pub fn frames_for_window(sample_rate: u32, frame_length: usize, seconds: u32) -> usize {
    if frame_length == 0 {
        return 0;
    }
    (f64::from(sample_rate) / frame_length as f64 * f64::from(seconds)) as usize
}

/// Record a fixed window of audio from `source`
///
/// Always reads the full window; there is no early stop on silence.
///
/// # Errors
///
/// Returns error if a frame read fails or shutdown is requested
pub fn record_command(
    source: &mut dyn FrameSource,
    sample_width: u16,
    seconds: u32,
) -> Result<CommandBuffer> {
    let sample_rate = source.sample_rate();
    let frame_length = source.frame_length();
    let frames = frames_for_window(sample_rate, frame_length, seconds);

    tracing::debug!(frames, seconds, "recording command");

    let mut samples = Vec::with_capacity(frames * frame_length);
    for _ in 0..frames {
        samples.extend(source.read_frame()?);
    }

    let buffer = CommandBuffer::new(samples, sample_rate, sample_width);
    tracing::debug!(
        samples = buffer.samples.len(),
        duration_ms = buffer.duration().as_millis(),
        "command recorded"
    );

    Ok(buffer)
}

/// Record back-to-back one-second windows, handing each to `report`
///
/// An interrupt ends monitoring early and is not an error. Returns the
/// number of whole seconds reported.
///
/// # Errors
///
/// Returns error if a frame read fails
pub fn monitor_input<F>(source: &mut dyn FrameSource, seconds: u64, mut report: F) -> Result<u64>
where
    F: FnMut(u64, &CommandBuffer),
{
    for second in 0..seconds {
        match record_command(source, SAMPLE_WIDTH, 1) {
            Ok(buffer) => report(second, &buffer),
            Err(Error::Interrupted) => {
                tracing::debug!(second, "input monitoring interrupted");
                return Ok(second);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(seconds)
}
