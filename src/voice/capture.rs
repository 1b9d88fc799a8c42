//! Audio capture from microphone
//!
//! The capture callback pushes 16-bit samples into a bounded queue; the
//! assistant pulls fixed-size frames out of it with a blocking read.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::lifecycle::ShutdownSignal;
use crate::{Error, Result};

/// Bytes per sample for 16-bit signed PCM
pub const SAMPLE_WIDTH: u16 = 2;

/// Frames kept while nobody is reading; older samples are dropped
const MAX_PENDING_FRAMES: usize = 8;

/// How long a blocked read waits before re-checking the shutdown signal
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// A source of fixed-length mono 16-bit frames
pub trait FrameSource {
    /// Sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Samples per frame
    fn frame_length(&self) -> usize;

    /// Block until exactly one frame is available and return it
    ///
    /// # Errors
    ///
    /// Returns `Error::Interrupted` if shutdown is requested while waiting,
    /// or `Error::Audio` if the stream is closed
    fn read_frame(&mut self) -> Result<Vec<i16>>;

    /// Stop the stream and release the device
    fn close(&mut self);
}

/// An audio input device that can open capture streams
pub trait InputDevice {
    /// Bytes per sample of the streams this device opens
    fn sample_width(&self) -> u16 {
        SAMPLE_WIDTH
    }

    /// Open a mono 16-bit capture stream
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot capture at the requested format
    fn open_stream(&mut self, sample_rate: u32, frame_length: usize)
    -> Result<Box<dyn FrameSource>>;

    /// Release the device handle
    fn terminate(&mut self);
}

/// The default input device of the default cpal host
pub struct AudioHost {
    device: Option<Device>,
    shutdown: ShutdownSignal,
}

impl AudioHost {
    /// Acquire the default input device
    ///
    /// # Errors
    ///
    /// Returns error if no input device is available
    pub fn new(shutdown: ShutdownSignal) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            "input device acquired"
        );

        Ok(Self {
            device: Some(device),
            shutdown,
        })
    }
}

impl InputDevice for AudioHost {
    fn open_stream(
        &mut self,
        sample_rate: u32,
        frame_length: usize,
    ) -> Result<Box<dyn FrameSource>> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| Error::Audio("input device already released".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
            .ok_or_else(|| {
                Error::Audio(format!("no mono input config at {sample_rate} Hz"))
            })?;

        let config: StreamConfig = supported_config
            .with_sample_rate(SampleRate(sample_rate))
            .config();

        let pending = Arc::new(Pending::default());
        let writer = Arc::clone(&pending);
        let capacity = frame_length * MAX_PENDING_FRAMES;

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    writer.push(data, capacity);
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        tracing::debug!(sample_rate, frame_length, "audio capture started");

        Ok(Box::new(CaptureStream {
            stream: Some(stream),
            pending,
            sample_rate,
            frame_length,
            shutdown: self.shutdown.clone(),
        }))
    }

    fn terminate(&mut self) {
        if self.device.take().is_some() {
            tracing::debug!("input device released");
        }
    }
}

/// Samples written by the capture callback, waiting to be read
#[derive(Default)]
struct Pending {
    samples: Mutex<VecDeque<i16>>,
    ready: Condvar,
}

impl Pending {
    fn push(&self, data: &[f32], capacity: usize) {
        if let Ok(mut queue) = self.samples.lock() {
            queue.extend(data.iter().map(|&s| f32_to_i16(s)));
            let overflow = queue.len().saturating_sub(capacity);
            if overflow > 0 {
                queue.drain(..overflow);
            }
            drop(queue);
            self.ready.notify_one();
        }
    }
}

/// A running capture stream
pub struct CaptureStream {
    stream: Option<Stream>,
    pending: Arc<Pending>,
    sample_rate: u32,
    frame_length: usize,
    shutdown: ShutdownSignal,
}

impl FrameSource for CaptureStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn read_frame(&mut self) -> Result<Vec<i16>> {
        if self.stream.is_none() {
            return Err(Error::Audio("capture stream closed".to_string()));
        }

        let poisoned = || Error::Audio("capture buffer poisoned".to_string());
        let mut queue = self.pending.samples.lock().map_err(|_| poisoned())?;

        while queue.len() < self.frame_length {
            if self.shutdown.is_triggered() {
                return Err(Error::Interrupted);
            }
            queue = self
                .pending
                .ready
                .wait_timeout(queue, WAIT_SLICE)
                .map_err(|_| poisoned())?
                .0;
        }

        Ok(queue.drain(..self.frame_length).collect())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }
}

/// Convert an f32 sample in [-1.0, 1.0] to i16
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// RMS level of 16-bit samples, normalized to [0.0, 1.0]
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples
        .iter()
        .map(|&s| {
            let v = f32::from(s) / 32768.0;
            v * v
        })
        .sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Encode 16-bit mono samples as WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
