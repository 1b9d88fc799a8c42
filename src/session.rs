//! Hardware and engine resources held for the lifetime of the assistant
//!
//! Resources are acquired in order (wake word engine, input device, capture
//! stream) and released in reverse. Each one is released at most once, and
//! only if it was acquired, so a session that failed half-way through
//! [`Session::open`] still cleans up correctly when dropped.

use crate::voice::{
    CommandBuffer, FrameSource, InputDevice, SAMPLE_WIDTH, WakeWordEngine, record_command,
};
use crate::{Error, Result};

/// Which resources a call to [`Session::shutdown`] actually released
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Released {
    /// Capture stream was closed
    pub stream: bool,
    /// Input device was terminated
    pub device: bool,
    /// Wake word engine was deleted
    pub engine: bool,
}

impl Released {
    /// Whether nothing was left to release
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.stream && !self.device && !self.engine
    }
}

/// Owns the wake word engine, input device and capture stream
pub struct Session {
    engine: Option<Box<dyn WakeWordEngine>>,
    device: Option<Box<dyn InputDevice>>,
    stream: Option<Box<dyn FrameSource>>,
    sample_width: u16,
}

impl Session {
    /// Acquire engine, device and stream in that order
    ///
    /// The stream is opened at the engine's sample rate and frame length.
    ///
    /// # Errors
    ///
    /// Returns the first acquisition error; anything acquired before it is
    /// released
    pub fn open<E, D>(make_engine: E, make_device: D) -> Result<Self>
    where
        E: FnOnce() -> Result<Box<dyn WakeWordEngine>>,
        D: FnOnce() -> Result<Box<dyn InputDevice>>,
    {
        let mut session = Self {
            engine: None,
            device: None,
            stream: None,
            sample_width: SAMPLE_WIDTH,
        };

        let engine = session.engine.insert(make_engine()?);
        let (sample_rate, frame_length) = (engine.sample_rate(), engine.frame_length());
        tracing::debug!(sample_rate, frame_length, "wake word engine ready");

        let device = session.device.insert(make_device()?);
        session.sample_width = device.sample_width();

        let stream = device.open_stream(sample_rate, frame_length)?;
        session.stream = Some(stream);

        Ok(session)
    }

    /// Whether all three resources are held
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.engine.is_some() && self.device.is_some() && self.stream.is_some()
    }

    /// Bytes per recorded sample
    #[must_use]
    pub const fn sample_width(&self) -> u16 {
        self.sample_width
    }

    /// Read one frame and run it through the wake word engine
    ///
    /// # Errors
    ///
    /// Returns error if the session is shut down, the read fails or is
    /// interrupted, or the engine rejects the frame
    pub async fn listen(&mut self) -> Result<i32> {
        let (Some(stream), Some(engine)) = (self.stream.as_mut(), self.engine.as_mut()) else {
            return Err(released());
        };

        let frame = stream.read_frame()?;
        engine.process(&frame).await
    }

    /// Record a command window of `seconds` from the capture stream
    ///
    /// # Errors
    ///
    /// Returns error if the session is shut down or a read fails
    pub fn record(&mut self, seconds: u32) -> Result<CommandBuffer> {
        let stream = self.stream.as_deref_mut().ok_or_else(released)?;
        record_command(stream, self.sample_width, seconds)
    }

    /// Release stream, device and engine, in that order
    ///
    /// Safe to call any number of times; later calls release nothing.
    pub fn shutdown(&mut self) -> Released {
        let mut released = Released::default();

        if let Some(mut stream) = self.stream.take() {
            stream.close();
            released.stream = true;
        }
        if let Some(mut device) = self.device.take() {
            device.terminate();
            released.device = true;
        }
        if let Some(mut engine) = self.engine.take() {
            engine.delete();
            released.engine = true;
        }

        if !released.is_empty() {
            tracing::debug!(?released, "session resources released");
        }
        released
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn released() -> Error {
    Error::Audio("session already shut down".to_string())
}
