//! Audio capture: the sample source seam and the CPAL microphone backend.
//!
//! The capture thread consumes audio one fixed-size frame at a time through
//! [`SampleSource`]. The production implementation is [`MicSource`], which
//! opens an input device at the recognizer's required rate (mono, 16-bit)
//! and assembles callback buffers into exact frames.

mod dispatch;
mod mic;

pub use mic::MicSource;

use thiserror::Error;

/// Blocking, frame-at-a-time audio input.
///
/// `read_frame` must fill the slice completely or return an error; a short
/// read is never a valid outcome. Implementations are created on the capture
/// thread and used only there, so no `Send` bound is required.
pub trait SampleSource {
    fn read_frame(&mut self, frame: &mut [i16]) -> Result<(), DeviceError>;
}

/// Audio device failures. Open-time variants abort `start`; a read failure
/// mid-session terminates the capture thread and is reported to the
/// foreground as a dead worker on the next poll.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no usable input device: {0}")]
    NoDevice(String),
    #[error("input device rejected the requested configuration: {0}")]
    Unsupported(String),
    #[error("audio stream failed: {0}")]
    Stream(String),
    #[error("audio stream disconnected")]
    Disconnected,
    #[error("expected a frame of {expected} samples, got {got}")]
    ShortRead { expected: usize, got: usize },
}
