//! Microphone speech-to-text with a non-blocking polling interface.
//!
//! A [`Session`] owns one background capture thread that reads fixed-size
//! frames from a [`SampleSource`], gates them through an adaptive noise-floor
//! voice detector, and feeds voiced audio to a streaming
//! [`RecognitionEngine`]. The foreground polls [`Session::status`] and
//! [`Session::heard`]; neither call ever blocks on the recognizer.

pub mod audio;
pub mod config;
pub mod engine;
mod lock;
pub mod noise;
pub mod session;
pub mod text;

pub(crate) use lock::lock_or_recover;

pub use audio::{DeviceError, SampleSource};
pub use config::{ConfigError, EngineSettings, SessionConfig};
pub use engine::{EngineError, EngineOutput, RecognitionEngine};
pub use session::{PollStatus, Session, StartError};
