//! The recognition engine seam.
//!
//! The recognizer is an external, stateful black box: it takes one frame at
//! a time, may hand back a text fragment and an endpoint signal, and can be
//! flushed to force out whatever it is still buffering. Calls may block for
//! anything from microseconds to over a second; callers must never assume
//! bounded latency.

#[cfg(feature = "engine_whisper")]
pub mod whisper;

#[cfg(feature = "engine_whisper")]
pub use whisper::WhisperEngine;

use thiserror::Error;

/// One step of streaming recognition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    /// New transcription text, possibly empty. Empty is not an error.
    pub fragment: String,
    /// True when the engine believes the current utterance just ended.
    pub endpoint: bool,
}

/// Engine failures. `Init` aborts `start`; `Process` and `Flush` terminate
/// the capture thread and surface as a dead worker on the next poll.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine initialization failed: {0}")]
    Init(String),
    #[error("engine frame processing failed: {0}")]
    Process(String),
    #[error("engine flush failed: {0}")]
    Flush(String),
}

/// Streaming speech recognizer consuming fixed-size 16-bit mono frames.
///
/// Exactly one utterance is in flight per engine instance. The engine is
/// constructed on the foreground thread during `start` and then moved onto
/// the capture thread, so implementations must be `Send`.
pub trait RecognitionEngine: Send {
    /// Frame size in samples that `process_frame` expects.
    fn frame_length(&self) -> usize;

    /// Sample rate in Hz the audio source must be opened at.
    fn sample_rate(&self) -> u32;

    /// Feed one frame; may block for a variable duration.
    fn process_frame(&mut self, frame: &[i16]) -> Result<EngineOutput, EngineError>;

    /// Force out any buffered transcription and end the current utterance.
    /// Authoritative at an utterance boundary: its output replaces whatever
    /// the preceding `process_frame` returned.
    fn flush(&mut self) -> Result<String, EngineError>;
}
