//! Deterministic stand-ins for the device and engine used across session
//! tests. A frame counts as voiced when any sample magnitude exceeds 1000,
//! mirroring what the noise floor decides for the default model.

use crate::audio::{DeviceError, SampleSource};
use crate::engine::{EngineError, EngineOutput, RecognitionEngine};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) const FRAME_LEN: usize = 512;

/// Near-silence: peak of 5, below the noise floor's absolute minimum.
pub(crate) fn silent_frame() -> Vec<i16> {
    vec![5i16; FRAME_LEN]
}

/// Loud frame: peak of 2000, well above the default adaptive threshold.
pub(crate) fn voiced_frame() -> Vec<i16> {
    let mut frame = vec![5i16; FRAME_LEN];
    frame[0] = 2000;
    frame
}

/// Replays a fixed list of frames, then fails like a dead device.
pub(crate) struct ScriptSource {
    frames: VecDeque<Vec<i16>>,
    reads: Option<Arc<AtomicUsize>>,
}

impl ScriptSource {
    pub(crate) fn new(frames: Vec<Vec<i16>>) -> Self {
        Self {
            frames: frames.into(),
            reads: None,
        }
    }

    pub(crate) fn with_read_counter(mut self, reads: Arc<AtomicUsize>) -> Self {
        self.reads = Some(reads);
        self
    }
}

impl SampleSource for ScriptSource {
    fn read_frame(&mut self, frame: &mut [i16]) -> Result<(), DeviceError> {
        if let Some(reads) = &self.reads {
            reads.fetch_add(1, Ordering::Relaxed);
        }
        let next = self.frames.pop_front().ok_or(DeviceError::Disconnected)?;
        if next.len() != frame.len() {
            return Err(DeviceError::ShortRead {
                expected: frame.len(),
                got: next.len(),
            });
        }
        frame.copy_from_slice(&next);
        Ok(())
    }
}

/// Recognizer double: emits a fixed fragment for voiced frames, nothing for
/// silent ones, and never endpoints unless configured to.
pub(crate) struct StubEngine {
    voiced_fragment: String,
    flush_text: String,
    endpoint_on_voiced: bool,
    fail_process: bool,
    process_calls: Option<Arc<AtomicUsize>>,
    flush_calls: Option<Arc<AtomicUsize>>,
}

impl StubEngine {
    pub(crate) fn new(voiced_fragment: &str) -> Self {
        Self {
            voiced_fragment: voiced_fragment.to_string(),
            flush_text: String::new(),
            endpoint_on_voiced: false,
            fail_process: false,
            process_calls: None,
            flush_calls: None,
        }
    }

    pub(crate) fn with_flush_text(mut self, text: &str) -> Self {
        self.flush_text = text.to_string();
        self
    }

    pub(crate) fn with_endpoint_on_voiced(mut self) -> Self {
        self.endpoint_on_voiced = true;
        self
    }

    pub(crate) fn with_process_failure(mut self) -> Self {
        self.fail_process = true;
        self
    }

    pub(crate) fn with_process_counter(mut self, calls: Arc<AtomicUsize>) -> Self {
        self.process_calls = Some(calls);
        self
    }

    pub(crate) fn with_flush_counter(mut self, calls: Arc<AtomicUsize>) -> Self {
        self.flush_calls = Some(calls);
        self
    }
}

impl RecognitionEngine for StubEngine {
    fn frame_length(&self) -> usize {
        FRAME_LEN
    }

    fn sample_rate(&self) -> u32 {
        16_000
    }

    fn process_frame(&mut self, frame: &[i16]) -> Result<EngineOutput, EngineError> {
        if let Some(calls) = &self.process_calls {
            calls.fetch_add(1, Ordering::Relaxed);
        }
        if self.fail_process {
            return Err(EngineError::Process("stub failure".into()));
        }
        let voiced = frame.iter().any(|&s| i32::from(s).abs() > 1000);
        Ok(EngineOutput {
            fragment: if voiced {
                self.voiced_fragment.clone()
            } else {
                String::new()
            },
            endpoint: voiced && self.endpoint_on_voiced,
        })
    }

    fn flush(&mut self) -> Result<String, EngineError> {
        if let Some(calls) = &self.flush_calls {
            calls.fetch_add(1, Ordering::Relaxed);
        }
        Ok(self.flush_text.clone())
    }
}
