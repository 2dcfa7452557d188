//! Session lifecycle and the foreground polling surface.
//!
//! One [`Session`] owns one background capture thread. `start` blocks while
//! the engine warms up and the device opens (seconds, by design); after that
//! every foreground call returns immediately with a snapshot taken under a
//! briefly-held lock. Worker failures are surfaced lazily on the next
//! `status` poll rather than pushed.

mod state;
#[cfg(test)]
mod stubs;
mod worker;

use crate::audio::{DeviceError, MicSource, SampleSource};
use crate::config::{ConfigError, EngineSettings, SessionConfig};
use crate::engine::{EngineError, RecognitionEngine};
use crate::lock_or_recover;
use state::SharedState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use thiserror::Error;
use tracing::debug;
use worker::{run_capture_loop, WorkerSettings};

/// Why `start` failed. All variants require caller action; nothing is
/// retried internally.
#[derive(Debug, Error)]
pub enum StartError {
    /// `start` was called while a previous start is still in effect. Call
    /// [`Session::stop`] first to tear the old worker down.
    #[error("session already started")]
    AlreadyStarted,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("engine configuration failed: {0}")]
    Engine(#[from] EngineError),
    #[error("audio device failed: {0}")]
    Device(#[from] DeviceError),
    #[error("failed to spawn capture thread: {0}")]
    Spawn(std::io::Error),
}

/// Snapshot returned by [`Session::status`]. `NewResult` is reported exactly
/// once per finalized utterance.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PollStatus {
    /// `start` has not succeeded (or `stop` tore the session down).
    NotStarted,
    /// The capture thread terminated unexpectedly; see the log for why.
    WorkerDied,
    Silence,
    Speaking,
    NewResult,
}

impl PollStatus {
    /// Integer form of the polling contract: -2 not initialized, -1 worker
    /// crashed, 0 silence, 1 speaking, 2 new result available.
    pub fn code(self) -> i32 {
        match self {
            PollStatus::NotStarted => -2,
            PollStatus::WorkerDied => -1,
            PollStatus::Silence => 0,
            PollStatus::Speaking => 1,
            PollStatus::NewResult => 2,
        }
    }
}

struct Worker {
    handle: thread::JoinHandle<()>,
    cancel: Arc<AtomicBool>,
}

/// One microphone-to-text session: a capture thread plus the shared state
/// the foreground polls. Independently constructible; multiple sessions may
/// coexist in one process.
pub struct Session {
    state: Arc<Mutex<SharedState>>,
    worker: Option<Worker>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SharedState::new(
                crate::config::DEFAULT_MAX_TEXT_CHARS,
            ))),
            worker: None,
        }
    }

    /// Configure the engine, open the microphone, and spawn the capture
    /// thread.
    ///
    /// `make_engine` receives the resolved credential and model location;
    /// engine warm-up can take seconds, so this call blocks by design.
    /// Calling `start` again while a previous start is in effect fails with
    /// [`StartError::AlreadyStarted`].
    pub fn start<F>(&mut self, config: &SessionConfig, make_engine: F) -> Result<(), StartError>
    where
        F: FnOnce(&EngineSettings) -> Result<Box<dyn RecognitionEngine>, EngineError>,
    {
        if self.worker.is_some() {
            return Err(StartError::AlreadyStarted);
        }
        config.validate()?;
        let settings = config.engine_settings()?;
        let engine = make_engine(&settings)?;
        let sample_rate = engine.sample_rate();
        let frame_length = engine.frame_length();
        let device = config.input_device.clone();
        self.spawn(config, engine, move || {
            MicSource::open(device.as_deref(), sample_rate, frame_length)
                .map(|mic| Box::new(mic) as Box<dyn SampleSource>)
        })
    }

    /// Like [`Session::start`] but with a caller-supplied audio source in
    /// place of the microphone. The closure runs on the capture thread,
    /// because audio stream handles generally cannot move between threads.
    pub fn start_with_source<S>(
        &mut self,
        config: &SessionConfig,
        engine: Box<dyn RecognitionEngine>,
        open_source: S,
    ) -> Result<(), StartError>
    where
        S: FnOnce() -> Result<Box<dyn SampleSource>, DeviceError> + Send + 'static,
    {
        if self.worker.is_some() {
            return Err(StartError::AlreadyStarted);
        }
        config.validate()?;
        self.spawn(config, engine, open_source)
    }

    fn spawn<S>(
        &mut self,
        config: &SessionConfig,
        engine: Box<dyn RecognitionEngine>,
        open_source: S,
    ) -> Result<(), StartError>
    where
        S: FnOnce() -> Result<Box<dyn SampleSource>, DeviceError> + Send + 'static,
    {
        let state = Arc::new(Mutex::new(SharedState::new(config.max_text_chars)));
        let cancel = Arc::new(AtomicBool::new(false));
        let settings = WorkerSettings {
            long_mute_frames: config.long_mute_frames,
            force_endpoint_frames: config.force_endpoint_frames,
            trace_partials: config.trace_partials,
        };

        // The source is opened on the capture thread; the outcome is handed
        // back over a one-shot channel so `start` can still report
        // device-open failures synchronously.
        let (opened_tx, opened_rx) = mpsc::sync_channel::<Result<(), DeviceError>>(1);
        let thread_state = state.clone();
        let thread_cancel = cancel.clone();
        let handle = thread::Builder::new()
            .name("voicepoll-capture".into())
            .spawn(move || {
                let source = match open_source() {
                    Ok(source) => {
                        let _ = opened_tx.send(Ok(()));
                        source
                    }
                    Err(err) => {
                        let _ = opened_tx.send(Err(err));
                        return;
                    }
                };
                run_capture_loop(engine, source, thread_state, thread_cancel, settings);
            })
            .map_err(StartError::Spawn)?;

        match opened_rx.recv() {
            Ok(Ok(())) => {
                debug!("capture thread started");
                self.state = state;
                self.worker = Some(Worker { handle, cancel });
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(StartError::Device(err))
            }
            Err(_) => {
                // The thread died before reporting; treat it as a stream
                // failure rather than panicking the caller.
                let _ = handle.join();
                Err(StartError::Device(DeviceError::Stream(
                    "capture thread exited during startup".into(),
                )))
            }
        }
    }

    /// Non-blocking poll of the current utterance state.
    ///
    /// Consumes the ready flag: each finalized utterance is reported as
    /// [`PollStatus::NewResult`] by exactly one call. A dead capture thread
    /// takes precedence over any pending result, matching the error-first
    /// sanity check of the integer contract.
    pub fn status(&self) -> PollStatus {
        let Some(worker) = &self.worker else {
            return PollStatus::NotStarted;
        };
        if worker.handle.is_finished() {
            return PollStatus::WorkerDied;
        }

        let mut shared = lock_or_recover(&self.state, "status poll");
        if shared.ready {
            shared.ready = false;
            PollStatus::NewResult
        } else if shared.active {
            PollStatus::Speaking
        } else {
            PollStatus::Silence
        }
    }

    /// Copy of the last finalized utterance, empty if nothing has ever
    /// completed. Stable until the next finalize.
    pub fn heard(&self) -> String {
        lock_or_recover(&self.state, "heard").result.clone()
    }

    /// Whether the capture thread is alive.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|worker| !worker.handle.is_finished())
            .unwrap_or(false)
    }

    /// Cancel the capture thread and wait for it to exit.
    ///
    /// Cancellation is cooperative: the worker notices the flag at its next
    /// loop-top checkpoint, so this blocks for at most one device read plus
    /// one engine call. Safe to call whether or not `start` succeeded; the
    /// session can be started again afterwards.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.cancel.store(true, Ordering::Relaxed);
            let _ = worker.handle.join();
            debug!("capture thread joined");
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}
