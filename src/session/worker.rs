//! The background capture loop.
//!
//! One iteration per audio frame: check for cancellation, block on the
//! device read, gate through the noise floor, feed the recognizer, and
//! publish results into the shared state. The loop exits on cancellation or
//! on the first device/engine failure; neither is retried here, the
//! foreground learns about it on its next poll.

use super::state::SharedState;
use crate::audio::SampleSource;
use crate::engine::RecognitionEngine;
use crate::lock_or_recover;
use crate::noise::NoiseFloor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub(crate) struct WorkerSettings {
    pub(crate) long_mute_frames: u32,
    pub(crate) force_endpoint_frames: u32,
    pub(crate) trace_partials: bool,
}

/// Body of the capture thread.
///
/// The engine, source, noise model, and frame buffer are owned here and
/// never visible to the foreground; the only shared data is `state`.
pub(crate) fn run_capture_loop(
    mut engine: Box<dyn RecognitionEngine>,
    mut source: Box<dyn SampleSource>,
    state: Arc<Mutex<SharedState>>,
    cancel: Arc<AtomicBool>,
    settings: WorkerSettings,
) {
    let mut frame = vec![0i16; engine.frame_length()];
    let mut noise = NoiseFloor::new();
    let mut quiet: u32 = 0;

    loop {
        // Cancellation is honored between frames, never mid-call.
        if cancel.load(Ordering::Relaxed) {
            debug!("capture loop cancelled");
            return;
        }

        if let Err(err) = source.read_frame(&mut frame) {
            warn!("capture loop stopping, device read failed: {err}");
            return;
        }

        quiet = quiet.saturating_add(1);
        if noise.observe(&frame) {
            quiet = 0;
        }
        // Skip the recognizer while the input is definitely silent; this
        // also lets the loop catch up if engine latency put it behind the
        // audio stream.
        if quiet >= settings.long_mute_frames {
            continue;
        }

        let output = match engine.process_frame(&frame) {
            Ok(output) => output,
            Err(err) => {
                warn!("capture loop stopping, engine failed: {err}");
                return;
            }
        };
        let mut fragment = output.fragment;
        let mut endpoint = output.endpoint;

        // Silence-duration fallback: the engine's own endpointing is backed
        // up so an utterance can never stay active through trailing silence.
        if quiet == settings.force_endpoint_frames {
            endpoint = true;
        }

        if endpoint {
            // Flush output is authoritative at an utterance boundary.
            fragment = match engine.flush() {
                Ok(text) => text,
                Err(err) => {
                    warn!("capture loop stopping, engine flush failed: {err}");
                    return;
                }
            };
        }

        if fragment.is_empty() && !endpoint {
            continue;
        }

        let mut shared = lock_or_recover(&state, "capture loop");
        if !fragment.is_empty() {
            shared.append(&fragment);
            if !endpoint && settings.trace_partials {
                debug!(partial = shared.partial.as_str(), "partial transcript");
            }
        }
        // An endpoint with nothing accumulated is not an utterance.
        if endpoint && shared.active {
            shared.finalize();
        }
    }
}
