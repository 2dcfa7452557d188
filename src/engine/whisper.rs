//! Whisper-backed recognition engine.
//!
//! Wraps `whisper_rs` behind the streaming [`RecognitionEngine`] contract.
//! Whisper is a batch model, so the adapter buffers incoming frames and runs
//! one transcription pass when flushed. `process_frame` therefore never
//! reports text or an endpoint on its own; endpointing comes entirely from
//! the session's silence policy, which is exactly the fallback path the
//! capture loop already implements.

#[cfg(unix)]
mod platform {
    use crate::config::EngineSettings;
    use crate::engine::{EngineError, EngineOutput, RecognitionEngine};
    use regex::Regex;
    use std::io;
    use std::os::raw::{c_char, c_uint, c_void};
    use std::os::unix::io::AsRawFd;
    use std::sync::{Once, OnceLock};
    use tracing::{debug, warn};
    use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

    /// Whisper's native sample rate.
    const SAMPLE_RATE: u32 = 16_000;

    /// 32 ms at 16 kHz. Whisper itself has no frame-size requirement; this
    /// just sets the granularity of the capture loop.
    const FRAME_LENGTH: usize = 512;

    /// Hard cap on buffered audio (30 s). Utterances are normally finalized
    /// by silence long before this.
    const MAX_BUFFER_SAMPLES: usize = 30 * SAMPLE_RATE as usize;

    /// Whisper misbehaves on very short input; pad the utterance to 1 s.
    const MIN_TRANSCRIBE_SAMPLES: usize = SAMPLE_RATE as usize;

    /// Peak amplitude below which the buffered audio is considered empty and
    /// the model is not worth invoking on flush.
    const SIGNAL_FLOOR: i32 = 100;

    /// Whisper model plus the audio buffered for the current utterance.
    pub struct WhisperEngine {
        ctx: WhisperContext,
        buffer: Vec<f32>,
        peak: i32,
        overflow_logged: bool,
    }

    impl WhisperEngine {
        /// Load the model named by `settings.model_path`.
        ///
        /// Whisper takes no access key and has no internal endpointer, so
        /// `access_key` and `endpoint_sensitivity` are ignored; punctuation
        /// is always produced by the model regardless of
        /// `enable_automatic_punctuation`.
        ///
        /// Temporarily redirects stderr to `/dev/null` because whisper.cpp
        /// emits verbose initialization messages.
        pub fn new(settings: &EngineSettings) -> Result<Self, EngineError> {
            install_whisper_log_silencer();

            let model = settings.model_path.to_string_lossy();
            let ctx_result = with_stderr_silenced(|| {
                WhisperContext::new_with_params(model.as_ref(), WhisperContextParameters::default())
            })
            .map_err(|err| EngineError::Init(err.to_string()))?;
            let ctx = ctx_result.map_err(|err| EngineError::Init(err.to_string()))?;

            Ok(Self {
                ctx,
                buffer: Vec::with_capacity(MAX_BUFFER_SAMPLES / 4),
                peak: 0,
                overflow_logged: false,
            })
        }

        fn transcribe(&mut self) -> Result<String, EngineError> {
            let mut state = self
                .ctx
                .create_state()
                .map_err(|err| EngineError::Flush(err.to_string()))?;
            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
            params.set_language(None);
            params.set_detect_language(true);
            // Limit CPU usage so laptops don't max out all cores.
            params.set_n_threads(num_cpus::get().min(8) as i32);
            params.set_print_progress(false);
            params.set_print_timestamps(false);
            params.set_print_special(false);
            params.set_print_realtime(false);
            params.set_translate(false);
            params.set_token_timestamps(false);

            if self.buffer.len() < MIN_TRANSCRIBE_SAMPLES {
                self.buffer.resize(MIN_TRANSCRIBE_SAMPLES, 0.0);
            }
            state
                .full(params, &self.buffer)
                .map_err(|err| EngineError::Flush(err.to_string()))?;

            let mut transcript = String::new();
            let num_segments = match state.full_n_segments() {
                Ok(count) if count >= 0 => count,
                Ok(_) => {
                    warn!("whisper returned a negative segment count");
                    return Ok(transcript);
                }
                Err(err) => {
                    warn!("whisper failed to read segment count: {err}");
                    return Ok(transcript);
                }
            };
            // Whisper splits output into small segments; stitch them together.
            for i in 0..num_segments {
                match state.full_get_segment_text_lossy(i) {
                    Ok(text) => transcript.push_str(&text),
                    Err(err) => warn!("failed to read whisper segment {i}: {err}"),
                }
            }
            Ok(scrub_non_speech(&transcript))
        }
    }

    impl RecognitionEngine for WhisperEngine {
        fn frame_length(&self) -> usize {
            FRAME_LENGTH
        }

        fn sample_rate(&self) -> u32 {
            SAMPLE_RATE
        }

        fn process_frame(&mut self, frame: &[i16]) -> Result<EngineOutput, EngineError> {
            if self.buffer.len() + frame.len() > MAX_BUFFER_SAMPLES {
                if !self.overflow_logged {
                    warn!("utterance buffer full; discarding audio until next flush");
                    self.overflow_logged = true;
                }
                return Ok(EngineOutput::default());
            }
            for &sample in frame {
                self.peak = self.peak.max(i32::from(sample).abs());
                self.buffer.push(f32::from(sample) / 32_768.0);
            }
            Ok(EngineOutput::default())
        }

        fn flush(&mut self) -> Result<String, EngineError> {
            let peak = self.peak;
            let buffered = self.buffer.len();
            let text = if peak < SIGNAL_FLOOR {
                // Nothing above the noise floor was buffered; skip the model.
                String::new()
            } else {
                self.transcribe()?
            };
            self.buffer.clear();
            self.peak = 0;
            self.overflow_logged = false;
            debug!(buffered, peak, chars = text.len(), "whisper flush");
            Ok(text)
        }
    }

    /// Strip whisper's bracketed non-speech annotations and collapse the
    /// remaining whitespace.
    fn scrub_non_speech(text: &str) -> String {
        static NON_SPEECH_RE: OnceLock<Regex> = OnceLock::new();
        let re = NON_SPEECH_RE.get_or_init(|| {
            Regex::new(
                r"(?i)\[\s*\]|\(\s*\)|[\[(]\s*(?:silence|noise|inaudible|blank_audio|blank audio|music|laughter|applause|cough|breath(?:ing)?|wind|background)\s*[\])]",
            )
            .expect("non-speech regex should compile")
        });
        let without_markers = re.replace_all(text.trim(), " ");
        without_markers
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn with_stderr_silenced<R>(f: impl FnOnce() -> R) -> Result<R, io::Error> {
        let null = std::fs::OpenOptions::new().write(true).open("/dev/null")?;
        let null_fd = null.as_raw_fd();

        // SAFETY: dup(2) duplicates the stderr file descriptor and we restore
        // it before returning; no other thread-owned reference exists.
        let orig_stderr = unsafe { libc::dup(2) };
        if orig_stderr < 0 {
            return Err(io::Error::last_os_error());
        }
        if unsafe { libc::dup2(null_fd, 2) } < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(orig_stderr) };
            return Err(err);
        }

        let result = f();

        let restore = unsafe { libc::dup2(orig_stderr, 2) };
        unsafe { libc::close(orig_stderr) };
        if restore < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(result)
    }

    fn install_whisper_log_silencer() {
        static INSTALL_LOG_CALLBACK: Once = Once::new();
        INSTALL_LOG_CALLBACK.call_once(|| unsafe {
            whisper_rs::set_log_callback(Some(whisper_log_callback), std::ptr::null_mut());
        });
    }

    unsafe extern "C" fn whisper_log_callback(
        _level: c_uint,
        _text: *const c_char,
        _user_data: *mut c_void,
    ) {
        // Silence the default whisper.cpp logger; diagnostics flow through
        // tracing instead.
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::path::PathBuf;

        #[test]
        fn rejects_missing_model() {
            let settings = EngineSettings {
                access_key: String::new(),
                model_path: PathBuf::from("/no/such/model.bin"),
                endpoint_sensitivity: 0.5,
                enable_automatic_punctuation: false,
            };
            assert!(matches!(
                WhisperEngine::new(&settings),
                Err(EngineError::Init(_))
            ));
        }

        #[test]
        fn scrub_removes_markers_and_collapses_whitespace() {
            assert_eq!(scrub_non_speech("  hi [BLANK_AUDIO]  there "), "hi there");
            assert_eq!(scrub_non_speech("(laughter) ok"), "ok");
            assert_eq!(scrub_non_speech("[ ]"), "");
        }
    }
}

#[cfg(unix)]
pub use platform::WhisperEngine;

#[cfg(not(unix))]
mod platform {
    use crate::config::EngineSettings;
    use crate::engine::{EngineError, EngineOutput, RecognitionEngine};

    /// Stub implementation for unsupported targets such as Windows.
    pub struct WhisperEngine;

    impl WhisperEngine {
        pub fn new(_: &EngineSettings) -> Result<Self, EngineError> {
            Err(EngineError::Init(
                "whisper recognition is currently supported only on Unix-like platforms".into(),
            ))
        }
    }

    impl RecognitionEngine for WhisperEngine {
        fn frame_length(&self) -> usize {
            512
        }

        fn sample_rate(&self) -> u32 {
            16_000
        }

        fn process_frame(&mut self, _: &[i16]) -> Result<EngineOutput, EngineError> {
            Err(EngineError::Process("unsupported platform".into()))
        }

        fn flush(&mut self) -> Result<String, EngineError> {
            Err(EngineError::Flush("unsupported platform".into()))
        }
    }
}

#[cfg(not(unix))]
pub use platform::WhisperEngine;
