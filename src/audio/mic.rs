//! CPAL-backed microphone source.
//!
//! The device is opened mono at the recognizer's sample rate with whatever
//! sample format the hardware reports; every format is converted to signed
//! 16-bit up front so the rest of the pipeline is format-agnostic. CPAL
//! delivers audio on its own callback thread, so a bounded channel carries
//! assembled frames to the capture thread, which blocks on `read_frame`.

use super::dispatch::FrameDispatcher;
use super::{DeviceError, SampleSource};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Frames buffered between the callback thread and the capture thread. The
/// recognizer can block for over a second per call, so this absorbs a burst
/// before the dispatcher starts dropping.
const CHANNEL_FRAMES: usize = 64;

/// Live microphone stream producing recognizer-sized frames.
///
/// Created on the capture thread and used only there; the CPAL stream handle
/// is kept alive for the lifetime of the source and released on drop.
pub struct MicSource {
    receiver: Receiver<Vec<i16>>,
    dropped: Arc<AtomicUsize>,
    frame_length: usize,
    _stream: cpal::Stream,
}

impl MicSource {
    /// List input device names so callers can offer a microphone selector.
    pub fn list_devices() -> Result<Vec<String>, DeviceError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|err| DeviceError::NoDevice(err.to_string()))?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    /// Open an input device mono/16-bit at `sample_rate`, producing frames of
    /// exactly `frame_length` samples.
    pub fn open(
        preferred_device: Option<&str>,
        sample_rate: u32,
        frame_length: usize,
    ) -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let device = match preferred_device {
            Some(name) => {
                let mut devices = host
                    .input_devices()
                    .map_err(|err| DeviceError::NoDevice(err.to_string()))?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| DeviceError::NoDevice(format!("'{name}' not found")))?
            }
            None => host
                .default_input_device()
                .ok_or_else(|| DeviceError::NoDevice("no default input device".into()))?,
        };

        let format = device
            .default_input_config()
            .map_err(|err| DeviceError::Unsupported(err.to_string()))?
            .sample_format();
        let config = StreamConfig {
            channels: 1,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        debug!(
            device = %device.name().unwrap_or_else(|_| "unknown".into()),
            ?format,
            sample_rate,
            frame_length,
            "opening input device"
        );

        let (sender, receiver) = bounded::<Vec<i16>>(CHANNEL_FRAMES);
        let dropped = Arc::new(AtomicUsize::new(0));
        let err_fn = |err| debug!("audio stream error: {err}");

        // Each arm moves its own dispatcher into the callback; only the
        // callback thread ever touches it.
        let stream = match format {
            SampleFormat::I16 => {
                let mut pump = FrameDispatcher::new(frame_length, sender, dropped.clone());
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _| pump.push(data, |sample| sample),
                    err_fn,
                    None,
                )
            }
            SampleFormat::F32 => {
                let mut pump = FrameDispatcher::new(frame_length, sender, dropped.clone());
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _| {
                        pump.push(data, |sample| {
                            (sample.clamp(-1.0, 1.0) * 32_767.0) as i16
                        })
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::U16 => {
                let mut pump = FrameDispatcher::new(frame_length, sender, dropped.clone());
                device.build_input_stream(
                    &config,
                    move |data: &[u16], _| {
                        pump.push(data, |sample| (i32::from(sample) - 32_768) as i16)
                    },
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(DeviceError::Unsupported(format!(
                    "sample format {other:?}"
                )))
            }
        }
        .map_err(|err| DeviceError::Unsupported(err.to_string()))?;

        stream
            .play()
            .map_err(|err| DeviceError::Stream(err.to_string()))?;

        Ok(Self {
            receiver,
            dropped,
            frame_length,
            _stream: stream,
        })
    }

    /// Frames discarded because the capture thread fell behind.
    pub fn dropped_frames(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl SampleSource for MicSource {
    fn read_frame(&mut self, frame: &mut [i16]) -> Result<(), DeviceError> {
        let chunk = self
            .receiver
            .recv()
            .map_err(|_| DeviceError::Disconnected)?;
        if chunk.len() != frame.len() || frame.len() != self.frame_length {
            return Err(DeviceError::ShortRead {
                expected: frame.len(),
                got: chunk.len(),
            });
        }
        frame.copy_from_slice(&chunk);
        Ok(())
    }
}
