//! Adaptive noise-floor model for voice activity gating.
//!
//! Tracks the ambient volume of the room as a running mean and variance of
//! per-frame peak amplitude, updated by an exponential (IIR) filter. A frame
//! counts as voiced when its peak sits well above the current estimate. The
//! model is cheap enough to run on every frame, unlike the recognizer.

/// Peaks below this absolute level are treated as a muted input and never
/// update the model, so a dead microphone cannot drag the estimate to zero.
const SILENCE_FLOOR: i32 = 10;

/// Mixing factor for the exponential update. Small on purpose: the estimate
/// should track slow changes in room tone, not individual words.
const MIX: f32 = 0.02;

/// Number of standard deviations above the mean that counts as voice.
const SPREAD: f32 = 2.0;

/// Running estimate of ambient volume, owned exclusively by the capture
/// thread. The foreground never reads these fields.
#[derive(Debug, Clone)]
pub struct NoiseFloor {
    avg: f32,
    var: f32,
}

impl NoiseFloor {
    /// Starting values assume a moderately noisy room so the first loud frame
    /// is still classified as voice.
    pub fn new() -> Self {
        Self {
            avg: 400.0,
            var: 50.0 * 50.0,
        }
    }

    /// Classify one frame and fold it into the model.
    ///
    /// Returns true when the frame's peak amplitude exceeds the adaptive
    /// threshold. The value used for the model update is clamped to the
    /// threshold so a single shout cannot corrupt the long-run estimate.
    /// Frames below the absolute silence floor are ignored entirely.
    pub fn observe(&mut self, frame: &[i16]) -> bool {
        let peak = frame
            .iter()
            .map(|&s| i32::from(s).abs())
            .max()
            .unwrap_or(0);
        if peak < SILENCE_FLOOR {
            return false;
        }

        let threshold = self.avg + SPREAD * self.var.sqrt();
        let mut vol = peak as f32;
        let voiced = vol > threshold;
        if voiced {
            vol = threshold;
        }

        let diff = vol - self.avg;
        self.avg += MIX * diff;
        self.var += MIX * (diff * diff - self.var);
        voiced
    }

    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> (f32, f32) {
        (self.avg, self.var)
    }
}

impl Default for NoiseFloor {
    fn default() -> Self {
        Self::new()
    }
}
