//! Per-sample signal conditioning: RMS normalization, clipping and pre-emphasis.

use crate::buffering::AudioFrame;

/// Lower bound on the tracked RMS so silent speech frames never divide by zero.
const RMS_FLOOR: f32 = 1e-6;

/// Mutable scalar state of the front end.
///
/// `rms_value` is an exponentially weighted moving average of the frame RMS,
/// updated only for speech frames. Every sample is scaled by
/// `rms_target / rms_value`, clipped to `[-1, 1]`, then passed through
/// `y[n] = x[n] - k·x[n-1]`.
#[derive(Debug, Clone)]
pub struct SignalNormalizer {
    rms_target: f32,
    rms_alpha: f32,
    pre_emphasis: f32,
    rms_value: f32,
    prev_sample: f32,
}

impl SignalNormalizer {
    pub fn new(rms_target: f32, rms_alpha: f32, pre_emphasis: f32) -> Self {
        Self {
            rms_target,
            rms_alpha,
            pre_emphasis,
            rms_value: rms_target,
            prev_sample: 0.0,
        }
    }

    pub fn rms_value(&self) -> f32 {
        self.rms_value
    }

    /// Fold the RMS of `frame` into the moving average.
    pub fn observe(&mut self, frame: &AudioFrame, is_speech: bool) {
        if is_speech && self.rms_alpha > 0.0 {
            self.rms_value =
                self.rms_alpha * frame.rms() + (1.0 - self.rms_alpha) * self.rms_value;
        }
    }

    /// Condition a single sample.
    pub fn process(&mut self, sample: i16) -> f32 {
        let gain = self.rms_target / self.rms_value.max(RMS_FLOOR);
        let scaled = sample as f32 / i16::MAX as f32 * gain;
        let clipped = scaled.clamp(-1.0, 1.0);
        let out = clipped - self.pre_emphasis * self.prev_sample;
        self.prev_sample = clipped;
        out
    }

    /// Return to the freshly-constructed state.
    pub fn reset(&mut self) {
        self.rms_value = self.rms_target;
        self.prev_sample = 0.0;
    }
}
