use tracing::trace;

use crate::{
    buffering::AudioFrame,
    detect::{ModelCascade, ResetScope},
    engine::config::PipelineGeometry,
    error::Result,
    inference::ModelSet,
    recognizer::{tracking_normalizer, Detection, FrameState, Recognizer},
};

/// Binary wakeword detection: one posterior compared against the wake
/// threshold.
///
/// Frames only enter the cascade while idle and speaking, so the windows
/// hold contiguous speech.
pub struct WakewordRecognizer {
    cascade: ModelCascade,
    threshold: f32,
    posterior_max: f32,
}

impl WakewordRecognizer {
    pub fn new(geometry: &PipelineGeometry, models: ModelSet) -> Result<Self> {
        Ok(Self {
            cascade: ModelCascade::new(geometry, models, tracking_normalizer(geometry), 1)?,
            threshold: geometry.wake_threshold,
            posterior_max: 0.0,
        })
    }
}

impl Recognizer for WakewordRecognizer {
    fn name(&self) -> &'static str {
        "wakeword"
    }

    fn process_frame(&mut self, frame: &AudioFrame, state: &FrameState) -> Result<Detection> {
        if state.is_active() || !state.is_speech {
            return Ok(Detection::None);
        }
        self.cascade.push_frame(frame, true)?;
        let Some(posteriors) = self.cascade.classify()? else {
            return Ok(Detection::None);
        };
        let posterior = posteriors[0];
        self.posterior_max = self.posterior_max.max(posterior);
        trace!(frame = state.index, posterior, "wake posterior");
        if posterior > self.threshold {
            return Ok(Detection::Activate {
                posterior,
                recognition: None,
            });
        }
        Ok(Detection::None)
    }

    fn posterior_max(&self) -> Option<f32> {
        Some(self.posterior_max)
    }

    fn reset(&mut self, scope: ResetScope) {
        self.cascade.reset(scope);
        if scope.clears_state() {
            self.posterior_max = 0.0;
        }
    }
}
