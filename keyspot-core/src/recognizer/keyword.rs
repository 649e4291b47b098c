use tracing::{debug, info};

use crate::{
    buffering::AudioFrame,
    detect::{classifier::argmax, ModelCascade, ResetScope},
    engine::config::PipelineGeometry,
    error::Result,
    inference::ModelSet,
    recognizer::{Detection, FrameState, Recognition, Recognizer},
    signal::SignalNormalizer,
};

/// Command keyword classification over a whole activation.
///
/// While active every frame is encoded; the detect model runs once, when the
/// activation ends, and its argmax class is recognized if it clears the
/// threshold. Gain is fixed (no RMS tracking).
pub struct KeywordRecognizer {
    cascade: ModelCascade,
    classes: Vec<String>,
    threshold: f32,
    posterior_max: f32,
}

impl KeywordRecognizer {
    /// # Errors
    /// `InvalidConfiguration` if the detect model width differs from
    /// `classes.len()`.
    pub fn new(
        geometry: &PipelineGeometry,
        models: ModelSet,
        classes: Vec<String>,
        threshold: f32,
    ) -> Result<Self> {
        let normalizer = SignalNormalizer::new(geometry.rms_target, 0.0, geometry.pre_emphasis);
        let cascade = ModelCascade::new(geometry, models, normalizer, classes.len())?;
        Ok(Self {
            cascade,
            classes,
            threshold,
            posterior_max: 0.0,
        })
    }
}

impl Recognizer for KeywordRecognizer {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn process_frame(&mut self, frame: &AudioFrame, state: &FrameState) -> Result<Detection> {
        if state.is_active() {
            self.cascade.push_frame(frame, state.is_speech)?;
        }
        Ok(Detection::None)
    }

    fn recognizes(&self) -> bool {
        true
    }

    fn finish(&mut self) -> Result<Option<Recognition>> {
        let Some(posteriors) = self.cascade.classify_now()? else {
            return Ok(None);
        };
        let Some((class_id, confidence)) = argmax(posteriors) else {
            return Ok(None);
        };
        self.posterior_max = self.posterior_max.max(confidence);
        let transcript = self.classes.get(class_id).cloned().unwrap_or_default();
        if confidence > self.threshold {
            info!(class_id, %transcript, confidence, "keyword recognized");
            Ok(Some(Recognition {
                class_id,
                transcript,
                confidence,
            }))
        } else {
            debug!(class_id, %transcript, confidence, "keyword below threshold");
            Ok(None)
        }
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

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::detect::cascade::tests::{models_with_detect, small_config};
    use crate::detect::ActivationState;
    use crate::inference::{FnModel, ModelSignature};

    fn recognizer(posteriors: Vec<f32>, calls: Arc<AtomicUsize>) -> KeywordRecognizer {
        let detect = FnModel::new(ModelSignature::new([8], [2]), move |inputs| {
            calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(inputs[0].len(), 8);
            Ok(vec![posteriors.clone()])
        });
        let g = small_config().geometry().expect("valid geometry");
        KeywordRecognizer::new(
            &g,
            models_with_detect(detect),
            vec!["stop".into(), "go".into()],
            0.5,
        )
        .expect("recognizer")
    }

    fn feed(recognizer: &mut KeywordRecognizer, activation: ActivationState, frames: u64) {
        let frame = AudioFrame::new(vec![500; 320], 16_000);
        for index in 0..frames {
            let state = FrameState {
                index,
                is_speech: true,
                activation,
            };
            assert_eq!(
                recognizer.process_frame(&frame, &state).expect("process"),
                Detection::None
            );
        }
    }

    #[test]
    fn detect_runs_once_at_finish() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut keyword = recognizer(vec![0.2, 0.7], Arc::clone(&calls));
        feed(&mut keyword, ActivationState::Active, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let recognition = keyword.finish().expect("finish").expect("recognized");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(recognition.class_id, 1);
        assert_eq!(recognition.transcript, "go");
        assert_eq!(recognition.confidence, 0.7);
    }

    #[test]
    fn below_threshold_is_not_recognized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut keyword = recognizer(vec![0.4, 0.3], calls);
        feed(&mut keyword, ActivationState::Active, 2);
        assert_eq!(keyword.finish().expect("finish"), None);
        assert_eq!(keyword.posterior_max(), Some(0.4));
    }

    #[test]
    fn idle_frames_are_ignored() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut keyword = recognizer(vec![0.9, 0.1], Arc::clone(&calls));
        feed(&mut keyword, ActivationState::Idle, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rejects_class_count_mismatch() {
        let g = small_config().geometry().expect("valid geometry");
        let detect = FnModel::constant(ModelSignature::new([8], [2]), 0.0);
        let result = KeywordRecognizer::new(
            &g,
            models_with_detect(detect),
            vec!["a".into(), "b".into(), "c".into()],
            0.5,
        );
        assert!(result.is_err());
    }
}
