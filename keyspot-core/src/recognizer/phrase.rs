use tracing::{debug, trace};

use crate::{
    buffering::AudioFrame,
    detect::{ModelCascade, PhraseDefinition, Phraser, PosteriorSmoother, ResetScope},
    engine::config::PipelineGeometry,
    error::Result,
    inference::ModelSet,
    recognizer::{tracking_normalizer, Detection, FrameState, Recognition, Recognizer},
};

/// Multi-keyword detection: per-class posteriors are smoothed, and the
/// argmax sequence over the phrasing window is matched against keyword
/// phrases. Class 0 is "no keyword"; keyword `k` is class `k + 1`.
pub struct PhraseRecognizer {
    cascade: ModelCascade,
    smoother: PosteriorSmoother,
    phraser: Phraser,
    phrases: Vec<PhraseDefinition>,
}

impl PhraseRecognizer {
    /// # Errors
    /// `InvalidConfiguration` for an unknown keyword in a phrase, or a
    /// detect model whose width is not `keywords.len() + 1`.
    pub fn new(
        geometry: &PipelineGeometry,
        models: ModelSet,
        keywords: &[String],
        phrases: &[String],
        smooth_frames: usize,
        phrase_frames: usize,
    ) -> Result<Self> {
        let num_classes = keywords.len() + 1;
        let phrases = phrases
            .iter()
            .map(|text| PhraseDefinition::parse(text, keywords))
            .collect::<Result<Vec<_>>>()?;
        let cascade =
            ModelCascade::new(geometry, models, tracking_normalizer(geometry), num_classes)?;
        debug!(
            classes = num_classes,
            phrases = phrases.len(),
            smooth_frames,
            phrase_frames,
            "phrase recognizer configured"
        );
        Ok(Self {
            cascade,
            smoother: PosteriorSmoother::new(num_classes, smooth_frames),
            phraser: Phraser::new(num_classes, phrase_frames, phrases.clone()),
            phrases,
        })
    }

    /// Weakest per-keyword peak among the classes of `phrase`.
    fn confidence(&self, phrase: &PhraseDefinition) -> f32 {
        let class_max = self.phraser.class_max();
        phrase
            .classes()
            .iter()
            .filter(|&&c| c != 0)
            .filter_map(|&c| class_max.get(c).copied())
            .fold(f32::INFINITY, f32::min)
    }
}

impl Recognizer for PhraseRecognizer {
    fn name(&self) -> &'static str {
        "phrase"
    }

    fn process_frame(&mut self, frame: &AudioFrame, state: &FrameState) -> Result<Detection> {
        if state.is_active() || !state.is_speech {
            return Ok(Detection::None);
        }
        self.cascade.push_frame(frame, true)?;
        let Some(posteriors) = self.cascade.classify()? else {
            return Ok(Detection::None);
        };
        let smoothed = self.smoother.push(posteriors)?;
        let Some(matched) = self.phraser.push(smoothed)? else {
            return Ok(Detection::None);
        };
        let matched = matched.clone();
        let class_id = self
            .phrases
            .iter()
            .position(|p| *p == matched)
            .unwrap_or_default();
        let confidence = self.confidence(&matched);
        trace!(frame = state.index, phrase = matched.text(), confidence, "phrase matched");
        Ok(Detection::Activate {
            posterior: confidence,
            recognition: Some(Recognition {
                class_id,
                transcript: matched.text().to_string(),
                confidence,
            }),
        })
    }

    fn posterior_max(&self) -> Option<f32> {
        self.phraser
            .class_max()
            .iter()
            .skip(1)
            .copied()
            .reduce(f32::max)
    }

    fn reset(&mut self, scope: ResetScope) {
        self.cascade.reset(scope);
        self.smoother.reset();
        self.phraser.reset();
    }
}
