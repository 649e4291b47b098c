//! Detection strategies plugged into `KeywordSpotter`.
//!
//! A `Recognizer` owns its model cascade and windows; the spotter owns the
//! activation controller and decides what each `Detection` means. Variants
//! are selected by `RecognizerKind` in `build_recognizer`, so a new strategy
//! only needs a trait impl and a config variant.

pub mod keyword;
pub mod phrase;
pub mod vad_trigger;
pub mod wakeword;

pub use keyword::KeywordRecognizer;
pub use phrase::PhraseRecognizer;
pub use vad_trigger::VadTrigger;
pub use wakeword::WakewordRecognizer;

use crate::{
    buffering::AudioFrame,
    detect::{ActivationState, ResetScope},
    engine::config::{EngineConfig, PipelineGeometry, RecognizerKind},
    error::{KeyspotError, Result},
    inference::ModelSet,
    signal::SignalNormalizer,
};

/// Per-frame context handed to a recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameState {
    pub index: u64,
    pub is_speech: bool,
    /// Controller state before this frame is counted.
    pub activation: ActivationState,
}

impl FrameState {
    pub fn is_active(&self) -> bool {
        self.activation == ActivationState::Active
    }
}

/// What a recognizer saw in one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    None,
    /// Request an activation. `recognition` is set when the trigger itself
    /// identifies something (a matched phrase).
    Activate {
        posterior: f32,
        recognition: Option<Recognition>,
    },
}

/// A recognized keyword or phrase.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub class_id: usize,
    pub transcript: String,
    pub confidence: f32,
}

pub trait Recognizer: Send + 'static {
    fn name(&self) -> &'static str;

    /// Consume one frame.
    fn process_frame(&mut self, frame: &AudioFrame, state: &FrameState) -> Result<Detection>;

    /// Whether this recognizer produces a result when an activation ends.
    fn recognizes(&self) -> bool {
        false
    }

    /// Called once when an activation ends, before the full reset.
    fn finish(&mut self) -> Result<Option<Recognition>> {
        Ok(None)
    }

    /// Highest posterior seen since the last full reset.
    fn posterior_max(&self) -> Option<f32> {
        None
    }

    fn reset(&mut self, scope: ResetScope);
}

/// Build the recognizer selected by `config.recognizer`.
///
/// # Errors
/// `InvalidConfiguration` if the variant needs models and none were given,
/// or if the models do not fit `geometry`.
pub fn build_recognizer(
    config: &EngineConfig,
    geometry: &PipelineGeometry,
    models: Option<ModelSet>,
) -> Result<Box<dyn Recognizer>> {
    if !config.recognizer.uses_models() {
        return Ok(Box::new(VadTrigger::new()));
    }
    let models = models.ok_or_else(|| {
        KeyspotError::config("recognizer needs filter, encode and detect models")
    })?;

    match &config.recognizer {
        RecognizerKind::Wakeword => Ok(Box::new(WakewordRecognizer::new(geometry, models)?)),
        RecognizerKind::Phrase {
            keywords,
            phrases,
            smooth_length_ms,
            phrase_length_ms,
        } => Ok(Box::new(PhraseRecognizer::new(
            geometry,
            models,
            keywords,
            phrases,
            geometry.frames_for_ms(*smooth_length_ms),
            geometry.frames_for_ms(*phrase_length_ms),
        )?)),
        RecognizerKind::Keyword { classes, threshold } => Ok(Box::new(KeywordRecognizer::new(
            geometry,
            models,
            classes.clone(),
            *threshold,
        )?)),
        RecognizerKind::VadTrigger => Ok(Box::new(VadTrigger::new())),
    }
}

/// Normalizer with the configured RMS tracking.
pub(crate) fn tracking_normalizer(geometry: &PipelineGeometry) -> SignalNormalizer {
    SignalNormalizer::new(geometry.rms_target, geometry.rms_alpha, geometry.pre_emphasis)
}
