use crate::{
    buffering::AudioFrame,
    detect::ResetScope,
    error::Result,
    recognizer::{Detection, FrameState, Recognizer},
};

/// Activates on the first speech frame while idle. Runs no models.
#[derive(Debug, Default)]
pub struct VadTrigger;

impl VadTrigger {
    pub fn new() -> Self {
        Self
    }
}

impl Recognizer for VadTrigger {
    fn name(&self) -> &'static str {
        "vad_trigger"
    }

    fn process_frame(&mut self, _frame: &AudioFrame, state: &FrameState) -> Result<Detection> {
        if state.is_speech && !state.is_active() {
            return Ok(Detection::Activate {
                posterior: 1.0,
                recognition: None,
            });
        }
        Ok(Detection::None)
    }

    fn reset(&mut self, _scope: ResetScope) {}
}
