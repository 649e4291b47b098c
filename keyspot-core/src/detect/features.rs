use crate::{
    buffering::RingBuffer,
    error::Result,
    inference::{invoke_checked, TensorModel},
};

/// Maps each magnitude spectrum to a mel frame through the filter model and
/// keeps a sliding window of the most recent `mel_frames` frames.
pub struct FeatureTransform {
    model: Box<dyn TensorModel>,
    mel_width: usize,
    window: RingBuffer<f32>,
}

impl FeatureTransform {
    /// # Errors
    /// `InvalidConfiguration` if the filter model does not map `bins` values
    /// to `mel_width` values.
    pub fn new(
        model: Box<dyn TensorModel>,
        bins: usize,
        mel_width: usize,
        mel_frames: usize,
    ) -> Result<Self> {
        model.signature().ensure("filter", &[bins], &[mel_width])?;
        let mut window = RingBuffer::new(mel_frames * mel_width, 0.0);
        window.fill(0.0);
        Ok(Self {
            model,
            mel_width,
            window,
        })
    }

    /// Run the filter model on `spectrum` and append its mel frame.
    pub fn push_spectrum(&mut self, spectrum: &[f32]) -> Result<()> {
        let outputs = invoke_checked("filter", self.model.as_mut(), &[spectrum])?;
        self.window.rewind().seek(self.mel_width as isize);
        self.window.write_all(&outputs[0])
    }

    /// The mel window, for the encoder to drain.
    pub fn window_mut(&mut self) -> &mut RingBuffer<f32> {
        &mut self.window
    }

    pub fn reset(&mut self) {
        self.window.reset().fill(0.0);
    }
}
