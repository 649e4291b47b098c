use crate::{
    buffering::RingBuffer,
    error::Result,
    inference::{invoke_checked, TensorModel},
};

/// Runs the detect model over a full encode window.
///
/// Output width 1 is the binary wake posterior; wider outputs are per-class
/// posteriors with class 0 reserved for "no keyword".
pub struct Classifier {
    model: Box<dyn TensorModel>,
    scratch: Vec<f32>,
    posteriors: Vec<f32>,
}

impl Classifier {
    /// # Errors
    /// `InvalidConfiguration` unless the detect model maps `window_len`
    /// values to `outputs` posteriors.
    pub fn new(model: Box<dyn TensorModel>, window_len: usize, outputs: usize) -> Result<Self> {
        model.signature().ensure("detect", &[window_len], &[outputs])?;
        Ok(Self {
            model,
            scratch: Vec::with_capacity(window_len),
            posteriors: vec![0.0; outputs],
        })
    }

    /// Classify the encode window if it is full. The window is drained.
    pub fn classify(&mut self, encode_window: &mut RingBuffer<f32>) -> Result<Option<&[f32]>> {
        if !encode_window.is_full() {
            return Ok(None);
        }
        self.scratch.clear();
        encode_window.rewind().drain_into(&mut self.scratch)?;

        let mut outputs =
            invoke_checked("detect", self.model.as_mut(), &[self.scratch.as_slice()])?;
        self.posteriors = outputs.swap_remove(0);
        Ok(Some(self.posteriors.as_slice()))
    }
}

/// Index and value of the largest element; ties keep the first maximum.
pub fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, max)) if v <= max => {}
            _ => best = Some((i, v)),
        }
    }
    best
}
