//! `FnModel`: a closure-backed `TensorModel`.
//!
//! Used for dry runs without model files and to script exact posteriors in
//! tests.

use crate::error::Result;
use crate::inference::{ModelSignature, TensorModel};

type ModelFn = dyn FnMut(&[&[f32]]) -> Result<Vec<Vec<f32>>> + Send;

pub struct FnModel {
    signature: ModelSignature,
    f: Box<ModelFn>,
}

impl FnModel {
    pub fn new<F>(signature: ModelSignature, f: F) -> Self
    where
        F: FnMut(&[&[f32]]) -> Result<Vec<Vec<f32>>> + Send + 'static,
    {
        Self {
            signature,
            f: Box::new(f),
        }
    }

    /// A model that fills every output with `value`.
    pub fn constant(signature: ModelSignature, value: f32) -> Self {
        let outputs = signature.outputs.clone();
        Self::new(signature, move |_| {
            Ok(outputs.iter().map(|&n| vec![value; n]).collect())
        })
    }
}

impl TensorModel for FnModel {
    fn signature(&self) -> &ModelSignature {
        &self.signature
    }

    fn invoke(&mut self, inputs: &[&[f32]]) -> Result<Vec<Vec<f32>>> {
        (self.f)(inputs)
    }
}
