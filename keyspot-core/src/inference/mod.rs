//! Opaque tensor-in/tensor-out model abstraction.
//!
//! The detection cascade calls three models: *filter* (spectrum → mel frame),
//! *encode* (mel window + state → encoded frame + new state) and *detect*
//! (encode window → posteriors). The pipeline only knows each model's flat
//! input and output lengths; the numeric kernels stay behind `TensorModel`.
//!
//! `invoke` takes `&mut self` because backends keep session state and reuse
//! scratch buffers. Each model is owned by exactly one cascade, which lives on
//! the pipeline worker thread, so no locking is involved.

pub mod stub;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::OnnxTensorModel;

pub use stub::FnModel;

use crate::error::{KeyspotError, Result};

/// Flat element counts of every input and output tensor, in positional order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSignature {
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
}

impl ModelSignature {
    pub fn new(inputs: impl Into<Vec<usize>>, outputs: impl Into<Vec<usize>>) -> Self {
        Self {
            inputs: inputs.into(),
            outputs: outputs.into(),
        }
    }

    /// Fail with `InvalidConfiguration` unless this signature has exactly the
    /// expected shapes.
    pub fn ensure(&self, stage: &str, inputs: &[usize], outputs: &[usize]) -> Result<()> {
        if self.inputs != inputs || self.outputs != outputs {
            return Err(KeyspotError::config(format!(
                "{stage} model has inputs {:?} / outputs {:?}, expected {:?} / {:?}",
                self.inputs, self.outputs, inputs, outputs
            )));
        }
        Ok(())
    }
}

/// Contract for a fixed-shape model backend.
pub trait TensorModel: Send + 'static {
    fn signature(&self) -> &ModelSignature;

    /// Run the model once. `inputs[i]` has exactly `signature().inputs[i]`
    /// elements; the result must have one vector per declared output.
    ///
    /// # Errors
    /// Any backend failure, reported as `ModelInvocation` by the caller.
    fn invoke(&mut self, inputs: &[&[f32]]) -> Result<Vec<Vec<f32>>>;
}

impl std::fmt::Debug for dyn TensorModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TensorModel")
            .field("signature", self.signature())
            .finish_non_exhaustive()
    }
}

/// Invoke `model` for pipeline stage `stage`, checking the output arity and
/// lengths against its signature.
pub(crate) fn invoke_checked(
    stage: &'static str,
    model: &mut dyn TensorModel,
    inputs: &[&[f32]],
) -> Result<Vec<Vec<f32>>> {
    let outputs = model.invoke(inputs).map_err(|e| match e {
        KeyspotError::ModelInvocation { .. } => e,
        other => KeyspotError::invocation(stage, other.to_string()),
    })?;
    let expected = &model.signature().outputs;
    if outputs.len() != expected.len()
        || outputs.iter().zip(expected).any(|(o, &n)| o.len() != n)
    {
        return Err(KeyspotError::invocation(
            stage,
            format!(
                "returned output lengths {:?}, expected {:?}",
                outputs.iter().map(Vec::len).collect::<Vec<_>>(),
                expected
            ),
        ));
    }
    Ok(outputs)
}

/// The three models of one detection cascade.
pub struct ModelSet {
    pub filter: Box<dyn TensorModel>,
    pub encode: Box<dyn TensorModel>,
    pub detect: Box<dyn TensorModel>,
}

impl ModelSet {
    pub fn new(
        filter: impl TensorModel,
        encode: impl TensorModel,
        detect: impl TensorModel,
    ) -> Self {
        Self {
            filter: Box::new(filter),
            encode: Box::new(encode),
            detect: Box::new(detect),
        }
    }

    /// Load `filter.onnx`, `encode.onnx` and `detect.onnx` from `dir`.
    #[cfg(feature = "onnx")]
    pub fn load_onnx_dir(dir: &std::path::Path) -> Result<Self> {
        Ok(Self::new(
            OnnxTensorModel::load(&dir.join("filter.onnx"))?,
            OnnxTensorModel::load(&dir.join("encode.onnx"))?,
            OnnxTensorModel::load(&dir.join("detect.onnx"))?,
        ))
    }
}

impl std::fmt::Debug for ModelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSet")
            .field("filter", &self.filter.signature())
            .field("encode", &self.encode.signature())
            .field("detect", &self.detect.signature())
            .finish()
    }
}
