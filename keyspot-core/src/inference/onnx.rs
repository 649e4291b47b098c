//! ONNX Runtime backend for `TensorModel` (feature `onnx`).
//!
//! Each model file becomes one `ort::Session`. Flat input/output lengths are
//! read from the graph's declared tensor shapes; dynamic dimensions (`-1`,
//! usually the batch axis) count as 1. Inputs are passed in declaration
//! order as zero-copy `TensorRef` views.

use std::path::Path;

use ndarray::{ArrayViewD, IxDyn};
use ort::session::{Session, SessionInputValue};
use ort::value::TensorRef;
use ort::{
    ep,
    session::builder::{GraphOptimizationLevel, SessionBuilder},
};
use tracing::{debug, info};

use crate::{
    error::{KeyspotError, Result},
    inference::{ModelSignature, TensorModel},
};

fn env_threads(var: &str, default: usize, max: usize) -> usize {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
        .clamp(1, max)
}

fn create_session(model_path: &Path) -> Result<Session> {
    // The cascade runs strictly sequentially, one small graph at a time.
    let intra_threads = env_threads("KEYSPOT_ORT_INTRA_THREADS", 1, 8);
    let inter_threads = env_threads("KEYSPOT_ORT_INTER_THREADS", 1, 4);

    SessionBuilder::new()
        .map_err(|e| KeyspotError::OnnxSession(e.to_string()))?
        .with_intra_threads(intra_threads)
        .map_err(|e| KeyspotError::OnnxSession(e.to_string()))?
        .with_inter_threads(inter_threads)
        .map_err(|e| KeyspotError::OnnxSession(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::All)
        .map_err(|e| KeyspotError::OnnxSession(e.to_string()))?
        .with_execution_providers([ep::CPU::default().build()])
        .map_err(|e| KeyspotError::OnnxSession(e.to_string()))?
        .commit_from_file(model_path)
        .map_err(|e| KeyspotError::OnnxSession(e.to_string()))
}

/// Dimensions of one graph tensor, with dynamic axes pinned to 1.
fn concrete_dims(shape: Option<&[i64]>) -> Vec<i64> {
    match shape {
        Some(dims) if !dims.is_empty() => dims.iter().map(|&d| d.max(1)).collect(),
        _ => vec![1],
    }
}

fn flat_len(dims: &[i64]) -> usize {
    dims.iter().map(|&d| d as usize).product()
}

pub struct OnnxTensorModel {
    session: Session,
    input_names: Vec<String>,
    input_dims: Vec<Vec<i64>>,
    output_names: Vec<String>,
    signature: ModelSignature,
}

impl OnnxTensorModel {
    /// Load a model file and read its tensor signature.
    ///
    /// # Errors
    /// `ModelNotFound` if the file is missing, `OnnxSession` if ONNX Runtime
    /// rejects it.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(KeyspotError::ModelNotFound {
                path: path.to_path_buf(),
            });
        }
        let session = create_session(path)?;

        let mut input_names = Vec::new();
        let mut input_dims = Vec::new();
        for input in session.inputs().iter() {
            input_names.push(input.name().to_string());
            input_dims.push(concrete_dims(input.dtype().tensor_shape().map(|s| &s[..])));
        }
        let mut output_names = Vec::new();
        let mut output_lens = Vec::new();
        for output in session.outputs().iter() {
            output_names.push(output.name().to_string());
            output_lens.push(flat_len(&concrete_dims(
                output.dtype().tensor_shape().map(|s| &s[..]),
            )));
        }

        let signature = ModelSignature::new(
            input_dims.iter().map(|d| flat_len(d)).collect::<Vec<_>>(),
            output_lens,
        );
        info!(
            path = %path.display(),
            inputs = ?input_names,
            outputs = ?output_names,
            "loaded ONNX model"
        );
        debug!(?signature, "ONNX model signature");

        Ok(Self {
            session,
            input_names,
            input_dims,
            output_names,
            signature,
        })
    }
}

impl TensorModel for OnnxTensorModel {
    fn signature(&self) -> &ModelSignature {
        &self.signature
    }

    fn invoke(&mut self, inputs: &[&[f32]]) -> Result<Vec<Vec<f32>>> {
        if inputs.len() != self.input_names.len() {
            return Err(KeyspotError::OnnxSession(format!(
                "expected {} inputs, got {}",
                self.input_names.len(),
                inputs.len()
            )));
        }

        let mut feeds: Vec<(String, SessionInputValue<'_>)> = Vec::with_capacity(inputs.len());
        let named = self.input_names.iter().zip(&self.input_dims);
        for ((name, dims), data) in named.zip(inputs.iter().copied()) {
            let shape: Vec<usize> = dims.iter().map(|&d| d as usize).collect();
            let view = ArrayViewD::from_shape(IxDyn(&shape), data)
                .map_err(|e| KeyspotError::OnnxSession(format!("input {name}: {e}")))?;
            let tensor = TensorRef::from_array_view(view)
                .map_err(|e| KeyspotError::OnnxSession(e.to_string()))?;
            feeds.push((name.clone(), SessionInputValue::from(tensor)));
        }

        let outputs = self
            .session
            .run(feeds)
            .map_err(|e| KeyspotError::OnnxSession(e.to_string()))?;

        let mut results = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let (_, data) = outputs[name.as_str()]
                .try_extract_tensor::<f32>()
                .map_err(|e| KeyspotError::OnnxSession(e.to_string()))?;
            results.push(data.to_vec());
        }
        Ok(results)
    }
}
