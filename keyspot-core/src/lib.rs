//! # keyspot-core
//!
//! Streaming keyword and wakeword spotting engine.
//!
//! ## Architecture
//!
//! ```text
//! audio thread ─► FrameSink ─► SPSC queue ─► worker thread
//!                                                 │
//!                                           VAD decision
//!                                                 │
//!                                  KeywordSpotter::process_frame
//!                     SpectralFrontEnd → filter → encode → detect
//!                          → (smoother + phraser) → ActivationController
//!                                                 │
//!                                broadcast::Sender<SpotterEvent>
//! ```
//!
//! Pushing a frame never blocks or allocates. All DSP and model work happens
//! on the worker thread, strictly in frame order.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod buffering;
pub mod detect;
pub mod engine;
pub mod error;
pub mod inference;
pub mod ipc;
pub mod recognizer;
pub mod signal;
pub mod vad;

// Convenience re-exports for downstream crates
pub use buffering::{AudioFrame, FrameSink, RingBuffer};
pub use engine::{EngineConfig, KeyspotEngine, KeywordSpotter, RecognizerKind};
pub use error::{KeyspotError, Result};
pub use inference::{FnModel, ModelSet, ModelSignature, TensorModel};
pub use ipc::events::{EngineStatus, EngineStatusEvent, SpotterEvent};
pub use vad::{EnergyVad, VoiceActivityDetector};

#[cfg(feature = "onnx")]
pub use inference::OnnxTensorModel;
