//! Detection cascade and activation timing.
//!
//! ```text
//! spectrum ─► FeatureTransform (filter model, mel window)
//!          ─► SequenceEncoder  (encode model, hidden state, encode window)
//!          ─► Classifier       (detect model, posteriors)
//!          ─► PosteriorSmoother + Phraser   (phrase mode only)
//!          ─► ActivationController
//! ```
//!
//! Every window is a `RingBuffer<f32>` written with the write-ahead pattern
//! (`rewind().seek(width)` then one batch write), so a full drain always
//! yields the most recent `capacity` values oldest-first.

pub mod activation;
pub mod cascade;
pub mod classifier;
pub mod encoder;
pub mod features;
pub mod phraser;

pub use activation::{ActivationController, ActivationState, DeactivationReason};
pub use cascade::ModelCascade;
pub use classifier::Classifier;
pub use encoder::{EncodeState, SequenceEncoder};
pub use features::FeatureTransform;
pub use phraser::{PhraseDefinition, Phraser, PosteriorSmoother};

/// How much pipeline state a reset clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    /// Entering an activation: everything except the encoder hidden state.
    Activation,
    /// Speech ended, activation ended or stage error. Signal levels are kept.
    Full,
    /// Engine stop: `Full` plus the RMS average and pre-emphasis history.
    Restart,
}

impl ResetScope {
    /// Whether the encoder hidden state and per-segment traces are cleared.
    pub fn clears_state(self) -> bool {
        self != ResetScope::Activation
    }
}
