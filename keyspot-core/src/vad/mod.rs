//! Voice activity detection.
//!
//! The spotter only consumes a per-frame `is_speech` boolean. Any detector
//! implementing `VoiceActivityDetector` can drive the worker; `EnergyVad` is
//! the built-in one. `SpeechGate` turns the per-frame decision into start and
//! end edges.

pub mod energy;

pub use energy::EnergyVad;

use crate::buffering::AudioFrame;

/// Whether a given audio frame contains speech or silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadDecision {
    Speech,
    /// Silent, or below threshold after the hangover ran out.
    Silence,
}

impl VadDecision {
    pub fn is_speech(self) -> bool {
        self == VadDecision::Speech
    }
}

/// Trait for all VAD implementations.
///
/// Implementors may be stateful (hangover counters, hidden states).
pub trait VoiceActivityDetector: Send + 'static {
    /// Classify one frame at the rate it was captured at.
    fn classify(&mut self, frame: &AudioFrame) -> VadDecision;

    fn reset(&mut self);
}

/// A change in the speech gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechEdge {
    Started,
    Ended,
}

/// Tracks the previous frame's speech decision and reports edges, each
/// exactly once.
#[derive(Debug, Clone, Default)]
pub struct SpeechGate {
    speaking: bool,
}

impl SpeechGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    pub fn update(&mut self, is_speech: bool) -> Option<SpeechEdge> {
        let edge = match (self.speaking, is_speech) {
            (false, true) => Some(SpeechEdge::Started),
            (true, false) => Some(SpeechEdge::Ended),
            _ => None,
        };
        self.speaking = is_speech;
        edge
    }

    pub fn reset(&mut self) {
        self.speaking = false;
    }
}
