//! Frame-counted activation state machine.
//!
//! ```text
//!          activate()                  tick(): elapsed > min &&
//!   Idle ─────────────► Active ─────► (!speech || elapsed >= max) ─► Idle
//!                         │
//!                         └── deactivate() (external) ─────────────► Idle
//! ```
//!
//! Durations are counted in frames, not wall-clock time, so activation
//! length is fully deterministic for a given frame sequence.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationState {
    Idle,
    Active,
}

/// Why an activation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeactivationReason {
    /// Speech stopped after the minimum activation length.
    SpeechEnded,
    /// The maximum activation length was reached while speech continued.
    MaxActive,
    /// `deactivate()` was requested by the caller.
    External,
}

#[derive(Debug, Clone)]
pub struct ActivationController {
    state: ActivationState,
    elapsed: usize,
    min_active: usize,
    max_active: usize,
}

impl ActivationController {
    pub fn new(min_active: usize, max_active: usize) -> Self {
        Self {
            state: ActivationState::Idle,
            elapsed: 0,
            min_active,
            max_active,
        }
    }

    pub fn state(&self) -> ActivationState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ActivationState::Active
    }

    /// Frames processed since the current activation began.
    pub fn elapsed(&self) -> usize {
        self.elapsed
    }

    /// Enter `Active`. Returns `false` if already active.
    pub fn activate(&mut self) -> bool {
        if self.is_active() {
            return false;
        }
        self.state = ActivationState::Active;
        self.elapsed = 0;
        true
    }

    /// Count one frame of an activation and decide whether it ends.
    ///
    /// Returns `None` while idle or while the activation continues.
    pub fn tick(&mut self, is_speech: bool) -> Option<DeactivationReason> {
        if !self.is_active() {
            return None;
        }
        self.elapsed += 1;
        if self.elapsed <= self.min_active {
            return None;
        }
        let reason = if !is_speech {
            DeactivationReason::SpeechEnded
        } else if self.elapsed >= self.max_active {
            DeactivationReason::MaxActive
        } else {
            return None;
        };
        self.reset();
        Some(reason)
    }

    /// End an activation on request. Returns `None` if already idle.
    pub fn deactivate(&mut self) -> Option<DeactivationReason> {
        if !self.is_active() {
            return None;
        }
        self.reset();
        Some(DeactivationReason::External)
    }

    pub fn reset(&mut self) {
        self.state = ActivationState::Idle;
        self.elapsed = 0;
    }
}
