//! `KeywordSpotter`: per-frame orchestration of recognizer, speech gate and
//! activation controller.
//!
//! The spotter is synchronous and single-owner. `KeyspotEngine` moves it onto
//! the worker thread; the replay tool and tests drive it directly.
//!
//! ## Per frame
//!
//! ```text
//! 1. speech gate update (edge detection)
//! 2. recognizer.process_frame()            Idle: detect, Active: accumulate
//! 3. Active → controller.tick()            may end the activation
//!    Idle   → Detection::Activate          begins an activation
//! 4. speech End edge → full reset
//! ```
//!
//! Any error in steps 1–3 becomes an `Error` event, ends an open activation
//! with `Deactivate` and fully resets the pipeline. The next frame is
//! processed normally.

use tracing::{debug, error, info};

use crate::{
    buffering::AudioFrame,
    detect::{ActivationController, ActivationState, DeactivationReason, ResetScope},
    engine::config::{EngineConfig, PipelineGeometry},
    error::{KeyspotError, Result},
    inference::ModelSet,
    ipc::events::SpotterEvent,
    recognizer::{build_recognizer, Detection, FrameState, Recognition, Recognizer},
    vad::{SpeechEdge, SpeechGate},
};

pub struct KeywordSpotter {
    geometry: PipelineGeometry,
    recognizer: Box<dyn Recognizer>,
    controller: ActivationController,
    gate: SpeechGate,
    frame_index: u64,
}

impl KeywordSpotter {
    /// Validate `config` and assemble the configured recognizer.
    ///
    /// # Errors
    /// `InvalidConfiguration` for any configuration or model-shape problem.
    pub fn new(config: &EngineConfig, models: Option<ModelSet>) -> Result<Self> {
        let geometry = config.geometry()?;
        let recognizer = build_recognizer(config, &geometry, models)?;
        info!(
            recognizer = recognizer.name(),
            frame_samples = geometry.frame_samples,
            fft_size = geometry.fft_size,
            hop_samples = geometry.hop_samples,
            min_active_frames = geometry.min_active_frames,
            max_active_frames = geometry.max_active_frames,
            "keyword spotter configured"
        );
        Ok(Self::with_recognizer(geometry, recognizer))
    }

    /// Use a custom recognizer with an already validated geometry.
    pub fn with_recognizer(geometry: PipelineGeometry, recognizer: Box<dyn Recognizer>) -> Self {
        Self {
            controller: ActivationController::new(
                geometry.min_active_frames,
                geometry.max_active_frames,
            ),
            geometry,
            recognizer,
            gate: SpeechGate::new(),
            frame_index: 0,
        }
    }

    pub fn geometry(&self) -> &PipelineGeometry {
        &self.geometry
    }

    /// Samples every frame must carry.
    pub fn frame_samples(&self) -> usize {
        self.geometry.frame_samples
    }

    /// Index the next processed frame will get.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn activation_state(&self) -> ActivationState {
        self.controller.state()
    }

    pub fn recognizer_name(&self) -> &'static str {
        self.recognizer.name()
    }

    /// Process one frame and return the events it produced, in order.
    pub fn process_frame(&mut self, frame: &AudioFrame, is_speech: bool) -> Vec<SpotterEvent> {
        let index = self.frame_index;
        self.frame_index += 1;

        let mut events = Vec::new();
        if let Err(err) = self.step(frame, is_speech, index, &mut events) {
            self.recover(index, &err, &mut events);
        }
        events
    }

    /// Request an activation independently of detection. Returns no events if
    /// already active.
    pub fn activate(&mut self) -> Vec<SpotterEvent> {
        let mut events = Vec::new();
        if !self.controller.is_active() {
            self.begin_activation(self.frame_index, 1.0, None, &mut events);
        }
        events
    }

    /// End the current activation on request. Never reports a timeout.
    pub fn deactivate(&mut self) -> Vec<SpotterEvent> {
        let mut events = Vec::new();
        if let Some(reason) = self.controller.deactivate() {
            self.end_activation(reason, self.frame_index, &mut events);
        }
        events
    }

    /// Return to the initial state: idle, silent, all windows re-primed.
    pub fn reset(&mut self) {
        self.controller.reset();
        self.gate.reset();
        self.recognizer.reset(ResetScope::Restart);
        self.frame_index = 0;
    }

    fn step(
        &mut self,
        frame: &AudioFrame,
        is_speech: bool,
        index: u64,
        events: &mut Vec<SpotterEvent>,
    ) -> Result<()> {
        if frame.len() != self.geometry.frame_samples {
            return Err(KeyspotError::config(format!(
                "frame of {} samples, expected {}",
                frame.len(),
                self.geometry.frame_samples
            )));
        }
        if frame.sample_rate() != self.geometry.sample_rate {
            return Err(KeyspotError::config(format!(
                "frame at {} Hz, expected {} Hz",
                frame.sample_rate(),
                self.geometry.sample_rate
            )));
        }

        let edge = self.gate.update(is_speech);
        let state = FrameState {
            index,
            is_speech,
            activation: self.controller.state(),
        };
        let detection = self.recognizer.process_frame(frame, &state)?;

        if state.is_active() {
            if let Some(reason) = self.controller.tick(is_speech) {
                self.end_activation(reason, index, events);
            }
        } else if let Detection::Activate {
            posterior,
            recognition,
        } = detection
        {
            self.begin_activation(index, posterior, recognition, events);
        }

        if edge == Some(SpeechEdge::Ended) {
            debug!(
                frame = index,
                posterior_max = ?self.recognizer.posterior_max(),
                "speech ended"
            );
            self.recognizer.reset(ResetScope::Full);
        }
        Ok(())
    }

    fn begin_activation(
        &mut self,
        frame: u64,
        posterior: f32,
        recognition: Option<Recognition>,
        events: &mut Vec<SpotterEvent>,
    ) {
        self.controller.activate();
        self.recognizer.reset(ResetScope::Activation);
        info!(frame, posterior, recognizer = self.recognizer.name(), "activated");
        events.push(SpotterEvent::Activate { frame });
        if let Some(recognition) = recognition {
            events.push(recognized(frame, recognition));
        }
    }

    /// The controller is already idle when this runs.
    fn end_activation(
        &mut self,
        reason: DeactivationReason,
        frame: u64,
        events: &mut Vec<SpotterEvent>,
    ) {
        let timed_out = if self.recognizer.recognizes() {
            match self.recognizer.finish() {
                Ok(Some(recognition)) => {
                    events.push(recognized(frame, recognition));
                    false
                }
                Ok(None) => reason != DeactivationReason::External,
                Err(err) => {
                    self.report(frame, &err, events);
                    false
                }
            }
        } else {
            reason == DeactivationReason::MaxActive
        };

        if timed_out {
            events.push(SpotterEvent::Timeout { frame });
        }
        events.push(SpotterEvent::Deactivate { frame });
        self.recognizer.reset(ResetScope::Full);
        info!(frame, ?reason, timed_out, "deactivated");
    }

    fn recover(&mut self, frame: u64, err: &KeyspotError, events: &mut Vec<SpotterEvent>) {
        self.report(frame, err, events);
        if self.controller.is_active() {
            self.controller.reset();
            events.push(SpotterEvent::Deactivate { frame });
        }
        self.recognizer.reset(ResetScope::Full);
    }

    fn report(&self, frame: u64, err: &KeyspotError, events: &mut Vec<SpotterEvent>) {
        error!(frame, kind = err.kind(), error = %err, "frame processing failed; pipeline reset");
        events.push(SpotterEvent::error(frame, err));
    }
}

fn recognized(frame: u64, recognition: Recognition) -> SpotterEvent {
    SpotterEvent::Recognized {
        frame,
        class_id: recognition.class_id,
        transcript: recognition.transcript,
        confidence: recognition.confidence,
    }
}

impl std::fmt::Debug for KeywordSpotter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordSpotter")
            .field("recognizer", &self.recognizer.name())
            .field("state", &self.controller.state())
            .field("frame_index", &self.frame_index)
            .finish()
    }
}
