//! Blocking worker loop.
//!
//! ## Per iteration
//!
//! ```text
//! 0. Check the running flag
//! 1. Apply queued control commands (activate / deactivate)
//! 2. Pop one whole frame from the SPSC queue (sleep briefly if none)
//! 3. VAD classify → is_speech
//! 4. KeywordSpotter::process_frame → events
//! 5. Broadcast events; update status and diagnostics
//! ```
//!
//! The loop runs on a dedicated thread owned by `KeyspotEngine`. Frames are
//! handled strictly in arrival order and nothing is processed once the
//! running flag is cleared.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, OnceLock,
};
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::{
    buffering::{discard_queued, pop_frame, AudioFrame, SampleConsumer},
    engine::spotter::KeywordSpotter,
    ipc::events::{EngineStatus, EngineStatusEvent, SpotterEvent},
    vad::VoiceActivityDetector,
};

/// Requests sent from `KeyspotEngine` to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Activate,
    Deactivate,
}

#[derive(Default)]
pub struct PipelineDiagnostics {
    pub frames_in: AtomicUsize,
    /// Shared with the `FrameSink`, which counts frames it could not queue.
    pub frames_dropped: Arc<AtomicUsize>,
    pub speech_frames: AtomicUsize,
    pub activations: AtomicUsize,
    pub recognitions: AtomicUsize,
    pub timeouts: AtomicUsize,
    pub stage_errors: AtomicUsize,
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.frames_in.store(0, Ordering::Relaxed);
        self.frames_dropped.store(0, Ordering::Relaxed);
        self.speech_frames.store(0, Ordering::Relaxed);
        self.activations.store(0, Ordering::Relaxed);
        self.recognitions.store(0, Ordering::Relaxed);
        self.timeouts.store(0, Ordering::Relaxed);
        self.stage_errors.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            frames_in: self.frames_in.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            speech_frames: self.speech_frames.load(Ordering::Relaxed),
            activations: self.activations.load(Ordering::Relaxed),
            recognitions: self.recognitions.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            stage_errors: self.stage_errors.load(Ordering::Relaxed),
        }
    }

    fn record(&self, event: &SpotterEvent) {
        let counter = match event {
            SpotterEvent::Activate { .. } => &self.activations,
            SpotterEvent::Recognized { .. } => &self.recognitions,
            SpotterEvent::Timeout { .. } => &self.timeouts,
            SpotterEvent::Error { .. } => &self.stage_errors,
            SpotterEvent::Deactivate { .. } => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub frames_in: usize,
    pub frames_dropped: usize,
    pub speech_frames: usize,
    pub activations: usize,
    pub recognitions: usize,
    pub timeouts: usize,
    pub stage_errors: usize,
}

/// All context the worker needs, passed as one struct so the closure stays tidy.
pub struct PipelineContext {
    pub spotter: KeywordSpotter,
    pub vad: Box<dyn VoiceActivityDetector>,
    pub consumer: SampleConsumer,
    pub control_rx: Receiver<ControlCommand>,
    pub running: Arc<AtomicBool>,
    pub event_tx: broadcast::Sender<SpotterEvent>,
    pub status_tx: broadcast::Sender<EngineStatusEvent>,
    pub status: Arc<Mutex<EngineStatus>>,
    pub diagnostics: Arc<PipelineDiagnostics>,
}

/// Minimum sleep when the queue is empty (avoids busy-wait burning a core).
const DEFAULT_SLEEP_EMPTY_MS: u64 = 5;

/// Run the worker until `ctx.running` becomes false, then hand the spotter
/// back, reset.
pub fn run(mut ctx: PipelineContext) -> KeywordSpotter {
    info!(recognizer = ctx.spotter.recognizer_name(), "pipeline started");

    let sample_rate = ctx.spotter.geometry().sample_rate;
    let mut scratch = vec![0i16; ctx.spotter.frame_samples()];
    let mut degraded = false;

    loop {
        if !ctx.running.load(Ordering::Relaxed) {
            break;
        }

        while let Ok(command) = ctx.control_rx.try_recv() {
            debug!(?command, "control command");
            let events = match command {
                ControlCommand::Activate => ctx.spotter.activate(),
                ControlCommand::Deactivate => ctx.spotter.deactivate(),
            };
            publish(&ctx, events);
        }

        if !pop_frame(&mut ctx.consumer, &mut scratch) {
            std::thread::sleep(Duration::from_millis(empty_sleep_ms()));
            continue;
        }
        ctx.diagnostics.frames_in.fetch_add(1, Ordering::Relaxed);

        let frame = AudioFrame::new(scratch.clone(), sample_rate);
        let is_speech = ctx.vad.classify(&frame).is_speech();
        if is_speech {
            ctx.diagnostics.speech_frames.fetch_add(1, Ordering::Relaxed);
        }

        let events = ctx.spotter.process_frame(&frame, is_speech);
        match publish(&ctx, events) {
            Some(detail) => {
                set_status(&ctx, EngineStatus::Error, Some(detail));
                degraded = true;
            }
            None if degraded => {
                set_status(&ctx, EngineStatus::Listening, None);
                degraded = false;
            }
            None => {}
        }
    }

    let discarded = discard_queued(&mut ctx.consumer);
    if discarded > 0 {
        debug!(samples = discarded, "discarded queued audio on stop");
    }
    ctx.spotter.reset();
    ctx.vad.reset();

    let snap = ctx.diagnostics.snapshot();
    info!(
        frames_in = snap.frames_in,
        frames_dropped = snap.frames_dropped,
        speech_frames = snap.speech_frames,
        activations = snap.activations,
        recognitions = snap.recognitions,
        timeouts = snap.timeouts,
        stage_errors = snap.stage_errors,
        "pipeline stopped, diagnostics"
    );
    ctx.spotter
}

/// Broadcast `events`. Returns the last error message, if any event was an
/// error.
fn publish(ctx: &PipelineContext, events: Vec<SpotterEvent>) -> Option<String> {
    let mut error = None;
    for event in events {
        ctx.diagnostics.record(&event);
        if let SpotterEvent::Error { message, .. } = &event {
            error = Some(message.clone());
        }
        // No subscribers is not an error.
        let _ = ctx.event_tx.send(event);
    }
    error
}

fn set_status(ctx: &PipelineContext, status: EngineStatus, detail: Option<String>) {
    *ctx.status.lock() = status;
    let _ = ctx.status_tx.send(EngineStatusEvent { status, detail });
}

fn empty_sleep_ms() -> u64 {
    static EMPTY_SLEEP_MS: OnceLock<u64> = OnceLock::new();
    *EMPTY_SLEEP_MS.get_or_init(|| {
        std::env::var("KEYSPOT_PIPELINE_EMPTY_SLEEP_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(|v| v.clamp(1, 20))
            .unwrap_or(DEFAULT_SLEEP_EMPTY_MS)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;
    use std::time::Instant;

    use tokio::sync::broadcast::error::TryRecvError;

    use crate::buffering::{create_frame_queue, Producer};
    use crate::detect::cascade::tests::{models_with_detect, scripted_models, small_config};
    use crate::detect::ActivationState;
    use crate::error::KeyspotError;
    use crate::inference::{FnModel, ModelSignature};
    use crate::vad::VadDecision;

    struct ScriptedVad {
        decisions: Vec<VadDecision>,
        idx: usize,
        resets: Arc<AtomicUsize>,
    }

    impl ScriptedVad {
        fn new(decisions: Vec<VadDecision>, resets: Arc<AtomicUsize>) -> Self {
            Self {
                decisions,
                idx: 0,
                resets,
            }
        }
    }

    impl VoiceActivityDetector for ScriptedVad {
        fn classify(&mut self, _frame: &AudioFrame) -> VadDecision {
            let decision = self
                .decisions
                .get(self.idx)
                .copied()
                .unwrap_or(VadDecision::Silence);
            self.idx += 1;
            decision
        }

        fn reset(&mut self) {
            self.resets.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn recv_with_timeout<T: Clone>(rx: &mut broadcast::Receiver<T>, timeout: Duration) -> T {
        let start = Instant::now();
        loop {
            match rx.try_recv() {
                Ok(ev) => return ev,
                Err(TryRecvError::Empty) => {
                    if start.elapsed() >= timeout {
                        panic!("timed out waiting for event");
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Closed) => panic!("event channel closed unexpectedly"),
            }
        }
    }

    struct Harness {
        running: Arc<AtomicBool>,
        events: broadcast::Receiver<SpotterEvent>,
        statuses: broadcast::Receiver<EngineStatusEvent>,
        control: crossbeam_channel::Sender<ControlCommand>,
        diagnostics: Arc<PipelineDiagnostics>,
        vad_resets: Arc<AtomicUsize>,
        handle: thread::JoinHandle<KeywordSpotter>,
    }

    impl Harness {
        fn stop(self) -> (KeywordSpotter, Arc<PipelineDiagnostics>, Arc<AtomicUsize>) {
            self.running.store(false, Ordering::SeqCst);
            let spotter = self.handle.join().expect("pipeline thread panicked");
            (spotter, self.diagnostics, self.vad_resets)
        }
    }

    fn spawn(
        spotter: KeywordSpotter,
        speech: Vec<VadDecision>,
        frames: usize,
        running: bool,
    ) -> Harness {
        let frame_samples = spotter.frame_samples();
        let (mut producer, consumer) = create_frame_queue(frame_samples, 16);
        for _ in 0..frames {
            producer.push_slice(&vec![800i16; frame_samples]);
        }

        let vad_resets = Arc::new(AtomicUsize::new(0));
        let (event_tx, events) = broadcast::channel(64);
        let (status_tx, statuses) = broadcast::channel(16);
        let (control, control_rx) = crossbeam_channel::unbounded();
        let running = Arc::new(AtomicBool::new(running));
        let diagnostics = Arc::new(PipelineDiagnostics::default());

        let ctx = PipelineContext {
            spotter,
            vad: Box::new(ScriptedVad::new(speech, Arc::clone(&vad_resets))),
            consumer,
            control_rx,
            running: Arc::clone(&running),
            event_tx,
            status_tx,
            status: Arc::new(Mutex::new(EngineStatus::Listening)),
            diagnostics: Arc::clone(&diagnostics),
        };
        let handle = thread::spawn(move || run(ctx));

        Harness {
            running,
            events,
            statuses,
            control,
            diagnostics,
            vad_resets,
            handle,
        }
    }

    fn wake_spotter(script: Vec<f32>) -> KeywordSpotter {
        let calls = Arc::new(AtomicUsize::new(0));
        KeywordSpotter::new(&small_config(), Some(scripted_models(1, script, calls)))
            .expect("spotter")
    }

    #[test]
    fn run_emits_activation_from_queued_frames() {
        let spotter = wake_spotter(vec![0.0, 0.0, 0.0, 0.95, 0.0]);
        let mut h = spawn(spotter, vec![VadDecision::Speech; 5], 5, true);

        let event = recv_with_timeout(&mut h.events, Duration::from_secs(2));
        assert_eq!(event, SpotterEvent::Activate { frame: 3 });

        let (spotter, diagnostics, vad_resets) = h.stop();
        let snap = diagnostics.snapshot();
        assert!(snap.frames_in >= 4);
        assert_eq!(snap.activations, 1);
        assert_eq!(snap.stage_errors, 0);
        // reset on stop
        assert_eq!(spotter.activation_state(), ActivationState::Idle);
        assert_eq!(spotter.frame_index(), 0);
        assert_eq!(vad_resets.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn control_commands_reach_the_spotter() {
        let spotter = wake_spotter(vec![0.0]);
        let mut h = spawn(spotter, Vec::new(), 0, true);

        h.control.send(ControlCommand::Activate).expect("send");
        assert_eq!(
            recv_with_timeout(&mut h.events, Duration::from_secs(2)),
            SpotterEvent::Activate { frame: 0 }
        );
        h.control.send(ControlCommand::Deactivate).expect("send");
        assert_eq!(
            recv_with_timeout(&mut h.events, Duration::from_secs(2)),
            SpotterEvent::Deactivate { frame: 0 }
        );
        h.stop();
    }

    #[test]
    fn stage_error_flags_status_then_recovers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let detect = FnModel::new(ModelSignature::new([8], [1]), move |_| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(KeyspotError::invocation("detect", "kernel fault"))
            } else {
                Ok(vec![vec![0.0]])
            }
        });
        let spotter =
            KeywordSpotter::new(&small_config(), Some(models_with_detect(detect))).expect("spotter");
        let mut h = spawn(spotter, vec![VadDecision::Speech; 2], 2, true);

        match recv_with_timeout(&mut h.events, Duration::from_secs(2)) {
            SpotterEvent::Error { frame, kind, .. } => {
                assert_eq!(frame, 0);
                assert_eq!(kind, "model_invocation");
            }
            other => panic!("expected error event, got {other:?}"),
        }
        let first = recv_with_timeout(&mut h.statuses, Duration::from_secs(2));
        assert_eq!(first.status, EngineStatus::Error);
        assert!(first.detail.is_some());
        let second = recv_with_timeout(&mut h.statuses, Duration::from_secs(2));
        assert_eq!(second.status, EngineStatus::Listening);

        let (_, diagnostics, _) = h.stop();
        assert_eq!(diagnostics.snapshot().stage_errors, 1);
    }

    #[test]
    fn stopped_worker_processes_nothing() {
        let spotter = wake_spotter(vec![1.0]);
        let mut h = spawn(spotter, vec![VadDecision::Speech; 4], 4, false);
        thread::sleep(Duration::from_millis(20));
        assert!(h.events.try_recv().is_err(), "no events after stop");
        let (spotter, diagnostics, vad_resets) = h.stop();
        assert_eq!(spotter.frame_index(), 0);
        assert_eq!(diagnostics.snapshot().frames_in, 0);
        assert_eq!(vad_resets.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn diagnostics_reset_clears_counters() {
        let diagnostics = PipelineDiagnostics::default();
        diagnostics.frames_in.store(3, Ordering::Relaxed);
        diagnostics.record(&SpotterEvent::Timeout { frame: 1 });
        diagnostics.record(&SpotterEvent::Deactivate { frame: 1 });
        assert_eq!(diagnostics.snapshot().timeouts, 1);
        diagnostics.reset();
        assert_eq!(
            diagnostics.snapshot(),
            DiagnosticsSnapshot {
                frames_in: 0,
                frames_dropped: 0,
                speech_frames: 0,
                activations: 0,
                recognitions: 0,
                timeouts: 0,
                stage_errors: 0,
            }
        );
    }
}
