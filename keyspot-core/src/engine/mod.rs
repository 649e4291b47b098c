//! `KeyspotEngine`: top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! KeyspotEngine::new()   → config validated, models bound, status = Idle
//!     └─► start()        → worker thread spawned, FrameSink returned, status = Listening
//!         └─► stop()     → running=false, worker joined, status = Stopped
//! ```
//!
//! `start()`/`stop()` called in the wrong state return an error rather than
//! panicking. The engine can be restarted after `stop()`.
//!
//! ## Threading
//!
//! The `KeywordSpotter` moves onto a named worker thread on `start()` and is
//! handed back through the thread's `JoinHandle` on `stop()`. The caller
//! keeps the `FrameSink` and pushes frames from its audio thread; the sink
//! never blocks.

pub mod config;
pub mod pipeline;
pub mod spotter;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub use config::{EngineConfig, PipelineGeometry, RecognizerKind};
pub use pipeline::{ControlCommand, DiagnosticsSnapshot, PipelineDiagnostics};
pub use spotter::KeywordSpotter;

use crate::{
    buffering::{create_frame_queue, FrameSink},
    error::{KeyspotError, Result},
    inference::ModelSet,
    ipc::events::{EngineStatus, EngineStatusEvent, SpotterEvent},
    vad::{EnergyVad, VoiceActivityDetector},
};

/// Broadcast channel capacity: 256 events buffered for slow consumers.
const BROADCAST_CAP: usize = 256;

struct Worker {
    handle: JoinHandle<KeywordSpotter>,
    control_tx: Sender<ControlCommand>,
}

/// The top-level engine handle.
///
/// `KeyspotEngine` is `Send + Sync`; all fields use interior mutability.
pub struct KeyspotEngine {
    config: EngineConfig,
    /// The spotter while no worker owns it.
    spotter: Mutex<Option<KeywordSpotter>>,
    worker: Mutex<Option<Worker>>,
    /// `true` while the worker is running.
    running: Arc<AtomicBool>,
    status: Arc<Mutex<EngineStatus>>,
    event_tx: broadcast::Sender<SpotterEvent>,
    status_tx: broadcast::Sender<EngineStatusEvent>,
    diagnostics: Arc<PipelineDiagnostics>,
}

impl KeyspotEngine {
    /// Create an engine. Does not start processing; call `start()`.
    ///
    /// # Errors
    /// `InvalidConfiguration` if `config` is invalid or the models do not fit
    /// it.
    pub fn new(config: EngineConfig, models: Option<ModelSet>) -> Result<Self> {
        let spotter = KeywordSpotter::new(&config, models)?;
        let (event_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);

        Ok(Self {
            config,
            spotter: Mutex::new(Some(spotter)),
            worker: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(EngineStatus::Idle)),
            event_tx,
            status_tx,
            diagnostics: Arc::new(PipelineDiagnostics::default()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start the worker with the configured `EnergyVad`.
    ///
    /// # Errors
    /// - `KeyspotError::AlreadyRunning` if already started.
    /// - `KeyspotError::Io` if the worker thread cannot be spawned.
    pub fn start(&self) -> Result<FrameSink> {
        let vad = EnergyVad::new(self.config.vad_threshold, self.config.vad_hangover_frames);
        self.start_with_vad(Box::new(vad))
    }

    /// Start the worker with a caller-supplied voice activity detector.
    pub fn start_with_vad(&self, vad: Box<dyn VoiceActivityDetector>) -> Result<FrameSink> {
        if self.running.load(Ordering::SeqCst) {
            return Err(KeyspotError::AlreadyRunning);
        }
        let spotter = self.spotter.lock().take().ok_or_else(|| {
            KeyspotError::Other(anyhow::anyhow!("spotter was lost by a failed worker"))
        })?;

        self.diagnostics.reset();
        let frame_samples = spotter.frame_samples();
        let (producer, consumer) =
            create_frame_queue(frame_samples, spotter.geometry().queue_frames);
        let (control_tx, control_rx) = crossbeam_channel::unbounded();

        self.running.store(true, Ordering::SeqCst);
        self.set_status(EngineStatus::Listening, None);

        let ctx = pipeline::PipelineContext {
            spotter,
            vad,
            consumer,
            control_rx,
            running: Arc::clone(&self.running),
            event_tx: self.event_tx.clone(),
            status_tx: self.status_tx.clone(),
            status: Arc::clone(&self.status),
            diagnostics: Arc::clone(&self.diagnostics),
        };

        let spawned = std::thread::Builder::new()
            .name("keyspot-pipeline".into())
            .spawn(move || pipeline::run(ctx));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                self.set_status(EngineStatus::Error, Some(e.to_string()));
                return Err(e.into());
            }
        };
        *self.worker.lock() = Some(Worker { handle, control_tx });

        info!(frame_samples, "engine started, listening");
        Ok(FrameSink::new(
            producer,
            frame_samples,
            Arc::clone(&self.diagnostics.frames_dropped),
        ))
    }

    /// Stop the worker, discarding queued frames, and wait for it to exit.
    ///
    /// # Errors
    /// - `KeyspotError::NotRunning` if not currently running.
    pub fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(KeyspotError::NotRunning);
        }
        info!("engine stop requested");

        if let Some(worker) = self.worker.lock().take() {
            match worker.handle.join() {
                Ok(spotter) => *self.spotter.lock() = Some(spotter),
                Err(_) => {
                    self.set_status(EngineStatus::Error, Some("pipeline worker panicked".into()));
                    return Err(KeyspotError::Other(anyhow::anyhow!(
                        "pipeline worker panicked"
                    )));
                }
            }
        }
        self.set_status(EngineStatus::Stopped, None);
        Ok(())
    }

    /// Request an activation, as if a wakeword had been detected.
    ///
    /// # Errors
    /// `KeyspotError::NotRunning` if the worker is not running.
    pub fn activate(&self) -> Result<()> {
        self.send(ControlCommand::Activate)
    }

    /// End the current activation. Reported as `Deactivate`, never `Timeout`.
    pub fn deactivate(&self) -> Result<()> {
        self.send(ControlCommand::Deactivate)
    }

    /// Current engine status (snapshot).
    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Subscribe to spotter events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SpotterEvent> {
        self.event_tx.subscribe()
    }

    /// Subscribe to live status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<EngineStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Snapshot of pipeline counters for observability.
    pub fn pipeline_diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn send(&self, command: ControlCommand) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(KeyspotError::NotRunning);
        }
        let worker = self.worker.lock();
        let worker = worker.as_ref().ok_or(KeyspotError::NotRunning)?;
        worker
            .control_tx
            .send(command)
            .map_err(|_| KeyspotError::NotRunning)
    }

    fn set_status(&self, new_status: EngineStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(EngineStatusEvent {
            status: new_status,
            detail,
        });
    }
}

impl Drop for KeyspotEngine {
    fn drop(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            if let Err(e) = self.stop() {
                warn!(error = %e, "engine stop on drop failed");
            }
        }
    }
}
