mod common;

use std::sync::{atomic::AtomicUsize, Arc};
use std::thread;
use std::time::{Duration, Instant};

use keyspot_core::vad::{VadDecision, VoiceActivityDetector};
use keyspot_core::{
    AudioFrame, EngineStatus, KeyspotEngine, KeyspotError, RecognizerKind, SpotterEvent,
};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

use common::{small_config, speech_frame, wake_models, FRAME_SAMPLES};

struct AlwaysSpeechVad;

impl VoiceActivityDetector for AlwaysSpeechVad {
    fn classify(&mut self, _frame: &AudioFrame) -> VadDecision {
        VadDecision::Speech
    }

    fn reset(&mut self) {}
}

fn recv_event_with_timeout(
    rx: &mut broadcast::Receiver<SpotterEvent>,
    timeout: Duration,
) -> SpotterEvent {
    let start = Instant::now();
    loop {
        match rx.try_recv() {
            Ok(ev) => return ev,
            Err(TryRecvError::Empty) => {
                if start.elapsed() >= timeout {
                    panic!("timed out waiting for spotter event");
                }
                thread::sleep(Duration::from_millis(5));
            }
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Closed) => panic!("event channel closed unexpectedly"),
        }
    }
}

fn wake_engine(script: Vec<f32>) -> KeyspotEngine {
    let calls = Arc::new(AtomicUsize::new(0));
    KeyspotEngine::new(small_config(), Some(wake_models(script, calls))).expect("engine")
}

#[test]
fn frames_pushed_from_another_thread_activate_the_engine() {
    let engine = wake_engine(vec![0.0, 0.0, 0.0, 0.97]);
    let mut events = engine.subscribe_events();
    let mut sink = engine
        .start_with_vad(Box::new(AlwaysSpeechVad))
        .expect("start");

    let producer = thread::spawn(move || {
        for _ in 0..6 {
            assert!(sink.push_frame(&speech_frame()));
            thread::sleep(Duration::from_millis(2));
        }
        sink
    });

    let event = recv_event_with_timeout(&mut events, Duration::from_secs(2));
    assert_eq!(event, SpotterEvent::Activate { frame: 3 });
    let _sink = producer.join().expect("producer thread panicked");

    engine.stop().expect("stop");
    let snap = engine.pipeline_diagnostics_snapshot();
    assert_eq!(snap.activations, 1);
    assert_eq!(snap.frames_dropped, 0);
    assert!(snap.frames_in >= 4);
}

#[test]
fn little_endian_frames_are_accepted() {
    let engine = wake_engine(vec![0.99]);
    let mut events = engine.subscribe_events();
    let mut sink = engine
        .start_with_vad(Box::new(AlwaysSpeechVad))
        .expect("start");

    let bytes: Vec<u8> = speech_frame()
        .iter()
        .flat_map(|s| s.to_le_bytes())
        .collect();
    assert!(sink.push_le_bytes(&bytes));

    assert_eq!(
        recv_event_with_timeout(&mut events, Duration::from_secs(2)),
        SpotterEvent::Activate { frame: 0 }
    );
    engine.stop().expect("stop");
}

#[test]
fn malformed_frames_are_dropped_and_counted() {
    let engine = wake_engine(vec![0.0]);
    let mut sink = engine
        .start_with_vad(Box::new(AlwaysSpeechVad))
        .expect("start");

    assert!(!sink.push_frame(&vec![0i16; FRAME_SAMPLES - 1]));
    assert!(!sink.push_le_bytes(&[0u8; 3]));
    engine.stop().expect("stop");
    assert_eq!(engine.pipeline_diagnostics_snapshot().frames_dropped, 2);
}

#[test]
fn external_activation_round_trip() {
    let config = keyspot_core::EngineConfig {
        recognizer: RecognizerKind::VadTrigger,
        ..small_config()
    };
    let engine = KeyspotEngine::new(config, None).expect("engine");
    let mut events = engine.subscribe_events();
    let _sink = engine.start().expect("start");

    engine.activate().expect("activate");
    assert_eq!(
        recv_event_with_timeout(&mut events, Duration::from_secs(2)),
        SpotterEvent::Activate { frame: 0 }
    );
    engine.deactivate().expect("deactivate");
    assert_eq!(
        recv_event_with_timeout(&mut events, Duration::from_secs(2)),
        SpotterEvent::Deactivate { frame: 0 }
    );

    engine.stop().expect("stop");
    assert_eq!(engine.status(), EngineStatus::Stopped);
    assert!(matches!(engine.activate(), Err(KeyspotError::NotRunning)));
}
