mod common;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use keyspot_core::detect::ActivationState;
use keyspot_core::{
    AudioFrame, EngineConfig, FnModel, KeywordSpotter, ModelSignature, RecognizerKind,
    SpotterEvent,
};

use common::{models_with_detect, silent_frame, small_config, speech_frame, wake_models};

fn frame(samples: Vec<i16>) -> AudioFrame {
    AudioFrame::new(samples, 16_000)
}

#[test]
fn silence_never_activates_and_wakeword_fires_once_at_frame_three() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut spotter = KeywordSpotter::new(
        &small_config(),
        Some(wake_models(vec![0.1, 0.2, 0.3, 0.95], Arc::clone(&calls))),
    )
    .expect("spotter");

    // 500 ms of silence
    for _ in 0..25 {
        let events = spotter.process_frame(&frame(silent_frame()), false);
        assert!(events.is_empty(), "{events:?}");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    spotter.reset();
    let mut events = Vec::new();
    for _ in 0..5 {
        events.extend(spotter.process_frame(&frame(speech_frame()), true));
    }
    assert_eq!(events, vec![SpotterEvent::Activate { frame: 3 }]);
    assert_eq!(spotter.activation_state(), ActivationState::Active);
    // The cascade is not run while active.
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn activation_times_out_at_max_with_continuous_speech() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut spotter = KeywordSpotter::new(&small_config(), Some(wake_models(vec![0.99], calls)))
        .expect("spotter");

    let mut timeline = Vec::new();
    for i in 0..7 {
        for event in spotter.process_frame(&frame(speech_frame()), true) {
            timeline.push((i, event));
        }
    }
    assert_eq!(
        timeline,
        vec![
            (0, SpotterEvent::Activate { frame: 0 }),
            (5, SpotterEvent::Timeout { frame: 5 }),
            (5, SpotterEvent::Deactivate { frame: 5 }),
        ]
    );
}

/// "up dog" with single-frame smoothing and a 100 ms (five frame) phrase
/// window.
fn phrase_config() -> EngineConfig {
    EngineConfig {
        recognizer: RecognizerKind::Phrase {
            keywords: vec!["up".into(), "dog".into()],
            phrases: vec!["up dog".into()],
            smooth_length_ms: 20,
            phrase_length_ms: 100,
        },
        ..small_config()
    }
}

/// Drive a phrase spotter. The n-th detect call puts 0.9 on `classes[n]`;
/// `speech[i]` is the gate decision for frame `i`.
fn run_phrase(classes: Vec<usize>, speech: &[bool]) -> Vec<SpotterEvent> {
    let calls = Arc::new(AtomicUsize::new(0));
    let detect = FnModel::new(ModelSignature::new([8], [3]), move |_| {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        let mut posteriors = vec![0.05; 3];
        posteriors[classes.get(n).copied().unwrap_or(0)] = 0.9;
        Ok(vec![posteriors])
    });
    let mut spotter =
        KeywordSpotter::new(&phrase_config(), Some(models_with_detect(detect))).expect("spotter");
    speech
        .iter()
        .flat_map(|&is_speech| {
            let samples = if is_speech { speech_frame() } else { silent_frame() };
            spotter.process_frame(&frame(samples), is_speech)
        })
        .collect()
}

#[test]
fn phrase_keywords_must_arrive_in_order() {
    let events = run_phrase(vec![0, 1, 0, 2, 0], &[true; 5]);
    assert_eq!(events.len(), 2, "{events:?}");
    assert_eq!(events[0], SpotterEvent::Activate { frame: 4 });
    match &events[1] {
        SpotterEvent::Recognized {
            frame, transcript, ..
        } => {
            assert_eq!(*frame, 4);
            assert_eq!(transcript, "up dog");
        }
        other => panic!("expected recognition, got {other:?}"),
    }

    assert!(run_phrase(vec![0, 2, 0, 1, 0], &[true; 5]).is_empty());
    assert!(run_phrase(vec![0, 1, 0], &[true; 5]).is_empty());
}

#[test]
fn phrase_window_spans_its_configured_duration() {
    // "up", two frames apart from "dog", then the trailing null: five
    // frames, exactly 100 ms.
    let events = run_phrase(vec![1, 0, 0, 2, 0], &[true; 5]);
    assert_eq!(events.first(), Some(&SpotterEvent::Activate { frame: 4 }));

    // One frame more and "up" has already left the window.
    assert!(run_phrase(vec![1, 0, 0, 0, 2, 0], &[true; 6]).is_empty());
}

#[test]
fn pause_between_keywords_starts_a_new_phrase() {
    // Without the reset on the speech-end edge the window would read
    // [0, 0, 1, 2, 0] at frame 3 and match.
    let speech = [true, false, true, true, true];
    assert!(run_phrase(vec![1, 2, 0, 0], &speech).is_empty());

    // The same keywords without the pause still match.
    let events = run_phrase(vec![1, 2, 0, 0], &[true; 4]);
    assert_eq!(events.first(), Some(&SpotterEvent::Activate { frame: 2 }));
}

#[test]
fn keyword_command_from_json_config() {
    let config = EngineConfig::from_json(
        r#"{
            "fftWindowSize": 256,
            "melFrameWidth": 4,
            "encodeLengthMs": 40,
            "encodeWidth": 2,
            "stateWidth": 2,
            "wakeActiveMinMs": 40,
            "wakeActiveMaxMs": 100,
            "recognizer": { "kind": "keyword", "classes": ["stop", "go"], "threshold": 0.6 }
        }"#,
    )
    .expect("config");

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let detect = FnModel::new(ModelSignature::new([8], [2]), move |inputs| {
        counter.fetch_add(1, Ordering::SeqCst);
        // untouched sentinel slots mean the window was re-primed with -1
        assert!(inputs[0].iter().all(|&v| v == -1.0 || (v - 0.1).abs() < 1e-6));
        Ok(vec![vec![0.7, 0.2]])
    });
    let mut spotter =
        KeywordSpotter::new(&config, Some(models_with_detect(detect))).expect("spotter");

    assert_eq!(spotter.activate(), vec![SpotterEvent::Activate { frame: 0 }]);
    let mut events = Vec::new();
    for speech in [true, true, true, false] {
        let samples = if speech { speech_frame() } else { silent_frame() };
        events.extend(spotter.process_frame(&frame(samples), speech));
    }
    assert_eq!(
        events,
        vec![
            SpotterEvent::Recognized {
                frame: 3,
                class_id: 0,
                transcript: "stop".into(),
                confidence: 0.7,
            },
            SpotterEvent::Deactivate { frame: 3 },
        ]
    );
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn invalid_configurations_fail_before_processing() {
    let bad = [
        EngineConfig {
            fft_window_size: 300,
            ..small_config()
        },
        EngineConfig {
            frame_width_ms: 25,
            ..small_config()
        },
        EngineConfig {
            sample_rate: 44_100,
            ..small_config()
        },
    ];
    for config in bad {
        let calls = Arc::new(AtomicUsize::new(0));
        let err = KeywordSpotter::new(&config, Some(wake_models(vec![0.0], calls)))
            .err()
            .expect("invalid configuration");
        assert_eq!(err.kind(), "invalid_configuration");
    }

    // detect model of the wrong width
    let detect = FnModel::constant(ModelSignature::new([8], [2]), 0.0);
    let err = KeywordSpotter::new(&small_config(), Some(models_with_detect(detect)))
        .err()
        .expect("shape mismatch");
    assert_eq!(err.kind(), "invalid_configuration");
}
