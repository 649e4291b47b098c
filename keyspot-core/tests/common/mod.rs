//! Shared fixtures: a small geometry where every 20 ms frame completes at
//! least one FFT hop, and closure-backed models sized for it.

#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use keyspot_core::{EngineConfig, FnModel, ModelSet, ModelSignature};

pub const FRAME_SAMPLES: usize = 320;

/// 16 kHz, 20 ms frames, 256-point FFT with a 10 ms hop, one 4-wide mel
/// frame, a 4-frame × 2-wide encode window and a 2-wide encoder state.
/// Activations last at least 2 and at most 5 frames.
pub fn small_config() -> EngineConfig {
    EngineConfig {
        fft_window_size: 256,
        mel_frame_width: 4,
        encode_length_ms: 40,
        encode_width: 2,
        state_width: 2,
        wake_active_min_ms: 40,
        wake_active_max_ms: 100,
        ..EngineConfig::default()
    }
}

/// Filter and encode models for `small_config()` around `detect`.
pub fn models_with_detect(detect: FnModel) -> ModelSet {
    let filter = FnModel::constant(ModelSignature::new([129], [4]), 0.5);
    let encode = FnModel::constant(ModelSignature::new([4, 2], [2, 2]), 0.1);
    ModelSet::new(filter, encode, detect)
}

/// Wake models whose n-th detect call returns `script[n]` (0.0 past the end).
pub fn wake_models(script: Vec<f32>, calls: Arc<AtomicUsize>) -> ModelSet {
    let detect = FnModel::new(ModelSignature::new([8], [1]), move |_| {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![vec![script.get(n).copied().unwrap_or(0.0)]])
    });
    models_with_detect(detect)
}

pub fn speech_frame() -> Vec<i16> {
    (0..FRAME_SAMPLES)
        .map(|i| if i % 2 == 0 { 3_000 } else { -3_000 })
        .collect()
}

pub fn silent_frame() -> Vec<i16> {
    vec![0; FRAME_SAMPLES]
}
