//! Analysis window functions.

use serde::{Deserialize, Serialize};

/// Window function applied to each analysis window before the FFT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    #[default]
    Hann,
}

/// Build a window of `len` coefficients.
///
/// Hann: `w[i] = sin²(π·i / (len - 1))`, zero at both ends.
pub fn build_window(kind: WindowKind, len: usize) -> Vec<f32> {
    match kind {
        WindowKind::Hann => build_hann_window(len),
    }
}

fn build_hann_window(len: usize) -> Vec<f32> {
    if len < 2 {
        return vec![1.0; len];
    }
    let denom = (len - 1) as f64;
    (0..len)
        .map(|i| {
            let s = (std::f64::consts::PI * i as f64 / denom).sin();
            (s * s) as f32
        })
        .collect()
}
