//! Typed audio frame handed from the frame queue to the VAD and detection stages.

use crate::error::{KeyspotError, Result};

/// One fixed-width block of mono signed 16-bit PCM.
///
/// Built on the worker thread for the current processing step and dropped
/// once the step completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Decode little-endian 16-bit PCM bytes.
    ///
    /// # Errors
    /// `InvalidConfiguration` when `bytes` has an odd length.
    pub fn from_le_bytes(bytes: &[u8], sample_rate: u32) -> Result<Self> {
        if bytes.len() % 2 != 0 {
            return Err(KeyspotError::config(format!(
                "PCM frame has odd byte length {}",
                bytes.len()
            )));
        }
        let samples = bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        Ok(Self::new(samples, sample_rate))
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Root-mean-square level with samples scaled by `i16::MAX`.
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = self
            .samples
            .iter()
            .map(|&s| {
                let x = s as f32 / i16::MAX as f32;
                x * x
            })
            .sum();
        (sum_sq / self.samples.len() as f32).sqrt()
    }
}
