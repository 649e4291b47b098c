//! Real-input magnitude spectrum built on `rustfft`.

use std::sync::Arc;

use rustfft::{num_complex::Complex, FftPlanner};

use crate::error::{KeyspotError, Result};

/// Forward FFT of a fixed size `N` producing `N/2 + 1` magnitude bins.
///
/// `spectrum[i] == |X[i]|` for bins `0..=N/2`. The DC and Nyquist bins of a
/// real input are purely real, so their magnitude is just the absolute value
/// of that component.
pub struct SpectrumAnalyzer {
    size: usize,
    fft: Arc<dyn rustfft::Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    /// # Errors
    /// `InvalidConfiguration` unless `size` is a power of two and at least 2.
    pub fn new(size: usize) -> Result<Self> {
        if size < 2 || !size.is_power_of_two() {
            return Err(KeyspotError::config(format!(
                "FFT size must be a power of two >= 2, got {size}"
            )));
        }
        let fft = FftPlanner::<f32>::new().plan_fft_forward(size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Ok(Self {
            size,
            fft,
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of output bins (`N/2 + 1`).
    pub fn bins(&self) -> usize {
        self.size / 2 + 1
    }

    /// Transform `input` (exactly `N` real samples) into `out` (`N/2 + 1`).
    pub fn magnitudes(&mut self, input: &[f32], out: &mut [f32]) {
        debug_assert_eq!(input.len(), self.size);
        debug_assert_eq!(out.len(), self.bins());

        for (slot, &x) in self.buffer.iter_mut().zip(input) {
            *slot = Complex::new(x, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        let nyquist = self.size / 2;
        out[0] = self.buffer[0].re.abs();
        for i in 1..nyquist {
            out[i] = self.buffer[i].norm();
        }
        out[nyquist] = self.buffer[nyquist].re.abs();
    }
}
