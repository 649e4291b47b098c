//! `SpectralFrontEnd`: conditioned samples → overlapping windows → magnitude spectra.

use crate::{
    buffering::{AudioFrame, RingBuffer},
    error::{KeyspotError, Result},
    signal::{build_window, SignalNormalizer, SpectrumAnalyzer, WindowKind},
};

/// Turns audio frames into one magnitude spectrum per hop.
///
/// Samples accumulate in a window-sized ring. When the ring fills, the whole
/// window is read, multiplied by the window function and transformed; the
/// ring is then rewound and advanced by `hop` so the next window overlaps the
/// previous one by `fft_size - hop` samples.
pub struct SpectralFrontEnd {
    normalizer: SignalNormalizer,
    sample_window: RingBuffer<f32>,
    window: Vec<f32>,
    fft: SpectrumAnalyzer,
    hop: usize,
    frame: Vec<f32>,
    spectrum: Vec<f32>,
}

impl SpectralFrontEnd {
    /// # Errors
    /// `InvalidConfiguration` for a bad FFT size or a hop that is zero or
    /// longer than the window.
    pub fn new(
        fft_size: usize,
        window_kind: WindowKind,
        hop: usize,
        normalizer: SignalNormalizer,
    ) -> Result<Self> {
        let fft = SpectrumAnalyzer::new(fft_size)?;
        if hop == 0 || hop > fft_size {
            return Err(KeyspotError::config(format!(
                "hop of {hop} samples must be within 1..={fft_size}"
            )));
        }
        Ok(Self {
            normalizer,
            sample_window: RingBuffer::new(fft_size, 0.0),
            window: build_window(window_kind, fft_size),
            hop,
            frame: vec![0.0; fft_size],
            spectrum: vec![0.0; fft.bins()],
            fft,
        })
    }

    /// Number of magnitude bins per spectrum.
    pub fn bins(&self) -> usize {
        self.spectrum.len()
    }

    /// Samples currently waiting in the analysis window.
    pub fn has_pending_samples(&self) -> bool {
        !self.sample_window.is_empty()
    }

    /// Push one frame through the front end, calling `on_spectrum` once per
    /// completed hop. Returns the number of spectra produced.
    pub fn process<F>(
        &mut self,
        frame: &AudioFrame,
        is_speech: bool,
        mut on_spectrum: F,
    ) -> Result<usize>
    where
        F: FnMut(&[f32]) -> Result<()>,
    {
        self.normalizer.observe(frame, is_speech);

        let mut produced = 0;
        for &raw in frame.samples() {
            let sample = self.normalizer.process(raw);
            self.sample_window.write(sample)?;
            if self.sample_window.is_full() {
                self.analyze()?;
                on_spectrum(&self.spectrum)?;
                produced += 1;
            }
        }
        Ok(produced)
    }

    fn analyze(&mut self) -> Result<()> {
        for (slot, &coef) in self.frame.iter_mut().zip(&self.window) {
            *slot = self.sample_window.read()? * coef;
        }
        self.fft.magnitudes(&self.frame, &mut self.spectrum);
        self.sample_window.rewind().seek(self.hop as isize);
        Ok(())
    }

    /// Drop any partially accumulated window so only contiguous speech is
    /// analysed together. Normalizer state is kept.
    pub fn reset(&mut self) {
        self.sample_window.reset();
    }

    /// Forget the tracked RMS level and pre-emphasis history.
    pub fn reset_signal(&mut self) {
        self.normalizer.reset();
    }

    #[cfg(test)]
    pub(crate) fn rms_value(&self) -> f32 {
        self.normalizer.rms_value()
    }
}
