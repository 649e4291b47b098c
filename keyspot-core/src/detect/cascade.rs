use crate::{
    buffering::AudioFrame,
    detect::{Classifier, FeatureTransform, ResetScope, SequenceEncoder},
    engine::config::PipelineGeometry,
    error::Result,
    inference::ModelSet,
    signal::{SignalNormalizer, SpectralFrontEnd},
};

/// Front end, filter, encoder and classifier wired in sequence.
///
/// Every completed hop runs filter then encode; the classifier runs at most
/// once per frame, after all of that frame's hops, and only if at least one
/// hop was encoded.
pub struct ModelCascade {
    front_end: SpectralFrontEnd,
    features: FeatureTransform,
    encoder: SequenceEncoder,
    classifier: Classifier,
    pending: bool,
}

impl ModelCascade {
    /// Bind `models` to the buffers described by `geometry`.
    ///
    /// `normalizer` is supplied by the caller so recognizers can choose their
    /// own gain policy. `outputs` is the detect model's posterior width.
    ///
    /// # Errors
    /// `InvalidConfiguration` if any model's shapes disagree with `geometry`.
    pub fn new(
        geometry: &PipelineGeometry,
        models: ModelSet,
        normalizer: SignalNormalizer,
        outputs: usize,
    ) -> Result<Self> {
        let ModelSet {
            filter,
            encode,
            detect,
        } = models;
        let front_end = SpectralFrontEnd::new(
            geometry.fft_size,
            geometry.window_kind,
            geometry.hop_samples,
            normalizer,
        )?;
        let features = FeatureTransform::new(
            filter,
            geometry.spectrum_bins,
            geometry.mel_width,
            geometry.mel_frames,
        )?;
        let encoder = SequenceEncoder::new(
            encode,
            geometry.mel_frames * geometry.mel_width,
            geometry.encode_width,
            geometry.encode_frames,
            geometry.state_width,
            geometry.encode_fill,
        )?;
        let classifier = Classifier::new(
            detect,
            geometry.encode_frames * geometry.encode_width,
            outputs,
        )?;
        Ok(Self {
            front_end,
            features,
            encoder,
            classifier,
            pending: false,
        })
    }

    /// Feed one frame through the front end, filter and encoder. Returns the
    /// number of hops encoded.
    pub fn push_frame(&mut self, frame: &AudioFrame, is_speech: bool) -> Result<usize> {
        let Self {
            front_end,
            features,
            encoder,
            ..
        } = self;
        let hops = front_end.process(frame, is_speech, |spectrum| {
            features.push_spectrum(spectrum)?;
            encoder.encode(features.window_mut())
        })?;
        if hops > 0 {
            self.pending = true;
        }
        Ok(hops)
    }

    /// Classify if anything new was encoded since the last call.
    pub fn classify(&mut self) -> Result<Option<&[f32]>> {
        if !self.pending {
            return Ok(None);
        }
        self.pending = false;
        self.classifier.classify(self.encoder.window_mut())
    }

    /// Classify the current encode window regardless of new input.
    pub fn classify_now(&mut self) -> Result<Option<&[f32]>> {
        self.pending = false;
        self.classifier.classify(self.encoder.window_mut())
    }

    pub fn reset(&mut self, scope: ResetScope) {
        self.front_end.reset();
        if scope == ResetScope::Restart {
            self.front_end.reset_signal();
        }
        self.features.reset();
        self.encoder.reset(scope.clears_state());
        self.pending = false;
    }

    #[cfg(test)]
    pub(crate) fn signal_rms(&self) -> f32 {
        self.front_end.rms_value()
    }

    #[cfg(test)]
    pub(crate) fn has_pending_samples(&self) -> bool {
        self.front_end.has_pending_samples()
    }

    /// Copy of the encode window, oldest first, without consuming it.
    #[cfg(test)]
    pub(crate) fn encode_window(&self) -> Vec<f32> {
        let mut window = self.encoder.window().clone();
        let mut out = Vec::new();
        window.rewind().drain_into(&mut out).ok();
        out
    }

    #[cfg(test)]
    pub(crate) fn encode_state(&self) -> Vec<f32> {
        let mut out = Vec::new();
        self.encoder.state().clone().take_into(&mut out).ok();
        out
    }
}
