//! Engine configuration and the buffer geometry derived from it.
//!
//! `EngineConfig` is plain serde data (camelCase JSON, every field optional).
//! Nothing is sized from it directly: `EngineConfig::geometry()` validates the
//! whole configuration once and returns a `PipelineGeometry` with every
//! window length in samples or frames. Construction of any pipeline stage
//! goes through that value, so a bad configuration fails before any buffer
//! is allocated.

use serde::{Deserialize, Serialize};

use crate::{
    error::{KeyspotError, Result},
    signal::WindowKind,
};

const SUPPORTED_SAMPLE_RATES: [u32; 4] = [8_000, 16_000, 32_000, 48_000];
const SUPPORTED_FRAME_WIDTHS: [u32; 3] = [10, 20, 30];

/// Value written into the encode window whenever it is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodeFill {
    /// `0.0`
    Zero,
    /// `-1.0`
    Sentinel,
}

impl EncodeFill {
    pub fn value(self) -> f32 {
        match self {
            EncodeFill::Zero => 0.0,
            EncodeFill::Sentinel => -1.0,
        }
    }
}

fn default_smooth_length_ms() -> u32 {
    300
}

fn default_phrase_length_ms() -> u32 {
    500
}

fn default_keyword_threshold() -> f32 {
    0.5
}

/// Which detection strategy drives activation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RecognizerKind {
    /// Single wake posterior compared against `wakeThreshold`.
    #[default]
    Wakeword,
    /// Per-keyword posteriors smoothed and matched against keyword phrases.
    #[serde(rename_all = "camelCase")]
    Phrase {
        keywords: Vec<String>,
        /// Space-separated keyword sequences, e.g. `"up dog"`.
        phrases: Vec<String>,
        #[serde(default = "default_smooth_length_ms")]
        smooth_length_ms: u32,
        #[serde(default = "default_phrase_length_ms")]
        phrase_length_ms: u32,
    },
    /// Command classification over a whole activation.
    #[serde(rename_all = "camelCase")]
    Keyword {
        classes: Vec<String>,
        #[serde(default = "default_keyword_threshold")]
        threshold: f32,
    },
    /// Activate on any speech.
    VadTrigger,
}

impl RecognizerKind {
    /// Default encode-window fill for this recognizer.
    pub fn default_encode_fill(&self) -> EncodeFill {
        match self {
            RecognizerKind::Keyword { .. } => EncodeFill::Sentinel,
            _ => EncodeFill::Zero,
        }
    }

    pub fn uses_models(&self) -> bool {
        !matches!(self, RecognizerKind::VadTrigger)
    }
}

/// Configuration for `KeyspotEngine` and `KeywordSpotter`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Sample rate of incoming audio (Hz). Default: 16000.
    pub sample_rate: u32,
    /// Width of each audio frame (ms). One of 10, 20, 30. Default: 20.
    pub frame_width_ms: u32,
    /// FFT window size in samples, a power of two. Default: 512.
    pub fft_window_size: usize,
    pub fft_window_type: WindowKind,
    /// Hop between successive analysis windows (ms). Default: 10.
    pub fft_hop_length_ms: u32,
    /// Length of the mel-frame window (ms). Default: 10.
    pub mel_frame_length_ms: u32,
    /// Values per mel frame (filter model output). Default: 40.
    pub mel_frame_width: usize,
    /// Length of the encode window (ms). Default: 1000.
    pub encode_length_ms: u32,
    /// Values per encoded frame. Default: 128.
    pub encode_width: usize,
    /// Encoder hidden-state length. Default: 128.
    pub state_width: usize,
    /// `None` uses the recognizer's conventional fill.
    pub encode_fill: Option<EncodeFill>,
    /// Target RMS of normalized speech. Default: 0.08.
    pub rms_target: f32,
    /// EWMA weight of the current frame's RMS. Default: 0.1.
    pub rms_alpha: f32,
    /// Pre-emphasis coefficient. Default: 0.97.
    pub pre_emphasis: f32,
    /// Wake posterior threshold in [0, 1]. Default: 0.9.
    pub wake_threshold: f32,
    /// Minimum activation length (ms). Default: 2000.
    pub wake_active_min_ms: u32,
    /// Maximum activation length (ms). Default: 5000.
    pub wake_active_max_ms: u32,
    pub recognizer: RecognizerKind,
    /// `EnergyVad` RMS threshold. Default: 0.02.
    pub vad_threshold: f32,
    /// `EnergyVad` hangover in frames. Default: 8.
    pub vad_hangover_frames: u32,
    /// Depth of the producer → worker frame queue, in frames. Default: 50.
    pub queue_frames: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_width_ms: 20,
            fft_window_size: 512,
            fft_window_type: WindowKind::Hann,
            fft_hop_length_ms: 10,
            mel_frame_length_ms: 10,
            mel_frame_width: 40,
            encode_length_ms: 1_000,
            encode_width: 128,
            state_width: 128,
            encode_fill: None,
            rms_target: 0.08,
            rms_alpha: 0.1,
            pre_emphasis: 0.97,
            wake_threshold: 0.9,
            wake_active_min_ms: 2_000,
            wake_active_max_ms: 5_000,
            recognizer: RecognizerKind::Wakeword,
            vad_threshold: 0.02,
            vad_hangover_frames: 8,
            queue_frames: 50,
        }
    }
}

/// Validated sizes of every pipeline buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineGeometry {
    pub sample_rate: u32,
    pub frame_samples: usize,
    pub fft_size: usize,
    pub window_kind: WindowKind,
    pub hop_samples: usize,
    /// `fft_size / 2 + 1`
    pub spectrum_bins: usize,
    pub mel_width: usize,
    pub mel_frames: usize,
    pub encode_width: usize,
    pub encode_frames: usize,
    pub state_width: usize,
    pub encode_fill: f32,
    pub rms_target: f32,
    pub rms_alpha: f32,
    pub pre_emphasis: f32,
    pub wake_threshold: f32,
    pub min_active_frames: usize,
    pub max_active_frames: usize,
    pub queue_frames: usize,
}

impl PipelineGeometry {
    /// Number of whole audio frames covering `ms` milliseconds.
    ///
    /// Posterior windows are sized with this: the classifier runs once per
    /// frame, not once per hop.
    pub fn frames_for_ms(&self, ms: u32) -> usize {
        ms as usize * self.sample_rate as usize / 1000 / self.frame_samples
    }
}

impl EngineConfig {
    /// Parse a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| KeyspotError::config(e.to_string()))
    }

    pub fn encode_fill(&self) -> EncodeFill {
        self.encode_fill
            .unwrap_or_else(|| self.recognizer.default_encode_fill())
    }

    /// Validate the configuration and derive all buffer sizes.
    ///
    /// # Errors
    /// `InvalidConfiguration` describing the first problem found.
    pub fn geometry(&self) -> Result<PipelineGeometry> {
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(KeyspotError::config(format!(
                "unsupported sample rate {} Hz",
                self.sample_rate
            )));
        }
        if !SUPPORTED_FRAME_WIDTHS.contains(&self.frame_width_ms) {
            return Err(KeyspotError::config(format!(
                "unsupported frame width {} ms",
                self.frame_width_ms
            )));
        }
        if self.fft_window_size < 2 || !self.fft_window_size.is_power_of_two() {
            return Err(KeyspotError::config(format!(
                "FFT window size {} is not a power of two",
                self.fft_window_size
            )));
        }

        let rate = self.sample_rate as usize;
        let hop_samples = self.fft_hop_length_ms as usize * rate / 1000;
        if hop_samples == 0 {
            return Err(KeyspotError::config("FFT hop length must be non-zero"));
        }
        if hop_samples > self.fft_window_size {
            return Err(KeyspotError::config(format!(
                "FFT hop of {hop_samples} samples exceeds the {}-sample window",
                self.fft_window_size
            )));
        }

        let mel_frames = self.mel_frame_length_ms as usize * rate / 1000 / hop_samples;
        let encode_frames = self.encode_length_ms as usize * rate / 1000 / hop_samples;
        for (name, value) in [
            ("mel frame length", mel_frames),
            ("mel frame width", self.mel_frame_width),
            ("encode length", encode_frames),
            ("encode width", self.encode_width),
            ("state width", self.state_width),
            ("queue depth", self.queue_frames),
        ] {
            if value == 0 {
                return Err(KeyspotError::config(format!("{name} derives to zero")));
            }
        }

        if self.wake_active_min_ms > self.wake_active_max_ms {
            return Err(KeyspotError::config(format!(
                "minimum activation {} ms exceeds maximum {} ms",
                self.wake_active_min_ms, self.wake_active_max_ms
            )));
        }
        check_unit_interval("wake threshold", self.wake_threshold)?;
        check_unit_interval("rms alpha", self.rms_alpha)?;
        if self.rms_target.is_nan() || self.rms_target <= 0.0 {
            return Err(KeyspotError::config("rms target must be positive"));
        }

        let geometry = PipelineGeometry {
            sample_rate: self.sample_rate,
            frame_samples: self.frame_width_ms as usize * rate / 1000,
            fft_size: self.fft_window_size,
            window_kind: self.fft_window_type,
            hop_samples,
            spectrum_bins: self.fft_window_size / 2 + 1,
            mel_width: self.mel_frame_width,
            mel_frames,
            encode_width: self.encode_width,
            encode_frames,
            state_width: self.state_width,
            encode_fill: self.encode_fill().value(),
            rms_target: self.rms_target,
            rms_alpha: self.rms_alpha,
            pre_emphasis: self.pre_emphasis,
            wake_threshold: self.wake_threshold,
            min_active_frames: (self.wake_active_min_ms / self.frame_width_ms) as usize,
            max_active_frames: (self.wake_active_max_ms / self.frame_width_ms) as usize,
            queue_frames: self.queue_frames,
        };

        self.validate_recognizer(&geometry)?;
        Ok(geometry)
    }

    fn validate_recognizer(&self, geometry: &PipelineGeometry) -> Result<()> {
        match &self.recognizer {
            RecognizerKind::Wakeword | RecognizerKind::VadTrigger => Ok(()),
            RecognizerKind::Phrase {
                keywords,
                phrases,
                smooth_length_ms,
                phrase_length_ms,
            } => {
                if keywords.is_empty() {
                    return Err(KeyspotError::config("phrase recognizer needs keywords"));
                }
                if phrases.is_empty() {
                    return Err(KeyspotError::config("phrase recognizer needs phrases"));
                }
                for phrase in phrases {
                    if phrase.split_whitespace().next().is_none() {
                        return Err(KeyspotError::config("empty phrase"));
                    }
                    if let Some(unknown) = phrase
                        .split_whitespace()
                        .find(|word| !keywords.iter().any(|k| k == word))
                    {
                        return Err(KeyspotError::config(format!(
                            "phrase \"{phrase}\" uses unknown keyword \"{unknown}\""
                        )));
                    }
                }
                if geometry.frames_for_ms(*smooth_length_ms) == 0 {
                    return Err(KeyspotError::config("smoothing length derives to zero"));
                }
                if geometry.frames_for_ms(*phrase_length_ms) == 0 {
                    return Err(KeyspotError::config("phrase length derives to zero"));
                }
                Ok(())
            }
            RecognizerKind::Keyword { classes, threshold } => {
                if classes.is_empty() {
                    return Err(KeyspotError::config("keyword recognizer needs classes"));
                }
                check_unit_interval("keyword threshold", *threshold)
            }
        }
    }
}

fn check_unit_interval(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(KeyspotError::config(format!(
            "{name} {value} is outside [0, 1]"
        )));
    }
    Ok(())
}

/// Split a comma-separated keyword list (`"up,dog"`).
pub fn parse_keyword_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a comma-separated list of space-separated phrases
/// (`"up dog,dog dog"`), normalizing inner whitespace.
pub fn parse_phrase_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty())
        .collect()
}
