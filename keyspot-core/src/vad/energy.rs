//! Energy-based VAD using an RMS threshold and a hangover counter.
//!
//! 1. Compute the RMS of the frame (full scale = 1.0).
//! 2. RMS ≥ `threshold` → `Speech`, reload the hangover counter.
//! 3. Below threshold with hangover left → `Speech`, decrement the counter.
//! 4. Otherwise → `Silence`.

use super::{VadDecision, VoiceActivityDetector};
use crate::buffering::AudioFrame;

#[derive(Debug, Clone)]
pub struct EnergyVad {
    /// Typical range: 0.01–0.05 for a quiet microphone.
    threshold: f32,
    /// Silent frames still reported as speech after real speech ends.
    hangover_frames: u32,
    hangover_counter: u32,
}

impl EnergyVad {
    /// Default: threshold `0.02`, hangover `8` frames (160 ms at 20 ms).
    pub fn new(threshold: f32, hangover_frames: u32) -> Self {
        Self {
            threshold,
            hangover_frames,
            hangover_counter: 0,
        }
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(0.02, 8)
    }
}

impl VoiceActivityDetector for EnergyVad {
    fn classify(&mut self, frame: &AudioFrame) -> VadDecision {
        if frame.rms() >= self.threshold {
            self.hangover_counter = self.hangover_frames;
            VadDecision::Speech
        } else if self.hangover_counter > 0 {
            self.hangover_counter -= 1;
            VadDecision::Speech
        } else {
            VadDecision::Silence
        }
    }

    fn reset(&mut self) {
        self.hangover_counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silent_frame() -> AudioFrame {
        AudioFrame::new(vec![0; 320], 16_000)
    }

    fn loud_frame() -> AudioFrame {
        AudioFrame::new(vec![16_000; 320], 16_000)
    }

    #[test]
    fn silence_below_threshold() {
        let mut vad = EnergyVad::new(0.02, 0);
        assert_eq!(vad.classify(&silent_frame()), VadDecision::Silence);
    }

    #[test]
    fn speech_above_threshold() {
        let mut vad = EnergyVad::new(0.02, 0);
        assert_eq!(vad.classify(&loud_frame()), VadDecision::Speech);
    }

    #[test]
    fn hangover_extends_speech() {
        let mut vad = EnergyVad::new(0.02, 3);
        assert_eq!(vad.classify(&loud_frame()), VadDecision::Speech);
        for _ in 0..3 {
            assert_eq!(vad.classify(&silent_frame()), VadDecision::Speech);
        }
        assert_eq!(vad.classify(&silent_frame()), VadDecision::Silence);
    }

    #[test]
    fn reset_clears_hangover() {
        let mut vad = EnergyVad::new(0.02, 5);
        vad.classify(&loud_frame());
        vad.reset();
        assert_eq!(vad.classify(&silent_frame()), VadDecision::Silence);
    }

    #[test]
    fn empty_frame_is_silence() {
        let mut vad = EnergyVad::default();
        assert_eq!(
            vad.classify(&AudioFrame::new(Vec::new(), 16_000)),
            VadDecision::Silence
        );
    }
}
