//! Signal conditioning and short-time spectral analysis.
//!
//! ```text
//! i16 samples → SignalNormalizer (RMS tracking, clip, pre-emphasis)
//!             → sample window (RingBuffer, FFT size)
//!             → window function × samples → SpectrumAnalyzer → N/2+1 magnitudes
//! ```

pub mod fft;
pub mod frontend;
pub mod normalize;
pub mod window;

pub use fft::SpectrumAnalyzer;
pub use frontend::SpectralFrontEnd;
pub use normalize::SignalNormalizer;
pub use window::{build_window, WindowKind};
