//! DSP Primitives
//!
//! Windowed spectral analysis shared by the separator and feature extractor.

pub mod stft;

pub use stft::{frame_count, frame_rms, hann_window, Spectrogram, Stft};
