//! Audio Buffer Management
//!
//! Provides the immutable mono buffer that flows through the analysis
//! pipeline, plus level helpers shared by the loader and feature extractor.

use crate::error::{Result, SongscopeError};

// ============================================================================
// Constants
// ============================================================================

/// Default analysis sample rate (22.05kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

/// High-fidelity sample rate used when separation quality matters (44.1kHz)
pub const HIGH_FIDELITY_SAMPLE_RATE: u32 = 44100;

/// Tolerance used when deciding whether a buffer is already peak-normalized
pub const NORMALIZATION_EPSILON: f32 = 1e-6;

// ============================================================================
// Helper Functions
// ============================================================================

/// Calculate the RMS (Root Mean Square) of a slice of samples
///
/// Returns 0.0 for empty input.
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Calculate the peak (maximum absolute value) of a slice of samples
pub fn calculate_peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Immutable mono audio buffer
///
/// Stores 32-bit float samples at a fixed sample rate. Construction checks
/// the invariants every stage relies on: at least one sample, a non-zero
/// sample rate and only finite sample values.
///
/// # Example
/// ```
/// use songscope::engine::AudioBuffer;
///
/// let buffer = AudioBuffer::new(vec![0.0, 0.5, -0.25], 22050).unwrap();
/// assert_eq!(buffer.len(), 3);
/// assert_eq!(buffer.peak(), 0.5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a buffer from mono samples
    ///
    /// # Errors
    /// * `Decode` - if the buffer is empty, the sample rate is zero, or any
    ///   sample is NaN/Infinity
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(SongscopeError::decode("audio contains no samples"));
        }

        if sample_rate == 0 {
            return Err(SongscopeError::decode("sample rate must be greater than zero"));
        }

        if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
            return Err(SongscopeError::decode(format!(
                "non-finite sample value at index {}",
                index
            )));
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create a silent buffer of the given duration
    pub fn silence(duration_secs: f32, sample_rate: u32) -> Result<Self> {
        let num_samples = (duration_secs * sample_rate as f32) as usize;
        Self::new(vec![0.0; num_samples], sample_rate)
    }

    /// Sample data
    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Consume the buffer and return its samples
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples (frames, since the buffer is mono)
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false for a constructed buffer; kept for slice-like ergonomics
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of channels, fixed to mono
    #[inline]
    pub fn channels(&self) -> usize {
        1
    }

    /// Duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    /// Peak absolute amplitude (linear)
    pub fn peak(&self) -> f32 {
        calculate_peak(&self.samples)
    }

    /// RMS level over the whole buffer (linear)
    pub fn rms(&self) -> f32 {
        calculate_rms(&self.samples)
    }

    /// Check whether every sample is exactly zero
    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|&s| s == 0.0)
    }

    /// Return a peak-normalized copy
    ///
    /// The loudest sample is scaled to 1.0. Silent buffers are returned
    /// unchanged, and buffers already at unit peak are not rescaled, so
    /// normalizing twice is a no-op.
    pub fn peak_normalized(self) -> Self {
        let peak = self.peak();
        if peak == 0.0 || (peak - 1.0).abs() <= NORMALIZATION_EPSILON {
            return self;
        }

        let gain = 1.0 / peak;
        let samples = self
            .samples
            .into_iter()
            .map(|s| (s * gain).clamp(-1.0, 1.0))
            .collect();

        Self {
            samples,
            sample_rate: self.sample_rate,
        }
    }
}

// ============================================================================
// Separated Audio
// ============================================================================

/// Vocal and instrumental estimates produced by the separator
///
/// Both buffers share the sample rate and frame count of the source.
#[derive(Debug, Clone)]
pub struct SeparatedAudio {
    /// Estimated vocal (least repetitive) component
    pub vocals: AudioBuffer,
    /// Estimated instrumental (repeating background) component
    pub instrumental: AudioBuffer,
}

impl SeparatedAudio {
    /// Sample rate shared by both stems
    pub fn sample_rate(&self) -> u32 {
        self.vocals.sample_rate()
    }

    /// Frame count shared by both stems
    pub fn len(&self) -> usize {
        self.vocals.len()
    }

    /// Always false for stems built from a valid buffer
    pub fn is_empty(&self) -> bool {
        self.vocals.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
