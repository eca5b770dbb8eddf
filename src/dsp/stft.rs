//! Short-time Fourier transform
//!
//! Frames are centered: the signal is zero-padded by half a window on both
//! sides so frame `t` is centered on sample `t * hop`. The inverse uses
//! weighted overlap-add with squared-window normalization and trims back to
//! the requested length, which reconstructs the input exactly whenever the
//! hop is at most half the window.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::{Result, SongscopeError};

/// Window sums below this are treated as uncovered during overlap-add
const WINDOW_SUM_FLOOR: f32 = 1e-8;

/// Periodic Hann window
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Number of centered frames for a signal of `len` samples
#[inline]
pub fn frame_count(len: usize, hop_length: usize) -> usize {
    1 + len / hop_length
}

/// Per-frame RMS over centered, zero-padded frames
///
/// Frames line up with the STFT frames produced by [`Stft::forward`].
pub fn frame_rms(samples: &[f32], frame_size: usize, hop_length: usize) -> Vec<f32> {
    let pad = frame_size / 2;
    let len = samples.len();

    (0..frame_count(len, hop_length))
        .map(|frame| {
            let start = (frame * hop_length) as isize - pad as isize;
            let sum_squares: f64 = (0..frame_size)
                .filter_map(|i| {
                    let idx = start + i as isize;
                    if idx >= 0 && (idx as usize) < len {
                        Some(samples[idx as usize] as f64)
                    } else {
                        None
                    }
                })
                .map(|s| s * s)
                .sum();
            (sum_squares / frame_size as f64).sqrt() as f32
        })
        .collect()
}

// ============================================================================
// Spectrogram
// ============================================================================

/// Complex spectrogram, `frames[t][bin]` with bins `0..=frame_size / 2`
#[derive(Debug, Clone)]
pub struct Spectrogram {
    frames: Vec<Vec<Complex<f32>>>,
    frame_size: usize,
    hop_length: usize,
}

impl Spectrogram {
    /// Number of time frames
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Number of frequency bins per frame
    pub fn num_bins(&self) -> usize {
        self.frame_size / 2 + 1
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Center frequency of `bin` in Hz
    #[inline]
    pub fn bin_frequency(&self, bin: usize, sample_rate: u32) -> f32 {
        bin as f32 * sample_rate as f32 / self.frame_size as f32
    }

    /// Magnitude spectrogram with the same layout as the complex frames
    pub fn magnitudes(&self) -> Vec<Vec<f32>> {
        self.frames
            .iter()
            .map(|frame| frame.iter().map(|c| c.norm()).collect())
            .collect()
    }

    /// Multiply every bin by the matching mask value
    ///
    /// `mask` must have the same shape as [`Spectrogram::magnitudes`].
    pub fn masked(&self, mask: &[Vec<f32>]) -> Spectrogram {
        let frames = self
            .frames
            .iter()
            .zip(mask)
            .map(|(frame, gains)| frame.iter().zip(gains).map(|(c, &g)| *c * g).collect())
            .collect();

        Spectrogram {
            frames,
            frame_size: self.frame_size,
            hop_length: self.hop_length,
        }
    }
}

// ============================================================================
// STFT
// ============================================================================

/// Planned forward/inverse transform for one window and hop size
///
/// Plans are shared behind `Arc`, so a single `Stft` can serve concurrent
/// analyses.
#[derive(Clone)]
pub struct Stft {
    frame_size: usize,
    hop_length: usize,
    window: Vec<f32>,
    fft_forward: Arc<dyn Fft<f32>>,
    fft_inverse: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for Stft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stft")
            .field("frame_size", &self.frame_size)
            .field("hop_length", &self.hop_length)
            .finish()
    }
}

impl Stft {
    /// Plan a transform
    ///
    /// # Errors
    /// * `InvalidConfig` - if the frame size is below 2 or the hop is zero
    ///   or larger than the frame
    pub fn new(frame_size: usize, hop_length: usize) -> Result<Self> {
        if frame_size < 2 {
            return Err(SongscopeError::InvalidConfig {
                reason: format!("frame size {} is too small", frame_size),
            });
        }
        if hop_length == 0 || hop_length > frame_size {
            return Err(SongscopeError::InvalidConfig {
                reason: format!(
                    "hop length {} must be in 1..={}",
                    hop_length, frame_size
                ),
            });
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft_forward = planner.plan_fft_forward(frame_size);
        let fft_inverse = planner.plan_fft_inverse(frame_size);

        Ok(Self {
            frame_size,
            hop_length,
            window: hann_window(frame_size),
            fft_forward,
            fft_inverse,
        })
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Analysis window
    pub fn window(&self) -> &[f32] {
        &self.window
    }

    /// Forward transform of a mono signal
    pub fn forward(&self, samples: &[f32]) -> Spectrogram {
        let n = self.frame_size;
        let pad = n / 2;
        let len = samples.len();
        let num_bins = n / 2 + 1;

        let mut buffer = vec![Complex::new(0.0f32, 0.0); n];
        let mut frames = Vec::with_capacity(frame_count(len, self.hop_length));

        for frame in 0..frame_count(len, self.hop_length) {
            let start = (frame * self.hop_length) as isize - pad as isize;

            for (i, slot) in buffer.iter_mut().enumerate() {
                let idx = start + i as isize;
                let sample = if idx >= 0 && (idx as usize) < len {
                    samples[idx as usize]
                } else {
                    0.0
                };
                *slot = Complex::new(sample * self.window[i], 0.0);
            }

            self.fft_forward.process(&mut buffer);
            frames.push(buffer[..num_bins].to_vec());
        }

        Spectrogram {
            frames,
            frame_size: n,
            hop_length: self.hop_length,
        }
    }

    /// Inverse transform, trimmed to `length` samples
    ///
    /// # Errors
    /// * `InvalidConfig` - if the spectrogram was produced with a different
    ///   window or hop size
    pub fn inverse(&self, spectrogram: &Spectrogram, length: usize) -> Result<Vec<f32>> {
        if spectrogram.frame_size != self.frame_size || spectrogram.hop_length != self.hop_length {
            return Err(SongscopeError::InvalidConfig {
                reason: format!(
                    "spectrogram ({}/{}) does not match transform ({}/{})",
                    spectrogram.frame_size, spectrogram.hop_length, self.frame_size, self.hop_length
                ),
            });
        }

        let n = self.frame_size;
        let pad = n / 2;
        let half = n / 2;
        let padded_len = length + 2 * pad;
        let norm = 1.0 / n as f32;

        let mut output = vec![0.0f32; padded_len];
        let mut window_sum = vec![0.0f32; padded_len];
        let mut buffer = vec![Complex::new(0.0f32, 0.0); n];

        for (frame_idx, bins) in spectrogram.frames.iter().enumerate() {
            // Rebuild the Hermitian-symmetric spectrum
            for (k, slot) in buffer.iter_mut().enumerate() {
                *slot = if k <= half { bins[k] } else { bins[n - k].conj() };
            }
            buffer[0].im = 0.0;
            if n % 2 == 0 {
                buffer[half].im = 0.0;
            }

            self.fft_inverse.process(&mut buffer);

            let start = frame_idx * self.hop_length;
            for (i, c) in buffer.iter().enumerate() {
                let pos = start + i;
                if pos >= padded_len {
                    break;
                }
                output[pos] += c.re * norm * self.window[i];
                window_sum[pos] += self.window[i] * self.window[i];
            }
        }

        for (sample, &sum) in output.iter_mut().zip(&window_sum) {
            if sum > WINDOW_SUM_FLOOR {
                *sample /= sum;
            }
        }

        Ok(output[pad..pad + length].to_vec())
    }
}

// ============================================================================
// Tests
// ============================================================================
