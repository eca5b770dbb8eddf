//! Vocal/Instrumental Separation
//!
//! Unsupervised repeating-pattern separation (REPET-SIM). The accompaniment
//! of most songs repeats, while the lead vocal is the least repetitive part
//! of the spectrogram. For every frame we find the most similar frames
//! elsewhere in the recording, take their per-bin median as the repeating
//! background, and derive a soft mask from how far each bin rises above that
//! background.
//!
//! The estimate is a heuristic; separation quality depends on how much the
//! backing actually repeats. Recordings without repetition come back almost
//! entirely as instrumental.

use tracing::debug;

use crate::config::{AnalysisConfig, SeparationConfig};
use crate::dsp::{Spectrogram, Stft};
use crate::engine::{AudioBuffer, SeparatedAudio};
use crate::error::{Result, SongscopeError};

/// Mask denominators below this are treated as empty bins
const MASK_FLOOR: f32 = 1e-12;

/// Soft vocal mask value for one time-frequency bin
///
/// `magnitude` is the mixture magnitude and `background` the repeating
/// estimate (at most `magnitude`). The result is in `[0, 1]`; bins where both
/// the vocal excess and the background vanish are assigned to the
/// accompaniment.
///
/// # Arguments
/// * `magnitude` - Mixture magnitude |X|
/// * `background` - Repeating background estimate
/// * `margin` - Background gain; larger values make the vocal mask stricter
/// * `power` - Mask sharpness
pub fn soft_mask(magnitude: f32, background: f32, margin: f32, power: f32) -> f32 {
    let excess = (magnitude - background).max(0.0);
    let vocal = excess.powf(power);
    let backing = (margin * background.max(0.0)).powf(power);
    let denom = vocal + backing;

    if !denom.is_finite() || denom <= MASK_FLOOR {
        return 0.0;
    }
    (vocal / denom).clamp(0.0, 1.0)
}

// ============================================================================
// Separator
// ============================================================================

/// Vocal/Instrumental Separator stage
#[derive(Debug, Clone)]
pub struct Separator {
    stft: Stft,
    config: SeparationConfig,
}

impl Separator {
    /// Create a separator using the analysis window, hop and separation
    /// settings of `config`
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self {
            stft: Stft::new(config.frame_size, config.hop_length)?,
            config: config.separation.clone(),
        })
    }

    /// Shortest buffer the separator accepts: one full analysis window
    pub fn min_samples(&self) -> usize {
        self.stft.frame_size()
    }

    /// Split a buffer into vocal and instrumental estimates
    ///
    /// Both outputs have the sample rate and exact length of the input, and
    /// sum back to the input up to transform precision.
    ///
    /// # Errors
    /// * `Separation` - if the buffer is shorter than one analysis window or
    ///   the reconstruction is not finite
    pub fn separate(&self, buffer: &AudioBuffer) -> Result<SeparatedAudio> {
        if buffer.len() < self.min_samples() {
            return Err(SongscopeError::Separation {
                reason: format!(
                    "buffer has {} samples, at least {} (one analysis window) are required",
                    buffer.len(),
                    self.min_samples()
                ),
            });
        }

        let spectrogram = self.stft.forward(buffer.samples());
        let vocal_mask = self.vocal_mask(&spectrogram, buffer.sample_rate());
        let backing_mask: Vec<Vec<f32>> = vocal_mask
            .iter()
            .map(|frame| frame.iter().map(|m| 1.0 - m).collect())
            .collect();

        let vocals = self.reconstruct(&spectrogram.masked(&vocal_mask), buffer)?;
        let instrumental = self.reconstruct(&spectrogram.masked(&backing_mask), buffer)?;

        debug!(
            frames = spectrogram.num_frames(),
            vocal_rms = vocals.rms(),
            instrumental_rms = instrumental.rms(),
            "Separation complete"
        );

        Ok(SeparatedAudio {
            vocals,
            instrumental,
        })
    }

    /// Soft vocal mask for every bin of `spectrogram`
    pub fn vocal_mask(&self, spectrogram: &Spectrogram, sample_rate: u32) -> Vec<Vec<f32>> {
        let magnitudes = spectrogram.magnitudes();
        let background = self.repeating_background(&magnitudes, sample_rate);

        magnitudes
            .iter()
            .zip(&background)
            .map(|(mags, bg)| {
                mags.iter()
                    .zip(bg)
                    .map(|(&m, &b)| soft_mask(m, b, self.config.mask_margin, self.config.mask_power))
                    .collect()
            })
            .collect()
    }

    /// Repeating background magnitude, clipped to the mixture
    fn repeating_background(&self, magnitudes: &[Vec<f32>], sample_rate: u32) -> Vec<Vec<f32>> {
        let frame_rate = sample_rate as f32 / self.stft.hop_length() as f32;
        let min_lag = (self.config.min_separation_secs * frame_rate).round().max(1.0) as usize;
        let max_lag = (self.config.max_search_secs * frame_rate).round() as usize;

        let pooled = pool_bands(magnitudes, self.config.similarity_bands);
        let num_frames = magnitudes.len();
        let mut without_neighbors = 0usize;
        let mut column = Vec::with_capacity(self.config.neighbors);

        let background = (0..num_frames)
            .map(|i| {
                let neighbors = nearest_frames(&pooled, i, min_lag, max_lag, self.config.neighbors);
                if neighbors.is_empty() {
                    without_neighbors += 1;
                    return magnitudes[i].clone();
                }

                magnitudes[i]
                    .iter()
                    .enumerate()
                    .map(|(bin, &mag)| {
                        column.clear();
                        column.extend(neighbors.iter().map(|&j| magnitudes[j][bin]));
                        median(&mut column).min(mag)
                    })
                    .collect()
            })
            .collect();

        debug!(
            num_frames,
            min_lag,
            max_lag,
            without_neighbors,
            "Repeating background estimated"
        );

        background
    }

    fn reconstruct(&self, spectrogram: &Spectrogram, source: &AudioBuffer) -> Result<AudioBuffer> {
        let samples = self
            .stft
            .inverse(spectrogram, source.len())
            .map_err(|e| SongscopeError::Separation {
                reason: format!("inverse transform failed: {}", e),
            })?;

        if samples.iter().any(|s| !s.is_finite()) {
            return Err(SongscopeError::Separation {
                reason: "reconstruction produced non-finite samples".to_string(),
            });
        }

        AudioBuffer::new(samples, source.sample_rate()).map_err(|e| SongscopeError::Separation {
            reason: e.to_string(),
        })
    }
}

// ============================================================================
// Internal helper functions
// ============================================================================

/// Pool bins into `bands` contiguous bands and unit-normalize each frame
///
/// Silent frames stay all-zero and are dissimilar to everything.
fn pool_bands(magnitudes: &[Vec<f32>], bands: usize) -> Vec<Vec<f32>> {
    magnitudes
        .iter()
        .map(|frame| {
            let bands = bands.clamp(1, frame.len().max(1));
            let mut pooled = vec![0.0f32; bands];
            for (bin, &mag) in frame.iter().enumerate() {
                pooled[bin * bands / frame.len()] += mag;
            }

            let norm = pooled.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                pooled.iter_mut().for_each(|v| *v /= norm);
            }
            pooled
        })
        .collect()
}

/// Indices of the `k` frames most similar to `frame` within the lag window
///
/// Ties are broken by the lower frame index so the selection is stable.
fn nearest_frames(
    pooled: &[Vec<f32>],
    frame: usize,
    min_lag: usize,
    max_lag: usize,
    k: usize,
) -> Vec<usize> {
    if min_lag > max_lag {
        return Vec::new();
    }

    let lo = frame.saturating_sub(max_lag);
    let hi = (frame + max_lag).min(pooled.len().saturating_sub(1));
    let target = &pooled[frame];

    let mut scored: Vec<(f32, usize)> = (lo..=hi)
        .filter(|&j| frame.abs_diff(j) >= min_lag)
        .map(|j| {
            let similarity: f32 = target.iter().zip(&pooled[j]).map(|(a, b)| a * b).sum();
            (similarity, j)
        })
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.truncate(k);
    scored.into_iter().map(|(_, j)| j).collect()
}

/// Median of a non-empty slice; even lengths average the two middle values
fn median(values: &mut [f32]) -> f32 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        0.5 * (values[mid - 1] + values[mid])
    } else {
        values[mid]
    }
}

// ============================================================================
// Tests
// ============================================================================
