//! Stem-based proxies: vocal clarity and instrumental complexity
//!
//! Clarity is the Zwicker-style sharpness of the vocal stem, computed with
//! magnitude standing in for specific loudness. Complexity is the number of
//! spectral peaks per frame in the full mix. Both values are raw here; the
//! extractor divides them by their configured scale and clamps to [0, 1].

/// Sharpness scaling constant (acum)
const SHARPNESS_SCALE: f32 = 0.11;

/// Bark value above which high-band weighting kicks in
const SHARPNESS_WEIGHT_KNEE: f32 = 15.8;

/// Frequency in Hz to the Bark scale (Zwicker & Terhardt)
pub fn hz_to_bark(frequency: f32) -> f32 {
    13.0 * (0.00076 * frequency).atan() + 3.5 * (frequency / 7500.0).powi(2).atan()
}

/// Zwicker high-band weighting g(z)
#[inline]
fn sharpness_weight(bark: f32) -> f32 {
    if bark <= SHARPNESS_WEIGHT_KNEE {
        1.0
    } else {
        0.066 * (0.171 * bark).exp()
    }
}

/// Mean sharpness over non-silent frames of the vocal stem
///
/// A silent stem has zero sharpness.
pub fn vocal_clarity(magnitudes: &[Vec<f32>], frequencies: &[f32]) -> f32 {
    let weights: Vec<(f32, f32)> = frequencies
        .iter()
        .map(|&f| {
            let z = hz_to_bark(f);
            (z, sharpness_weight(z))
        })
        .collect();

    let mut total = 0.0f64;
    let mut voiced_frames = 0usize;

    for frame in magnitudes {
        let loudness: f32 = frame.iter().sum();
        if loudness <= 0.0 {
            continue;
        }

        let weighted: f32 = frame
            .iter()
            .zip(&weights)
            .map(|(&m, &(z, g))| m * g * z)
            .sum();

        total += (SHARPNESS_SCALE * weighted / loudness) as f64;
        voiced_frames += 1;
    }

    if voiced_frames == 0 {
        0.0
    } else {
        (total / voiced_frames as f64) as f32
    }
}

/// Mean number of spectral peaks per frame
///
/// A peak is a local maximum whose amplitude, scaled to full scale by the
/// window gain, exceeds `threshold`.
///
/// # Arguments
/// * `magnitudes` - Magnitude spectrogram of the mix
/// * `window` - Analysis window used for the spectrogram
/// * `threshold` - Minimum linear amplitude of a counted peak
pub fn spectral_complexity(magnitudes: &[Vec<f32>], window: &[f32], threshold: f32) -> f32 {
    if magnitudes.is_empty() {
        return 0.0;
    }

    let window_gain: f32 = window.iter().sum();
    let scale = if window_gain > 0.0 { 2.0 / window_gain } else { 0.0 };

    let total: usize = magnitudes
        .iter()
        .map(|frame| {
            frame
                .windows(3)
                .filter(|w| w[1] > w[0] && w[1] > w[2] && w[1] * scale > threshold)
                .count()
        })
        .sum();

    total as f32 / magnitudes.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn freqs(n: usize, step: f32) -> Vec<f32> {
        (0..n).map(|i| i as f32 * step).collect()
    }

    #[test]
    fn test_hz_to_bark_reference_points() {
        assert_relative_eq!(hz_to_bark(0.0), 0.0);
        // 1 kHz sits near 8.5 Bark
        assert!((hz_to_bark(1000.0) - 8.5).abs() < 0.2);
        assert!(hz_to_bark(10_000.0) > 20.0);
    }

    #[test]
    fn test_brighter_vocal_is_sharper() {
        let f = freqs(512, 21.5);
        let mut low = vec![0.0; 512];
        low[20] = 1.0; // ~430 Hz
        let mut high = vec![0.0; 512];
        high[400] = 1.0; // ~8.6 kHz

        let dull = vocal_clarity(&[low], &f);
        let bright = vocal_clarity(&[high], &f);
        assert!(bright > dull);
    }

    #[test]
    fn test_silent_vocal_has_no_clarity() {
        assert_eq!(vocal_clarity(&[vec![0.0; 64]], &freqs(64, 10.0)), 0.0);
    }

    #[test]
    fn test_spectral_complexity_counts_peaks() {
        let window = vec![1.0; 8]; // gain 8, scale 0.25
        let frame = vec![0.0, 1.0, 0.0, 0.5, 0.0, 0.01, 0.0, 0.0];
        // 0.01 * 0.25 falls below the threshold
        assert_relative_eq!(spectral_complexity(&[frame], &window, 0.005), 2.0);
    }

    #[test]
    fn test_spectral_complexity_averages_frames() {
        let window = vec![1.0; 4];
        let frames = vec![vec![0.0, 1.0, 0.0, 0.0], vec![0.0; 4]];
        assert_relative_eq!(spectral_complexity(&frames, &window, 0.005), 0.5);
    }
}
