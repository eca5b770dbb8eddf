//! Tempo estimation
//!
//! Global tempo from the autocorrelation of a spectral-flux onset envelope.
//! Only a single BPM value is produced, not a beat grid. Octave errors
//! (half or double tempo) are possible on ambiguous material; the log-normal
//! prior around the start tempo decides between them.

use crate::config::TempoConfig;

/// Onset strength per frame
///
/// Half-wave rectified difference of log-compressed magnitudes, averaged
/// over bins. The first frame has no predecessor and is zero.
pub fn onset_strength(magnitudes: &[Vec<f32>]) -> Vec<f32> {
    let mut onset = Vec::with_capacity(magnitudes.len());
    if magnitudes.is_empty() {
        return onset;
    }
    onset.push(0.0);

    for pair in magnitudes.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        if curr.is_empty() {
            onset.push(0.0);
            continue;
        }
        let flux: f32 = curr
            .iter()
            .zip(prev)
            .map(|(&c, &p)| (c.ln_1p() - p.ln_1p()).max(0.0))
            .sum();
        onset.push(flux / curr.len() as f32);
    }

    onset
}

/// Log-normal tempo prior centered on `start_bpm`
#[inline]
pub fn tempo_prior(bpm: f32, config: &TempoConfig) -> f32 {
    let octaves = (bpm / config.start_bpm).log2() / config.std_octaves;
    (-0.5 * octaves * octaves).exp()
}

/// Estimate the dominant tempo of an onset envelope
///
/// Picks the lag with the largest prior-weighted autocorrelation inside the
/// configured BPM range and refines it with parabolic interpolation. Returns
/// `start_bpm` when the envelope has no positive periodicity (silence, very
/// short input).
///
/// # Arguments
/// * `onset` - Onset strength per frame
/// * `frame_rate` - Frames per second of the envelope
/// * `config` - BPM range and prior
pub fn estimate_tempo(onset: &[f32], frame_rate: f32, config: &TempoConfig) -> f32 {
    if onset.len() < 3 || frame_rate <= 0.0 {
        return config.start_bpm;
    }

    let min_lag = ((60.0 * frame_rate / config.max_bpm).ceil() as usize).max(1);
    let max_lag = ((60.0 * frame_rate / config.min_bpm).floor() as usize).min(onset.len() - 2);
    if min_lag > max_lag {
        return config.start_bpm;
    }

    let mean = onset.iter().sum::<f32>() / onset.len() as f32;
    let centered: Vec<f32> = onset.iter().map(|&v| v - mean).collect();

    let autocorr = |lag: usize| -> f32 {
        centered
            .iter()
            .zip(&centered[lag..])
            .map(|(a, b)| a * b)
            .sum()
    };

    let mut best: Option<(usize, f32)> = None;
    for lag in min_lag..=max_lag {
        let bpm = 60.0 * frame_rate / lag as f32;
        let score = autocorr(lag) * tempo_prior(bpm, config);
        if score > 0.0 && best.map_or(true, |(_, s)| score > s) {
            best = Some((lag, score));
        }
    }

    let Some((lag, _)) = best else {
        return config.start_bpm;
    };

    let offset = if lag > 1 {
        parabolic_offset(autocorr(lag - 1), autocorr(lag), autocorr(lag + 1))
    } else {
        0.0
    };

    let bpm = 60.0 * frame_rate / (lag as f32 + offset);
    bpm.clamp(config.min_bpm, config.max_bpm)
}

/// Vertex offset of the parabola through three equally spaced points
fn parabolic_offset(left: f32, center: f32, right: f32) -> f32 {
    let denom = left - 2.0 * center + right;
    if denom >= 0.0 {
        return 0.0;
    }
    (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Impulse train with `period` frames between pulses, smeared over a
    /// few frames like a real onset envelope
    fn pulse_train(len: usize, period: f32) -> Vec<f32> {
        let mut onset = vec![0.0; len];
        let mut t = 0.0f32;
        while (t as usize) < len {
            let i = t.round() as usize;
            for (k, weight) in [1.0, 0.6, 0.3].iter().enumerate() {
                if i + k < len {
                    onset[i + k] += weight;
                }
            }
            t += period;
        }
        onset
    }

    #[test]
    fn test_onset_strength_rectifies() {
        let mags = vec![vec![0.0, 0.0], vec![1.0, 1.0], vec![0.0, 0.0]];
        let onset = onset_strength(&mags);
        assert_eq!(onset.len(), 3);
        assert_eq!(onset[0], 0.0);
        assert_relative_eq!(onset[1], 2.0f32.ln());
        assert_eq!(onset[2], 0.0);
    }

    #[test]
    fn test_prior_peaks_at_start_bpm() {
        let config = TempoConfig::default();
        assert_relative_eq!(tempo_prior(120.0, &config), 1.0);
        assert_relative_eq!(tempo_prior(240.0, &config), (-0.5f32).exp(), epsilon = 1e-6);
        assert!(tempo_prior(60.0, &config) < tempo_prior(100.0, &config));
    }

    #[test]
    fn test_pulse_train_at_120_bpm() {
        let frame_rate = 22050.0 / 512.0;
        let period = frame_rate * 0.5;
        let onset = pulse_train(600, period);

        let bpm = estimate_tempo(&onset, frame_rate, &TempoConfig::default());
        assert!((bpm - 120.0).abs() < 5.0, "estimated {} BPM", bpm);
    }

    #[test]
    fn test_pulse_train_at_90_bpm() {
        let frame_rate = 22050.0 / 512.0;
        let period = frame_rate * 60.0 / 90.0;
        let onset = pulse_train(800, period);

        let bpm = estimate_tempo(&onset, frame_rate, &TempoConfig::default());
        assert!((bpm - 90.0).abs() < 5.0, "estimated {} BPM", bpm);
    }

    #[test]
    fn test_flat_envelope_falls_back() {
        let config = TempoConfig::default();
        assert_eq!(estimate_tempo(&vec![0.0; 500], 43.0, &config), config.start_bpm);
        assert_eq!(estimate_tempo(&[1.0], 43.0, &config), config.start_bpm);
    }

    #[test]
    fn test_parabolic_offset() {
        assert_eq!(parabolic_offset(1.0, 2.0, 1.0), 0.0);
        assert!(parabolic_offset(1.5, 2.0, 1.0) < 0.0);
        assert_eq!(parabolic_offset(1.0, 1.0, 1.0), 0.0);
    }
}
