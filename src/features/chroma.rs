//! Chroma profile and key detection
//!
//! STFT chroma: every bin inside the configured pitch range is assigned to
//! its nearest equal-tempered pitch class and its power is folded into one
//! of 12 bins. Each frame is max-normalized before averaging over time.
//!
//! Key detection is a deliberately simple proxy, not harmonic analysis:
//! the root is the strongest chroma bin (lowest index on a tie) and the mode
//! is major exactly when the root is stronger than the bin a minor third
//! above it (`(root + 3) % 12`), minor otherwise.

use crate::config::ChromaConfig;
use crate::features::{Key, Mode, PitchClass};

/// Pitch class of a frequency, relative to the tuning reference for A
///
/// Returns `None` for non-positive frequencies.
pub fn pitch_class_of(frequency: f32, tuning_hz: f32) -> Option<usize> {
    if frequency <= 0.0 || tuning_hz <= 0.0 {
        return None;
    }
    let semitones_from_a = (12.0 * (frequency / tuning_hz).log2()).round() as i64;
    Some((semitones_from_a + 9).rem_euclid(12) as usize)
}

/// Time-averaged chroma profile
///
/// # Arguments
/// * `magnitudes` - Magnitude spectrogram, one vector per frame
/// * `frequencies` - Center frequency of every bin
/// * `config` - Pitch range and tuning
pub fn chroma_profile(
    magnitudes: &[Vec<f32>],
    frequencies: &[f32],
    config: &ChromaConfig,
) -> [f32; 12] {
    let classes: Vec<Option<usize>> = frequencies
        .iter()
        .map(|&f| {
            if f >= config.min_hz && f <= config.max_hz {
                pitch_class_of(f, config.tuning_hz)
            } else {
                None
            }
        })
        .collect();

    let mut profile = [0.0f32; 12];
    if magnitudes.is_empty() {
        return profile;
    }

    for frame in magnitudes {
        let mut bins = [0.0f32; 12];
        for (&mag, class) in frame.iter().zip(&classes) {
            if let Some(pc) = class {
                bins[*pc] += mag * mag;
            }
        }

        let peak = bins.iter().copied().fold(0.0f32, f32::max);
        if peak > 0.0 {
            for (acc, value) in profile.iter_mut().zip(bins) {
                *acc += value / peak;
            }
        }
    }

    let frames = magnitudes.len() as f32;
    profile.iter_mut().for_each(|v| *v /= frames);
    profile
}

/// Root and mode from a chroma profile
pub fn detect_key(profile: &[f32; 12]) -> Key {
    let mut root = 0;
    for (index, &value) in profile.iter().enumerate() {
        if value > profile[root] {
            root = index;
        }
    }

    let mode = if profile[root] > profile[(root + 3) % 12] {
        Mode::Major
    } else {
        Mode::Minor
    };

    Key {
        root: PitchClass::from_index(root),
        mode,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(440.0, 9 ; "a4")]
    #[test_case(261.63, 0 ; "middle c")]
    #[test_case(277.18, 1 ; "c sharp")]
    #[test_case(123.47, 11 ; "b2")]
    #[test_case(880.0, 9 ; "a5 folds onto a")]
    fn test_pitch_class_of(frequency: f32, expected: usize) {
        assert_eq!(pitch_class_of(frequency, 440.0), Some(expected));
    }

    #[test]
    fn test_pitch_class_of_rejects_zero() {
        assert_eq!(pitch_class_of(0.0, 440.0), None);
    }

    #[test]
    fn test_silent_profile_is_c_minor() {
        let profile = [0.0f32; 12];
        assert_eq!(detect_key(&profile).to_string(), "C minor");
    }

    #[test]
    fn test_mode_compares_minor_third() {
        let mut profile = [0.1f32; 12];
        profile[7] = 1.0; // G
        profile[10] = 0.5; // A#
        assert_eq!(detect_key(&profile).to_string(), "G major");

        profile[10] = 1.0;
        // Tie on the root goes to the lower index, and root == root+3 is minor
        assert_eq!(detect_key(&profile).to_string(), "G minor");
    }

    #[test]
    fn test_profile_is_normalized_per_frame() {
        let config = ChromaConfig::default();
        let frequencies = vec![0.0, 220.0, 261.63, 5000.0];
        let frames = vec![vec![0.0, 4.0, 2.0, 9.0], vec![0.0, 1.0, 0.0, 9.0]];

        let profile = chroma_profile(&frames, &frequencies, &config);
        // A is the maximum in both frames
        assert!((profile[9] - 1.0).abs() < 1e-6);
        // C is 4/16 of A in the first frame, absent in the second
        assert!((profile[0] - 0.125).abs() < 1e-6);
        // 5 kHz lies above the chroma range
        assert_eq!(profile.iter().filter(|&&v| v > 0.0).count(), 2);
    }
}
