//! Energy and spectral shape descriptors

use crate::dsp::frame_rms;

/// Mean RMS over centered analysis frames
pub fn mean_rms(samples: &[f32], frame_size: usize, hop_length: usize) -> f32 {
    let rms = frame_rms(samples, frame_size, hop_length);
    mean(&rms)
}

/// Magnitude-weighted mean frequency of one frame; 0 for a silent frame
pub fn centroid(magnitudes: &[f32], frequencies: &[f32]) -> f32 {
    let total: f32 = magnitudes.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }

    let weighted: f32 = magnitudes
        .iter()
        .zip(frequencies)
        .map(|(&m, &f)| m * f)
        .sum();
    weighted / total
}

/// Lowest frequency below which `percent` of the frame's magnitude lies
///
/// Returns 0 for a silent frame.
pub fn rolloff(magnitudes: &[f32], frequencies: &[f32], percent: f32) -> f32 {
    let total: f32 = magnitudes.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }

    let threshold = percent * total;
    let mut cumulative = 0.0f32;
    for (&m, &f) in magnitudes.iter().zip(frequencies) {
        cumulative += m;
        if cumulative >= threshold {
            return f;
        }
    }

    frequencies.last().copied().unwrap_or(0.0)
}

/// Time-averaged spectral centroid
pub fn mean_centroid(magnitudes: &[Vec<f32>], frequencies: &[f32]) -> f32 {
    let per_frame: Vec<f32> = magnitudes
        .iter()
        .map(|frame| centroid(frame, frequencies))
        .collect();
    mean(&per_frame)
}

/// Time-averaged spectral rolloff
pub fn mean_rolloff(magnitudes: &[Vec<f32>], frequencies: &[f32], percent: f32) -> f32 {
    let per_frame: Vec<f32> = magnitudes
        .iter()
        .map(|frame| rolloff(frame, frequencies, percent))
        .collect();
    mean(&per_frame)
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64) as f32
}
