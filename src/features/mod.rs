//! Feature Extraction
//!
//! Turns a normalized buffer (and optionally its separated stems) into the
//! numeric and tonal descriptors every downstream stage works from:
//! - Tempo from the autocorrelation of an onset envelope
//! - RMS energy, spectral centroid and rolloff
//! - Key and mode from a 12-bin chroma profile
//! - Vocal clarity and instrumental complexity when stems are supplied
//!
//! Extraction is all-or-nothing: either every value is finite and clamped to
//! its range, or the whole call fails with `FeatureExtraction`.

pub mod chroma;
pub mod spectral;
pub mod stems;
pub mod tempo;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{AnalysisConfig, ChromaConfig, StemConfig, TempoConfig};
use crate::dsp::Stft;
use crate::engine::{AudioBuffer, SeparatedAudio};
use crate::error::{Result, SongscopeError};

/// Rolloff above which the mix is flagged for high-frequency noise (Hz)
pub const HIGH_FREQ_NOISE_ROLLOFF_HZ: f32 = 10_000.0;

// ============================================================================
// Tonal types
// ============================================================================

/// One of the 12 equal-tempered pitch classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C#")]
    CSharp,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "D#")]
    DSharp,
    #[serde(rename = "E")]
    E,
    #[serde(rename = "F")]
    F,
    #[serde(rename = "F#")]
    FSharp,
    #[serde(rename = "G")]
    G,
    #[serde(rename = "G#")]
    GSharp,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A#")]
    ASharp,
    #[serde(rename = "B")]
    B,
}

impl PitchClass {
    /// All pitch classes in chroma order, starting at C
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Pitch class for a chroma index (wraps modulo 12)
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 12]
    }

    /// Chroma index, C = 0
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Pitch class a given number of semitones above this one
    pub fn transpose(&self, semitones: usize) -> Self {
        Self::from_index(self.index() + semitones)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tonal mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Major => f.write_str("major"),
            Mode::Minor => f.write_str("minor"),
        }
    }
}

/// Detected key: root pitch class plus mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub root: PitchClass,
    pub mode: Mode,
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.root, self.mode)
    }
}

// ============================================================================
// Extracted Features
// ============================================================================

/// Descriptors produced by the Feature Extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFeatures {
    /// Tempo estimate in BPM
    pub tempo: f32,
    /// Mean frame RMS, in [0, 1]
    pub energy: f32,
    /// Mean spectral centroid in Hz
    pub spectral_centroid: f32,
    /// Mean spectral rolloff in Hz
    pub spectral_rolloff: f32,
    pub key: Key,
    /// Time-averaged, frame max-normalized chroma, C first
    pub chroma: [f32; 12],
    /// Vocal stem sharpness proxy in [0, 1], only with stems
    pub vocal_clarity: Option<f32>,
    /// Mix spectral complexity proxy in [0, 1], only with stems
    pub instrumental_complexity: Option<f32>,
    /// Rolloff above 10 kHz
    pub high_freq_noise: bool,
}

// ============================================================================
// Feature Extractor
// ============================================================================

/// Feature Extractor stage
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    stft: Stft,
    rolloff_percent: f32,
    tempo: TempoConfig,
    chroma: ChromaConfig,
    stems: StemConfig,
}

impl FeatureExtractor {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self {
            stft: Stft::new(config.frame_size, config.hop_length)?,
            rolloff_percent: config.rolloff_percent,
            tempo: config.tempo.clone(),
            chroma: config.chroma.clone(),
            stems: config.stems.clone(),
        })
    }

    /// Extract the full feature set
    ///
    /// # Arguments
    /// * `buffer` - Normalized mono mix
    /// * `stems` - Separated stems of `buffer`, enabling the clarity and
    ///   complexity proxies
    ///
    /// # Errors
    /// * `FeatureExtraction` - if the stems do not match the buffer or any
    ///   descriptor is not finite
    pub fn extract(
        &self,
        buffer: &AudioBuffer,
        stems: Option<&SeparatedAudio>,
    ) -> Result<ExtractedFeatures> {
        let sample_rate = buffer.sample_rate();
        let nyquist = sample_rate as f32 / 2.0;

        if let Some(stems) = stems {
            if stems.sample_rate() != sample_rate || stems.len() != buffer.len() {
                return Err(SongscopeError::feature(format!(
                    "stems ({} samples @ {} Hz) do not match the mix ({} samples @ {} Hz)",
                    stems.len(),
                    stems.sample_rate(),
                    buffer.len(),
                    sample_rate
                )));
            }
        }

        let spectrogram = self.stft.forward(buffer.samples());
        let magnitudes = spectrogram.magnitudes();
        let frequencies: Vec<f32> = (0..spectrogram.num_bins())
            .map(|bin| spectrogram.bin_frequency(bin, sample_rate))
            .collect();

        let frame_rate = sample_rate as f32 / self.stft.hop_length() as f32;
        let onset = tempo::onset_strength(&magnitudes);
        let tempo = tempo::estimate_tempo(&onset, frame_rate, &self.tempo);

        let energy = spectral::mean_rms(
            buffer.samples(),
            self.stft.frame_size(),
            self.stft.hop_length(),
        );
        let spectral_centroid = spectral::mean_centroid(&magnitudes, &frequencies);
        let spectral_rolloff =
            spectral::mean_rolloff(&magnitudes, &frequencies, self.rolloff_percent);

        let chroma = chroma::chroma_profile(&magnitudes, &frequencies, &self.chroma);
        let key = chroma::detect_key(&chroma);

        let (vocal_clarity, instrumental_complexity) = match stems {
            Some(stems) => {
                let vocal_magnitudes = self.stft.forward(stems.vocals.samples()).magnitudes();
                let clarity = stems::vocal_clarity(&vocal_magnitudes, &frequencies)
                    / self.stems.clarity_scale;
                let complexity = stems::spectral_complexity(
                    &magnitudes,
                    self.stft.window(),
                    self.stems.peak_threshold,
                ) / self.stems.complexity_scale;
                (Some(clarity), Some(complexity))
            }
            None => (None, None),
        };

        check_finite("tempo", tempo)?;
        check_finite("energy", energy)?;
        check_finite("spectral_centroid", spectral_centroid)?;
        check_finite("spectral_rolloff", spectral_rolloff)?;
        if let Some(value) = vocal_clarity {
            check_finite("vocal_clarity", value)?;
        }
        if let Some(value) = instrumental_complexity {
            check_finite("instrumental_complexity", value)?;
        }
        if chroma.iter().any(|c| !c.is_finite()) {
            return Err(SongscopeError::feature("chroma profile is not finite"));
        }

        let features = ExtractedFeatures {
            tempo: tempo.clamp(self.tempo.min_bpm, self.tempo.max_bpm),
            energy: energy.clamp(0.0, 1.0),
            spectral_centroid: spectral_centroid.clamp(0.0, nyquist),
            spectral_rolloff: spectral_rolloff.clamp(0.0, nyquist),
            key,
            chroma,
            vocal_clarity: vocal_clarity.map(|v| v.clamp(0.0, 1.0)),
            instrumental_complexity: instrumental_complexity.map(|v| v.clamp(0.0, 1.0)),
            high_freq_noise: spectral_rolloff > HIGH_FREQ_NOISE_ROLLOFF_HZ,
        };

        debug!(
            tempo = features.tempo,
            energy = features.energy,
            centroid = features.spectral_centroid,
            rolloff = features.spectral_rolloff,
            key = %features.key,
            "Features extracted"
        );

        Ok(features)
    }
}

fn check_finite(name: &str, value: f32) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SongscopeError::feature(format!("{} is not finite ({})", name, value)))
    }
}

// ============================================================================
// Tests
// ============================================================================
