//! Analysis configuration
//!
//! Every tunable of the pipeline lives in [`AnalysisConfig`] with a
//! documented default, so analyses are reproducible under varied settings.
//! Configurations are plain serde structs; a JSON file only needs the fields
//! it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::buffer::{DEFAULT_SAMPLE_RATE, HIGH_FIDELITY_SAMPLE_RATE};
use crate::error::{Result, SongscopeError};

// ============================================================================
// Defaults
// ============================================================================

/// Analysis window length in samples
pub const DEFAULT_FRAME_SIZE: usize = 2048;

/// Hop between successive analysis windows in samples
pub const DEFAULT_HOP_LENGTH: usize = 512;

/// Fraction of cumulative spectral magnitude that defines the rolloff
pub const DEFAULT_ROLLOFF_PERCENT: f32 = 0.85;

/// Largest accepted input file (32 MiB upload limit)
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 32 * 1024 * 1024;

/// Vocal sharpness divisor before clamping to [0,1]
pub const DEFAULT_CLARITY_SCALE: f32 = 1.0;

/// Spectral peak count divisor before clamping to [0,1]
pub const DEFAULT_COMPLEXITY_SCALE: f32 = 30.0;

const MIN_SAMPLE_RATE: u32 = 8000;
const MAX_SAMPLE_RATE: u32 = 192_000;

// ============================================================================
// Top-level configuration
// ============================================================================

/// Full pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Target sample rate the loader resamples to (default: 22050)
    pub sample_rate: u32,
    /// STFT / RMS window length in samples (default: 2048)
    pub frame_size: usize,
    /// Hop between windows in samples (default: 512)
    pub hop_length: usize,
    /// Spectral rolloff threshold (default: 0.85)
    pub rolloff_percent: f32,
    /// Inputs larger than this are rejected by the loader
    pub max_input_bytes: u64,
    pub tempo: TempoConfig,
    pub separation: SeparationConfig,
    pub chroma: ChromaConfig,
    pub stems: StemConfig,
    pub mood: MoodConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_size: DEFAULT_FRAME_SIZE,
            hop_length: DEFAULT_HOP_LENGTH,
            rolloff_percent: DEFAULT_ROLLOFF_PERCENT,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            tempo: TempoConfig::default(),
            separation: SeparationConfig::default(),
            chroma: ChromaConfig::default(),
            stems: StemConfig::default(),
            mood: MoodConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Preset favouring separation quality (44.1kHz, 4096-sample window)
    pub fn high_fidelity() -> Self {
        Self {
            sample_rate: HIGH_FIDELITY_SAMPLE_RATE,
            frame_size: 4096,
            hop_length: 1024,
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file and validate it
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse a configuration from JSON text and validate it
    ///
    /// Missing fields take their defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: AnalysisConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration as pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Nyquist frequency of the target sample rate
    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    /// Check the configuration for inconsistent values
    pub fn validate(&self) -> Result<()> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return invalid(format!(
                "sample_rate {} outside {}..={} Hz",
                self.sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
            ));
        }

        if self.frame_size < 64 {
            return invalid(format!("frame_size {} is below 64 samples", self.frame_size));
        }

        // Overlap-add reconstruction needs at least 50% window overlap
        if self.hop_length == 0 || self.hop_length > self.frame_size / 2 {
            return invalid(format!(
                "hop_length {} must be in 1..={}",
                self.hop_length,
                self.frame_size / 2
            ));
        }

        if !(self.rolloff_percent > 0.0 && self.rolloff_percent <= 1.0) {
            return invalid(format!("rolloff_percent {} must be in (0, 1]", self.rolloff_percent));
        }

        if self.max_input_bytes == 0 {
            return invalid("max_input_bytes must be greater than zero".to_string());
        }

        self.tempo.validate()?;
        self.separation.validate()?;
        self.chroma.validate(self.nyquist())?;
        self.stems.validate()?;
        self.mood.reference.validate()?;
        Ok(())
    }
}

fn invalid<T>(reason: String) -> Result<T> {
    Err(SongscopeError::InvalidConfig { reason })
}

// ============================================================================
// Stage sections
// ============================================================================

/// Tempo estimation bounds and prior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    /// Slowest tempo considered (default: 60 BPM)
    pub min_bpm: f32,
    /// Fastest tempo considered (default: 240 BPM)
    pub max_bpm: f32,
    /// Center of the log-normal tempo prior, also the fallback (default: 120)
    pub start_bpm: f32,
    /// Prior width in octaves (default: 1.0)
    pub std_octaves: f32,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            min_bpm: 60.0,
            max_bpm: 240.0,
            start_bpm: 120.0,
            std_octaves: 1.0,
        }
    }
}

impl TempoConfig {
    fn validate(&self) -> Result<()> {
        if !(self.min_bpm > 0.0 && self.min_bpm < self.max_bpm) {
            return invalid(format!(
                "tempo range {}..{} BPM is empty",
                self.min_bpm, self.max_bpm
            ));
        }
        if !(self.min_bpm..=self.max_bpm).contains(&self.start_bpm) {
            return invalid(format!("start_bpm {} outside tempo range", self.start_bpm));
        }
        if self.std_octaves <= 0.0 {
            return invalid("tempo std_octaves must be positive".to_string());
        }
        Ok(())
    }
}

/// Repeating-pattern separator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    /// Nearest-neighbour frames aggregated per frame (default: 10)
    pub neighbors: usize,
    /// Frames closer than this are never neighbours (default: 2.0 s)
    pub min_separation_secs: f32,
    /// Frames further than this are never neighbours (default: 30.0 s)
    pub max_search_secs: f32,
    /// Bands the magnitude is pooled into for similarity (default: 64)
    pub similarity_bands: usize,
    /// Margin applied to the background in the vocal mask (default: 2.0)
    pub mask_margin: f32,
    /// Soft mask exponent (default: 2.0)
    pub mask_power: f32,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            neighbors: 10,
            min_separation_secs: 2.0,
            max_search_secs: 30.0,
            similarity_bands: 64,
            mask_margin: 2.0,
            mask_power: 2.0,
        }
    }
}

impl SeparationConfig {
    fn validate(&self) -> Result<()> {
        if self.neighbors == 0 || self.similarity_bands == 0 {
            return invalid("separation neighbors and similarity_bands must be positive".to_string());
        }
        if self.min_separation_secs < 0.0 || self.max_search_secs <= self.min_separation_secs {
            return invalid(format!(
                "separation search window {}..{} s is empty",
                self.min_separation_secs, self.max_search_secs
            ));
        }
        if self.mask_margin <= 0.0 || self.mask_power <= 0.0 {
            return invalid("mask_margin and mask_power must be positive".to_string());
        }
        Ok(())
    }
}

/// Chroma frequency range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromaConfig {
    /// Lowest frequency folded into chroma (default: 65.4 Hz, C2)
    pub min_hz: f32,
    /// Highest frequency folded into chroma (default: 2093 Hz, C7)
    pub max_hz: f32,
    /// Reference tuning for A4 (default: 440 Hz)
    pub tuning_hz: f32,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            min_hz: 65.4,
            max_hz: 2093.0,
            tuning_hz: 440.0,
        }
    }
}

impl ChromaConfig {
    fn validate(&self, nyquist: f32) -> Result<()> {
        if !(self.min_hz > 0.0 && self.min_hz < self.max_hz && self.min_hz < nyquist) {
            return invalid(format!(
                "chroma range {}..{} Hz is invalid",
                self.min_hz, self.max_hz
            ));
        }
        if self.tuning_hz <= 0.0 {
            return invalid("chroma tuning_hz must be positive".to_string());
        }
        Ok(())
    }
}

/// Stem-derived proxy settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StemConfig {
    /// Sharpness divisor for vocal clarity (default: 1.0)
    pub clarity_scale: f32,
    /// Peak-count divisor for instrumental complexity (default: 30.0)
    pub complexity_scale: f32,
    /// Minimum normalized magnitude of a counted spectral peak (default: 0.005)
    pub peak_threshold: f32,
}

impl Default for StemConfig {
    fn default() -> Self {
        Self {
            clarity_scale: DEFAULT_CLARITY_SCALE,
            complexity_scale: DEFAULT_COMPLEXITY_SCALE,
            peak_threshold: 0.005,
        }
    }
}

impl StemConfig {
    fn validate(&self) -> Result<()> {
        if self.clarity_scale <= 0.0 || self.complexity_scale <= 0.0 {
            return invalid("stem scale constants must be positive".to_string());
        }
        if self.peak_threshold < 0.0 {
            return invalid("peak_threshold must not be negative".to_string());
        }
        Ok(())
    }
}

/// Which mood classifier tier to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MoodClassifierKind {
    /// Threshold table on (energy, centroid)
    #[default]
    Threshold,
    /// Sign of the standardized centroid
    Standardized,
}

/// Mood classification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MoodConfig {
    pub classifier: MoodClassifierKind,
    pub thresholds: MoodThresholds,
    pub reference: MoodReference,
}

/// Threshold table for the default mood classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodThresholds {
    pub energetic_energy: f32,
    pub energetic_centroid_hz: f32,
    pub upbeat_energy: f32,
    pub upbeat_centroid_hz: f32,
    pub calm_energy: f32,
    pub calm_centroid_hz: f32,
}

impl Default for MoodThresholds {
    fn default() -> Self {
        Self {
            energetic_energy: 0.6,
            energetic_centroid_hz: 3000.0,
            upbeat_energy: 0.4,
            upbeat_centroid_hz: 2000.0,
            calm_energy: 0.3,
            calm_centroid_hz: 1500.0,
        }
    }
}

/// Reference statistics for the standardized mood classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodReference {
    pub centroid_mean_hz: f32,
    pub centroid_std_hz: f32,
    pub rolloff_mean_hz: f32,
    pub rolloff_std_hz: f32,
    pub energy_mean: f32,
    pub energy_std: f32,
}

impl Default for MoodReference {
    fn default() -> Self {
        Self {
            centroid_mean_hz: 2000.0,
            centroid_std_hz: 1000.0,
            rolloff_mean_hz: 4000.0,
            rolloff_std_hz: 2000.0,
            energy_mean: 0.25,
            energy_std: 0.15,
        }
    }
}

impl MoodReference {
    fn validate(&self) -> Result<()> {
        let deviations = [
            ("centroid_std_hz", self.centroid_std_hz),
            ("rolloff_std_hz", self.rolloff_std_hz),
            ("energy_std", self.energy_std),
        ];
        for (name, value) in deviations {
            if value.is_nan() || value <= 0.0 {
                return invalid(format!("mood reference {} must be positive", name));
            }
        }
        Ok(())
    }
}
