//! Scoring & Report Composition
//!
//! Combines a classified feature set into scores and renders the final,
//! immutable [`Report`]. Every piece of prose comes from the rule tables in
//! [`text`], so identical features always produce identical reports apart
//! from the report id and creation time.

pub mod scoring;
pub mod text;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::classify::Mood;
use crate::engine::AudioBuffer;
use crate::error::Result;
use crate::features::ExtractedFeatures;

pub use scoring::ScoreSet;
pub use text::{EnergyLevel, TextRule};

/// Title used when none is supplied
pub const DEFAULT_TITLE: &str = "Untitled";

/// Composer used when none is supplied
pub const DEFAULT_COMPOSER: &str = "Unknown";

/// Bass presence reported when it was not measured
pub const DEFAULT_BASS_PRESENCE: f32 = 0.5;

/// Stereo width reported for mono analysis
pub const DEFAULT_STEREO_WIDTH: f32 = 0.0;

/// Chord progression label; progressions are not analyzed
pub const DEFAULT_PROGRESSION: &str = "Simple";

// ============================================================================
// Inputs
// ============================================================================

/// Extracted features plus the classifier's mood label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    #[serde(flatten)]
    pub features: ExtractedFeatures,
    pub mood: Mood,
}

/// Caller-supplied track details, passed through opaquely
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub composer: Option<String>,
}

impl TrackMetadata {
    pub fn new(title: impl Into<String>, composer: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            composer: Some(composer.into()),
        }
    }

    /// Title with control characters removed, or the default
    pub fn display_title(&self) -> String {
        sanitize(self.title.as_deref()).unwrap_or_else(|| DEFAULT_TITLE.to_string())
    }

    /// Composer with control characters removed, or the default
    pub fn display_composer(&self) -> String {
        sanitize(self.composer.as_deref()).unwrap_or_else(|| DEFAULT_COMPOSER.to_string())
    }
}

/// Facts about the analyzed recording that end up in the report metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// SHA-256 of the encoded input, when the bytes were available
    pub sha256: Option<String>,
    pub duration_secs: f64,
    pub sample_rate: u32,
}

impl SourceInfo {
    /// Describe a decoded buffer, fingerprinting the encoded bytes if given
    pub fn new(buffer: &AudioBuffer, encoded: Option<&[u8]>) -> Self {
        Self {
            sha256: encoded.map(sha256_hex),
            duration_secs: buffer.duration_secs(),
            sample_rate: buffer.sample_rate(),
        }
    }
}

/// Lowercase hex SHA-256 digest
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn sanitize(value: Option<&str>) -> Option<String> {
    let cleaned: String = value?.chars().filter(|c| !c.is_control()).collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// Report
// ============================================================================

/// Report header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub id: Uuid,
    pub title: String,
    pub composer: String,
    pub created_at: DateTime<Utc>,
    pub source_sha256: Option<String>,
    pub duration_secs: f64,
    pub sample_rate: u32,
}

/// Music theory summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TheoryNotes {
    /// Key label such as "A major"
    pub key: String,
    pub progression: String,
}

/// Mixing observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixingNotes {
    pub high_freq_noise: bool,
    /// Not measured by the mono pipeline; always the documented default
    pub bass_presence: f32,
    /// Not measured by the mono pipeline; always the documented default
    pub stereo_width: f32,
}

/// Complete analysis result
///
/// Holds only derived values, never sample data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub features: FeatureSet,
    pub scores: ScoreSet,
    pub energy_level: EnergyLevel,
    pub theory: TheoryNotes,
    pub mixing: MixingNotes,
    pub interpretation: Vec<String>,
    pub recommendations: Vec<String>,
}

impl Report {
    /// Serialize to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Human-readable multi-line summary
    pub fn summary(&self) -> String {
        let f = &self.features.features;
        let mut lines = vec![
            format!("{} by {}", self.metadata.title, self.metadata.composer),
            format!(
                "Duration: {:.1}s @ {} Hz",
                self.metadata.duration_secs, self.metadata.sample_rate
            ),
            String::new(),
            format!("Tempo:        {:.1} BPM", f.tempo),
            format!("Key:          {}", self.theory.key),
            format!("Mood:         {}", self.features.mood),
            format!("Energy:       {:.3} ({})", f.energy, self.energy_level),
            format!("Centroid:     {:.0} Hz", f.spectral_centroid),
            format!("Rolloff:      {:.0} Hz", f.spectral_rolloff),
        ];

        if let Some(clarity) = f.vocal_clarity {
            lines.push(format!("Vocal clarity: {:.2}", clarity));
        }
        if let Some(complexity) = f.instrumental_complexity {
            lines.push(format!("Complexity:   {:.2}", complexity));
        }

        lines.push(String::new());
        lines.push(format!("Engagement:         {:.2}", self.scores.engagement));
        lines.push(format!("Production quality: {:.2}", self.scores.production_quality));
        lines.push(format!("Market score:       {:.1}/10", self.scores.market_score));
        lines.push(format!("Potential score:    {:.1}/10", self.scores.potential_score));

        lines.push(String::new());
        lines.push("Interpretation:".to_string());
        lines.extend(self.interpretation.iter().map(|l| format!("  {}", l)));
        lines.push("Recommendations:".to_string());
        lines.extend(self.recommendations.iter().map(|l| format!("  - {}", l)));

        lines.join("\n")
    }
}

// ============================================================================
// Composer
// ============================================================================

/// Scoring & Report Composer stage
#[derive(Debug, Clone, Default)]
pub struct ReportComposer;

impl ReportComposer {
    pub fn new() -> Self {
        Self
    }

    /// Score a feature set and render the report
    ///
    /// # Errors
    /// * `ReportComposition` - if a feature required by scoring is missing
    pub fn compose(
        &self,
        track: &TrackMetadata,
        source: SourceInfo,
        features: FeatureSet,
    ) -> Result<Report> {
        let scores = ScoreSet::from_features(&features)?;
        let f = &features.features;

        let metadata = ReportMetadata {
            id: Uuid::new_v4(),
            title: track.display_title(),
            composer: track.display_composer(),
            created_at: Utc::now(),
            source_sha256: source.sha256,
            duration_secs: source.duration_secs,
            sample_rate: source.sample_rate,
        };

        let report = Report {
            energy_level: EnergyLevel::from_energy(f.energy),
            theory: TheoryNotes {
                key: f.key.to_string(),
                progression: DEFAULT_PROGRESSION.to_string(),
            },
            mixing: MixingNotes {
                high_freq_noise: f.high_freq_noise,
                bass_presence: DEFAULT_BASS_PRESENCE,
                stereo_width: DEFAULT_STEREO_WIDTH,
            },
            interpretation: text::interpretation(&features),
            recommendations: text::recommendations(&features),
            scores,
            metadata,
            features,
        };

        info!(
            report_id = %report.metadata.id,
            title = %report.metadata.title,
            market_score = report.scores.market_score,
            mood = %report.features.mood,
            "Report composed"
        );

        Ok(report)
    }
}
