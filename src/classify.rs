//! Mood classification
//!
//! Maps extracted features to a categorical mood label. Two deterministic
//! tiers are available behind the [`MoodClassifier`] trait:
//! - [`ThresholdMoodClassifier`] - ordered threshold table on energy and
//!   spectral centroid (default)
//! - [`StandardizedMoodClassifier`] - z-scores against fixed reference
//!   statistics, split on the sign of the centroid score
//!
//! Both are approximations; no ground-truth mood taxonomy is involved.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{MoodClassifierKind, MoodConfig, MoodReference, MoodThresholds};
use crate::features::ExtractedFeatures;

/// Mood label attached to a feature set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mood {
    #[serde(rename = "Energetic/Happy")]
    EnergeticHappy,
    #[serde(rename = "Upbeat")]
    Upbeat,
    #[serde(rename = "Calm/Melancholic")]
    CalmMelancholic,
    #[serde(rename = "Neutral")]
    Neutral,
    #[serde(rename = "Bright and Uplifting")]
    BrightUplifting,
    #[serde(rename = "Calm and Reflective")]
    CalmReflective,
}

impl Mood {
    pub fn label(&self) -> &'static str {
        match self {
            Mood::EnergeticHappy => "Energetic/Happy",
            Mood::Upbeat => "Upbeat",
            Mood::CalmMelancholic => "Calm/Melancholic",
            Mood::Neutral => "Neutral",
            Mood::BrightUplifting => "Bright and Uplifting",
            Mood::CalmReflective => "Calm and Reflective",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Pure, deterministic mapping from features to a mood
pub trait MoodClassifier: Send + Sync {
    /// Classify a feature set
    fn classify(&self, features: &ExtractedFeatures) -> Mood;

    /// Identifier of the classifier tier
    fn name(&self) -> &'static str;
}

/// Build the classifier selected by the configuration
pub fn classifier_from_config(config: &MoodConfig) -> Box<dyn MoodClassifier> {
    match config.classifier {
        MoodClassifierKind::Threshold => {
            Box::new(ThresholdMoodClassifier::new(config.thresholds.clone()))
        }
        MoodClassifierKind::Standardized => {
            Box::new(StandardizedMoodClassifier::new(config.reference.clone()))
        }
    }
}

// ============================================================================
// Threshold table
// ============================================================================

/// Ordered threshold table on (energy, centroid); first match wins
#[derive(Debug, Clone, Default)]
pub struct ThresholdMoodClassifier {
    thresholds: MoodThresholds,
}

impl ThresholdMoodClassifier {
    pub fn new(thresholds: MoodThresholds) -> Self {
        Self { thresholds }
    }
}

impl MoodClassifier for ThresholdMoodClassifier {
    fn classify(&self, features: &ExtractedFeatures) -> Mood {
        let t = &self.thresholds;
        let energy = features.energy;
        let centroid = features.spectral_centroid;

        if energy > t.energetic_energy && centroid > t.energetic_centroid_hz {
            Mood::EnergeticHappy
        } else if energy > t.upbeat_energy && centroid > t.upbeat_centroid_hz {
            Mood::Upbeat
        } else if energy < t.calm_energy && centroid < t.calm_centroid_hz {
            Mood::CalmMelancholic
        } else {
            Mood::Neutral
        }
    }

    fn name(&self) -> &'static str {
        "threshold"
    }
}

// ============================================================================
// Standardized features
// ============================================================================

/// Sign of the standardized spectral centroid
///
/// Centroid, rolloff and energy are all standardized so the scores can be
/// inspected together, but only the centroid score decides the label.
#[derive(Debug, Clone, Default)]
pub struct StandardizedMoodClassifier {
    reference: MoodReference,
}

impl StandardizedMoodClassifier {
    pub fn new(reference: MoodReference) -> Self {
        Self { reference }
    }

    /// z-scores of (centroid, rolloff, energy)
    pub fn standardize(&self, features: &ExtractedFeatures) -> [f32; 3] {
        let r = &self.reference;
        [
            (features.spectral_centroid - r.centroid_mean_hz) / r.centroid_std_hz,
            (features.spectral_rolloff - r.rolloff_mean_hz) / r.rolloff_std_hz,
            (features.energy - r.energy_mean) / r.energy_std,
        ]
    }
}

impl MoodClassifier for StandardizedMoodClassifier {
    fn classify(&self, features: &ExtractedFeatures) -> Mood {
        if self.standardize(features)[0] > 0.0 {
            Mood::BrightUplifting
        } else {
            Mood::CalmReflective
        }
    }

    fn name(&self) -> &'static str {
        "standardized"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Key, Mode, PitchClass};
    use test_case::test_case;

    fn features(energy: f32, centroid: f32) -> ExtractedFeatures {
        ExtractedFeatures {
            tempo: 120.0,
            energy,
            spectral_centroid: centroid,
            spectral_rolloff: centroid * 2.0,
            key: Key {
                root: PitchClass::C,
                mode: Mode::Major,
            },
            chroma: [0.0; 12],
            vocal_clarity: None,
            instrumental_complexity: None,
            high_freq_noise: false,
        }
    }

    #[test_case(0.7, 3500.0, Mood::EnergeticHappy ; "energetic")]
    #[test_case(0.7, 2500.0, Mood::Upbeat ; "loud but not bright enough")]
    #[test_case(0.5, 2100.0, Mood::Upbeat ; "upbeat")]
    #[test_case(0.2, 1000.0, Mood::CalmMelancholic ; "calm")]
    #[test_case(0.0, 0.0, Mood::CalmMelancholic ; "silence")]
    #[test_case(0.2, 2500.0, Mood::Neutral ; "quiet and bright")]
    #[test_case(0.6, 3000.0, Mood::Upbeat ; "thresholds are strict")]
    fn test_threshold_table(energy: f32, centroid: f32, expected: Mood) {
        let classifier = ThresholdMoodClassifier::default();
        assert_eq!(classifier.classify(&features(energy, centroid)), expected);
    }

    #[test]
    fn test_standardized_uses_centroid_sign() {
        let classifier = StandardizedMoodClassifier::default();
        assert_eq!(classifier.classify(&features(0.1, 2500.0)), Mood::BrightUplifting);
        assert_eq!(classifier.classify(&features(0.9, 1500.0)), Mood::CalmReflective);
        // Exactly at the reference mean is not positive
        assert_eq!(classifier.classify(&features(0.5, 2000.0)), Mood::CalmReflective);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = classifier_from_config(&MoodConfig::default());
        let f = features(0.45, 2200.0);
        let first = classifier.classify(&f);
        for _ in 0..10 {
            assert_eq!(classifier.classify(&f), first);
        }
        assert_eq!(classifier.name(), "threshold");
    }

    #[test]
    fn test_mood_serializes_as_label() {
        let json = serde_json::to_string(&Mood::CalmMelancholic).unwrap();
        assert_eq!(json, "\"Calm/Melancholic\"");
        assert_eq!(Mood::EnergeticHappy.to_string(), "Energetic/Happy");
    }
}
