//! Report text rules
//!
//! All generated prose comes from the tables below. Each rule pairs a
//! condition on the feature set with a fixed sentence, and tables are
//! evaluated in declaration order, so the same features always yield the
//! same text.

use serde::{Deserialize, Serialize};

use crate::features::Mode;
use crate::report::FeatureSet;

/// One condition → sentence entry
#[derive(Clone, Copy)]
pub struct TextRule {
    /// Stable identifier, used in tests and logs
    pub id: &'static str,
    pub applies: fn(&FeatureSet) -> bool,
    pub text: &'static str,
}

impl std::fmt::Debug for TextRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRule").field("id", &self.id).finish()
    }
}

// ============================================================================
// Rule tables
// ============================================================================

/// Tempo interpretation; first match wins, the last rule always applies
pub static TEMPO_INTERPRETATION: &[TextRule] = &[
    TextRule {
        id: "tempo_fast",
        applies: |f| f.features.tempo > 140.0,
        text: "The fast tempo suggests an energetic and dynamic composition.",
    },
    TextRule {
        id: "tempo_moderate",
        applies: |f| f.features.tempo > 100.0,
        text: "The moderate tempo indicates a balanced and engaging rhythm.",
    },
    TextRule {
        id: "tempo_slow",
        applies: |_| true,
        text: "The slower tempo creates a more contemplative and relaxed atmosphere.",
    },
];

/// Energy interpretation; first match wins, the last rule always applies
pub static ENERGY_INTERPRETATION: &[TextRule] = &[
    TextRule {
        id: "energy_high",
        applies: |f| f.features.energy > 0.6,
        text: "The high energy levels suggest an uplifting and powerful musical experience.",
    },
    TextRule {
        id: "energy_calm",
        applies: |_| true,
        text: "The calmer energy profile indicates a more introspective and nuanced musical expression.",
    },
];

/// Recommendations; every matching rule contributes, in this order
pub static RECOMMENDATIONS: &[TextRule] = &[
    TextRule {
        id: "tempo_above_140",
        applies: |f| f.features.tempo > 140.0,
        text: "Consider adding dynamic variations to maintain listener engagement.",
    },
    TextRule {
        id: "tempo_below_100",
        applies: |f| f.features.tempo < 100.0,
        text: "Explore subtle rhythmic variations to enhance the musical flow.",
    },
    TextRule {
        id: "energy_above_0_7",
        applies: |f| f.features.energy > 0.7,
        text: "Consider adding moments of contrast to create more musical tension and release.",
    },
    TextRule {
        id: "energy_below_0_3",
        applies: |f| f.features.energy < 0.3,
        text: "Explore opportunities to add subtle dynamic variations to maintain listener interest.",
    },
    TextRule {
        id: "centroid_above_3000",
        applies: |f| f.features.spectral_centroid > 3000.0,
        text: "The bright spectral characteristics could be balanced with warmer tones.",
    },
    TextRule {
        id: "centroid_below_1500",
        applies: |f| f.features.spectral_centroid < 1500.0,
        text: "Consider adding some brighter elements to enhance the overall timbre.",
    },
    TextRule {
        id: "rolloff_above_10k",
        applies: |f| f.features.high_freq_noise,
        text: "Energy extends well above 10 kHz; check the top end of the mix for hiss or harshness.",
    },
];

/// Emitted when no recommendation applies
pub const AFFIRMATION: &str =
    "The track sits comfortably within the target ranges; keep building on its current balance.";

// ============================================================================
// Rendering
// ============================================================================

/// Overall energy bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnergyLevel {
    High,
    Medium,
    Low,
}

impl EnergyLevel {
    pub fn from_energy(energy: f32) -> Self {
        if energy > 0.6 {
            EnergyLevel::High
        } else if energy > 0.3 {
            EnergyLevel::Medium
        } else {
            EnergyLevel::Low
        }
    }
}

impl std::fmt::Display for EnergyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EnergyLevel::High => "High",
            EnergyLevel::Medium => "Medium",
            EnergyLevel::Low => "Low",
        };
        f.write_str(label)
    }
}

/// Sentence describing the character of a mode
pub fn mode_character(mode: Mode) -> &'static str {
    match mode {
        Mode::Major => "The major tonality gives the piece a bright and open quality.",
        Mode::Minor => "The minor tonality lends the piece a darker and more reflective colour.",
    }
}

fn first_match(rules: &[TextRule], features: &FeatureSet) -> Option<&'static str> {
    rules
        .iter()
        .find(|rule| (rule.applies)(features))
        .map(|rule| rule.text)
}

/// Interpretation paragraph: tempo, key, mode character, energy
pub fn interpretation(features: &FeatureSet) -> Vec<String> {
    let mut lines = Vec::with_capacity(4);

    if let Some(text) = first_match(TEMPO_INTERPRETATION, features) {
        lines.push(text.to_string());
    }
    lines.push(format!(
        "The composition in {} creates a distinct tonal character.",
        features.features.key
    ));
    lines.push(mode_character(features.features.key.mode).to_string());
    if let Some(text) = first_match(ENERGY_INTERPRETATION, features) {
        lines.push(text.to_string());
    }

    lines
}

/// Recommendation list; never empty
pub fn recommendations(features: &FeatureSet) -> Vec<String> {
    let lines: Vec<String> = RECOMMENDATIONS
        .iter()
        .filter(|rule| (rule.applies)(features))
        .map(|rule| rule.text.to_string())
        .collect();

    if lines.is_empty() {
        vec![AFFIRMATION.to_string()]
    } else {
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Mood;
    use crate::features::{ExtractedFeatures, Key, PitchClass};
    use pretty_assertions::assert_eq;

    fn feature_set(tempo: f32, energy: f32, centroid: f32, noisy: bool) -> FeatureSet {
        FeatureSet {
            features: ExtractedFeatures {
                tempo,
                energy,
                spectral_centroid: centroid,
                spectral_rolloff: if noisy { 11_000.0 } else { 4000.0 },
                key: Key {
                    root: PitchClass::D,
                    mode: Mode::Major,
                },
                chroma: [0.0; 12],
                vocal_clarity: Some(0.5),
                instrumental_complexity: Some(0.5),
                high_freq_noise: noisy,
            },
            mood: Mood::Neutral,
        }
    }

    #[test]
    fn test_interpretation_order() {
        let lines = interpretation(&feature_set(150.0, 0.8, 2000.0, false));
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("The fast tempo"));
        assert_eq!(lines[1], "The composition in D major creates a distinct tonal character.");
        assert_eq!(lines[2], mode_character(Mode::Major));
        assert!(lines[3].starts_with("The high energy"));
    }

    #[test]
    fn test_tempo_bands() {
        let first = |tempo| interpretation(&feature_set(tempo, 0.5, 2000.0, false))[0].clone();
        assert!(first(141.0).contains("fast"));
        assert!(first(140.0).contains("moderate"));
        assert!(first(100.0).contains("slower"));
    }

    #[test]
    fn test_recommendations_in_table_order() {
        let lines = recommendations(&feature_set(90.0, 0.2, 3500.0, true));
        assert_eq!(
            lines,
            vec![
                RECOMMENDATIONS[1].text.to_string(),
                RECOMMENDATIONS[3].text.to_string(),
                RECOMMENDATIONS[4].text.to_string(),
                RECOMMENDATIONS[6].text.to_string(),
            ]
        );
    }

    #[test]
    fn test_affirmation_when_nothing_fires() {
        let lines = recommendations(&feature_set(120.0, 0.5, 2000.0, false));
        assert_eq!(lines, vec![AFFIRMATION.to_string()]);
    }

    #[test]
    fn test_energy_levels() {
        assert_eq!(EnergyLevel::from_energy(0.61), EnergyLevel::High);
        assert_eq!(EnergyLevel::from_energy(0.6), EnergyLevel::Medium);
        assert_eq!(EnergyLevel::from_energy(0.3), EnergyLevel::Low);
        assert_eq!(EnergyLevel::High.to_string(), "High");
    }

    #[test]
    fn test_rule_ids_are_unique() {
        let mut ids: Vec<&str> = TEMPO_INTERPRETATION
            .iter()
            .chain(ENERGY_INTERPRETATION)
            .chain(RECOMMENDATIONS)
            .map(|r| r.id)
            .collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }
}
