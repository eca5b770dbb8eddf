//! Derived scores
//!
//! Every score is a pure function of the feature set. The formulas are
//! placeholder heuristics with fixed constants, kept simple so the result is
//! reproducible and easy to reason about.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SongscopeError};
use crate::report::FeatureSet;

/// Multiplier applied to energy for the engagement score
pub const ENGAGEMENT_GAIN: f32 = 1.2;

/// Offset added to vocal clarity for the production quality score
pub const PRODUCTION_QUALITY_OFFSET: f32 = 0.03;

/// Market score every track starts from
pub const BASE_MARKET_SCORE: f32 = 6.0;

/// Tempo range (BPM, inclusive) that earns a market bonus
pub const MARKET_TEMPO_RANGE: (f32, f32) = (115.0, 130.0);

/// Energy range (inclusive) that earns a market bonus
pub const MARKET_ENERGY_RANGE: (f32, f32) = (0.5, 0.8);

/// Bonus for each matched market range
pub const MARKET_BONUS: f32 = 1.0;

/// Headroom added to the market score for the potential score
pub const POTENTIAL_BONUS: f32 = 2.5;

/// Upper bound of market and potential scores
pub const MAX_SCORE: f32 = 10.0;

/// Scores derived from a feature set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSet {
    /// Listener engagement proxy in [0, 1]
    pub engagement: f32,
    /// Production quality proxy in [0, 1]
    pub production_quality: f32,
    /// Commercial fit in [0, 10]
    pub market_score: f32,
    /// Market score plus growth headroom, in [0, 10]
    pub potential_score: f32,
}

impl ScoreSet {
    /// Derive all scores
    ///
    /// # Errors
    /// * `ReportComposition` - if the feature set carries no vocal clarity,
    ///   which production quality is derived from
    pub fn from_features(features: &FeatureSet) -> Result<Self> {
        let clarity = features.features.vocal_clarity.ok_or_else(|| {
            SongscopeError::ReportComposition {
                missing: "vocal_clarity".to_string(),
            }
        })?;

        let market = market_score(features.features.tempo, features.features.energy);

        Ok(Self {
            engagement: engagement(features.features.energy),
            production_quality: production_quality(clarity),
            market_score: market,
            potential_score: potential_score(market),
        })
    }
}

pub fn engagement(energy: f32) -> f32 {
    (energy * ENGAGEMENT_GAIN).clamp(0.0, 1.0)
}

pub fn production_quality(vocal_clarity: f32) -> f32 {
    (vocal_clarity + PRODUCTION_QUALITY_OFFSET).clamp(0.0, 1.0)
}

/// Base score plus one point per matched tempo/energy range
pub fn market_score(tempo: f32, energy: f32) -> f32 {
    let in_range = |value: f32, (lo, hi): (f32, f32)| value >= lo && value <= hi;

    let mut score = BASE_MARKET_SCORE;
    if in_range(tempo, MARKET_TEMPO_RANGE) {
        score += MARKET_BONUS;
    }
    if in_range(energy, MARKET_ENERGY_RANGE) {
        score += MARKET_BONUS;
    }
    score.min(MAX_SCORE)
}

pub fn potential_score(market_score: f32) -> f32 {
    (market_score + POTENTIAL_BONUS).min(MAX_SCORE)
}
