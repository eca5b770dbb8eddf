//! Songscope - Audio Analysis and Musical Quality Reports
//!
//! Songscope turns an audio recording into a structured report: tempo, key,
//! mood, energy, spectral balance, derived scores and plain-language
//! interpretation and recommendations.
//!
//! # Architecture
//!
//! Data flows strictly through five stages:
//! - Loader/Normalizer: decode WAV/MP3 to a peak-normalized mono buffer
//! - Separator: repeating-pattern vocal/instrumental soft masking
//! - Feature Extractor: tempo, energy, centroid, rolloff, chroma key, stems
//! - Mood Classifier: deterministic mapping to a mood label
//! - Report Composer: scores plus rule-table prose
//!
//! [`Analyzer`] wires the stages together.
//!
//! ```no_run
//! use songscope::{AnalysisConfig, Analyzer, TrackMetadata};
//!
//! let analyzer = Analyzer::new(AnalysisConfig::default())?;
//! let report = analyzer.analyze_file(
//!     std::path::Path::new("song.wav"),
//!     &TrackMetadata::new("Night Drive", "Ada"),
//! )?;
//! println!("{}", report.summary());
//! # Ok::<(), songscope::SongscopeError>(())
//! ```

pub mod classify;
pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod report;
pub mod separation;

pub use classify::{Mood, MoodClassifier};
pub use config::AnalysisConfig;
pub use engine::{AudioBuffer, SeparatedAudio};
pub use error::{Result, SongscopeError};
pub use features::{ExtractedFeatures, Key, Mode, PitchClass};
pub use pipeline::{Analyzer, CancellationToken};
pub use report::{FeatureSet, Report, ScoreSet, TrackMetadata};
