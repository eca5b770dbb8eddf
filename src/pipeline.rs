//! Analysis pipeline
//!
//! [`Analyzer`] owns one instance of every stage, built once from an
//! [`AnalysisConfig`] and shared by reference across requests. Each call runs
//! the stages strictly in order:
//!
//! Loader → Separator → Feature Extractor → Mood Classifier → Report Composer
//!
//! Requests own all of their intermediate buffers and drop them as soon as
//! the next stage has what it needs. No temporary files are written.
//! A [`CancellationToken`] is checked at every stage boundary.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::classify::{classifier_from_config, MoodClassifier};
use crate::config::AnalysisConfig;
use crate::engine::{AudioBuffer, Loader};
use crate::error::{Result, SongscopeError};
use crate::features::FeatureExtractor;
use crate::report::{FeatureSet, Report, ReportComposer, SourceInfo, TrackMetadata};
use crate::separation::Separator;

/// Stage names reported by `Cancelled`
pub mod stage {
    pub const LOADER: &str = "loader";
    pub const SEPARATOR: &str = "separator";
    pub const FEATURE_EXTRACTOR: &str = "feature_extractor";
    pub const REPORT_COMPOSER: &str = "report_composer";
}

// ============================================================================
// Cancellation
// ============================================================================

/// Cooperative cancellation flag shared between a caller and a running
/// analysis
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; takes effect at the next stage boundary
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn checkpoint(&self, next_stage: &'static str) -> Result<()> {
        if self.is_cancelled() {
            debug!(stage = next_stage, "Analysis cancelled");
            return Err(SongscopeError::Cancelled { stage: next_stage });
        }
        Ok(())
    }
}

// ============================================================================
// Analyzer
// ============================================================================

/// End-to-end analysis pipeline
pub struct Analyzer {
    config: AnalysisConfig,
    loader: Loader,
    separator: Separator,
    extractor: FeatureExtractor,
    classifier: Box<dyn MoodClassifier>,
    composer: ReportComposer,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("config", &self.config)
            .field("classifier", &self.classifier.name())
            .finish()
    }
}

impl Analyzer {
    /// Validate the configuration and build every stage
    ///
    /// # Errors
    /// * `InvalidConfig` - if the configuration fails validation
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            loader: Loader::new(&config),
            separator: Separator::new(&config)?,
            extractor: FeatureExtractor::new(&config)?,
            classifier: classifier_from_config(&config.mood),
            composer: ReportComposer::new(),
            config,
        })
    }

    /// Replace the configured mood classifier
    pub fn with_classifier(mut self, classifier: Box<dyn MoodClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn separator(&self) -> &Separator {
        &self.separator
    }

    /// Analyze an audio file
    pub fn analyze_file(&self, path: &Path, track: &TrackMetadata) -> Result<Report> {
        self.analyze_file_cancellable(path, track, &CancellationToken::new())
    }

    /// The file is read once; the report fingerprint covers exactly the
    /// bytes that were decoded.
    pub fn analyze_file_cancellable(
        &self,
        path: &Path,
        track: &TrackMetadata,
        token: &CancellationToken,
    ) -> Result<Report> {
        token.checkpoint(stage::LOADER)?;
        info!(path = %path.display(), "Analysis started");

        let bytes = self.loader.read_source(path)?;
        let extension = path.extension().and_then(|e| e.to_str());
        self.analyze_bytes_cancellable(&bytes, extension, track, token)
    }

    /// Analyze an in-memory upload
    pub fn analyze_bytes(
        &self,
        bytes: &[u8],
        declared_extension: Option<&str>,
        track: &TrackMetadata,
    ) -> Result<Report> {
        self.analyze_bytes_cancellable(bytes, declared_extension, track, &CancellationToken::new())
    }

    pub fn analyze_bytes_cancellable(
        &self,
        bytes: &[u8],
        declared_extension: Option<&str>,
        track: &TrackMetadata,
        token: &CancellationToken,
    ) -> Result<Report> {
        token.checkpoint(stage::LOADER)?;
        let buffer = self.loader.load_bytes(bytes, declared_extension)?;
        self.analyze_loaded_cancellable(buffer, bytes, track, token)
    }

    /// Analyze a buffer the loader already decoded from `source`
    ///
    /// For callers that keep the normalized buffer, e.g. to export it, without
    /// decoding the source twice. `source` is only fingerprinted.
    pub fn analyze_loaded(
        &self,
        buffer: AudioBuffer,
        source: &[u8],
        track: &TrackMetadata,
    ) -> Result<Report> {
        self.analyze_loaded_cancellable(buffer, source, track, &CancellationToken::new())
    }

    pub fn analyze_loaded_cancellable(
        &self,
        buffer: AudioBuffer,
        source: &[u8],
        track: &TrackMetadata,
        token: &CancellationToken,
    ) -> Result<Report> {
        let started = Instant::now();
        let source = SourceInfo::new(&buffer, Some(source));

        let report = self.run(buffer, source, track, token)?;
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Analysis complete"
        );
        Ok(report)
    }

    /// Analyze an already-decoded buffer
    ///
    /// The buffer is peak-normalized first, which is a no-op for Loader
    /// output.
    pub fn analyze_buffer(&self, buffer: AudioBuffer, track: &TrackMetadata) -> Result<Report> {
        self.analyze_buffer_cancellable(buffer, track, &CancellationToken::new())
    }

    pub fn analyze_buffer_cancellable(
        &self,
        buffer: AudioBuffer,
        track: &TrackMetadata,
        token: &CancellationToken,
    ) -> Result<Report> {
        token.checkpoint(stage::LOADER)?;
        let source_rate = buffer.sample_rate();
        let buffer = self.loader.normalize(buffer.into_samples(), source_rate)?;
        let source = SourceInfo::new(&buffer, None);
        self.run(buffer, source, track, token)
    }

    /// Stages after loading
    fn run(
        &self,
        buffer: AudioBuffer,
        source: SourceInfo,
        track: &TrackMetadata,
        token: &CancellationToken,
    ) -> Result<Report> {
        token.checkpoint(stage::SEPARATOR)?;
        let stems = self.separator.separate(&buffer)?;

        token.checkpoint(stage::FEATURE_EXTRACTOR)?;
        let extracted = self.extractor.extract(&buffer, Some(&stems))?;
        drop(stems);
        drop(buffer);

        let mood = self.classifier.classify(&extracted);
        debug!(classifier = self.classifier.name(), mood = %mood, "Mood classified");

        token.checkpoint(stage::REPORT_COMPOSER)?;
        self.composer.compose(
            track,
            source,
            FeatureSet {
                features: extracted,
                mood,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Mood;
    use crate::features::ExtractedFeatures;

    fn tone(secs: f32) -> AudioBuffer {
        let sample_rate = 22050;
        let n = (secs * sample_rate as f32) as usize;
        let samples = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * 330.0 * i as f32 / sample_rate as f32).sin())
            .collect();
        AudioBuffer::new(samples, sample_rate).unwrap()
    }

    /// Always answers the same mood
    struct FixedMood(Mood);

    impl MoodClassifier for FixedMood {
        fn classify(&self, _features: &ExtractedFeatures) -> Mood {
            self.0
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    /// Cancels the shared token while classifying
    struct CancelOnClassify {
        token: CancellationToken,
    }

    impl MoodClassifier for CancelOnClassify {
        fn classify(&self, _features: &ExtractedFeatures) -> Mood {
            self.token.cancel();
            Mood::Neutral
        }

        fn name(&self) -> &'static str {
            "cancel-on-classify"
        }
    }

    #[test]
    fn test_analyzer_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Analyzer>();
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = AnalysisConfig {
            hop_length: 0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            Analyzer::new(config),
            Err(SongscopeError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_cancelled_before_start() {
        let analyzer = Analyzer::new(AnalysisConfig::default()).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let result =
            analyzer.analyze_buffer_cancellable(tone(1.0), &TrackMetadata::default(), &token);
        match result {
            Err(SongscopeError::Cancelled { stage: at }) => assert_eq!(at, stage::LOADER),
            other => panic!("Expected Cancelled, got: {:?}", other),
        }
    }

    #[test]
    fn test_token_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_analyze_buffer_produces_report() {
        let analyzer = Analyzer::new(AnalysisConfig::default()).unwrap();
        let report = analyzer
            .analyze_buffer(tone(3.0), &TrackMetadata::new("Tone", "Test"))
            .unwrap();

        assert_eq!(report.metadata.title, "Tone");
        assert_eq!(report.metadata.sample_rate, 22050);
        assert!(report.features.features.vocal_clarity.is_some());
        assert!(report.scores.market_score >= 6.0 && report.scores.market_score <= 10.0);
    }

    #[test]
    fn test_short_buffer_surfaces_separation_error() {
        let analyzer = Analyzer::new(AnalysisConfig::default()).unwrap();
        let result = analyzer.analyze_buffer(tone(0.01), &TrackMetadata::default());
        assert!(matches!(result, Err(SongscopeError::Separation { .. })));
    }

    // ------------------------------------------------------------------------
    // Stage boundaries
    // ------------------------------------------------------------------------

    #[test]
    fn test_injected_classifier_is_used() {
        let analyzer = Analyzer::new(AnalysisConfig::default())
            .unwrap()
            .with_classifier(Box::new(FixedMood(Mood::BrightUplifting)));

        let report = analyzer
            .analyze_buffer(tone(3.0), &TrackMetadata::default())
            .unwrap();
        assert_eq!(report.features.mood, Mood::BrightUplifting);
    }

    #[test]
    fn test_cancelled_before_report_composition() {
        let token = CancellationToken::new();
        let analyzer = Analyzer::new(AnalysisConfig::default())
            .unwrap()
            .with_classifier(Box::new(CancelOnClassify {
                token: token.clone(),
            }));

        let result =
            analyzer.analyze_buffer_cancellable(tone(3.0), &TrackMetadata::default(), &token);
        match result {
            Err(SongscopeError::Cancelled { stage: at }) => {
                assert_eq!(at, stage::REPORT_COMPOSER)
            }
            Ok(report) => panic!("Expected Cancelled, got a report: {}", report.summary()),
            Err(other) => panic!("Expected Cancelled, got: {:?}", other),
        }
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_fresh_token_runs_to_completion_after_cancelled_one() {
        let analyzer = Analyzer::new(AnalysisConfig::default()).unwrap();
        let cancelled = CancellationToken::new();
        cancelled.cancel();

        let track = TrackMetadata::default();
        let fresh = CancellationToken::new();

        assert!(analyzer
            .analyze_buffer_cancellable(tone(3.0), &track, &cancelled)
            .is_err());
        assert!(analyzer
            .analyze_buffer_cancellable(tone(3.0), &track, &fresh)
            .is_ok());
    }

    // ------------------------------------------------------------------------
    // Source fingerprint
    // ------------------------------------------------------------------------

    #[test]
    fn test_analyze_loaded_fingerprints_source() {
        let analyzer = Analyzer::new(AnalysisConfig::default()).unwrap();
        let source = b"source bytes";

        let report = analyzer
            .analyze_loaded(tone(3.0), source, &TrackMetadata::default())
            .unwrap();
        assert_eq!(
            report.metadata.source_sha256.as_deref(),
            Some(crate::report::sha256_hex(source).as_str())
        );
    }
}
