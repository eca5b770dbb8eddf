//! Error handling for Songscope
//!
//! Every pipeline stage fails fast with its own variant and wraps the
//! originating cause. All errors carry recovery suggestions and a single
//! user-facing message for the calling layer.

use thiserror::Error;

/// Result type alias for Songscope operations
pub type Result<T> = std::result::Result<T, SongscopeError>;

/// Boxed error used to carry the originating cause
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for Songscope operations
#[derive(Error, Debug)]
pub enum SongscopeError {
    // Loader Errors
    #[error("Could not decode audio: {reason}")]
    Decode {
        reason: String,
        #[source]
        source: Option<BoxedSource>,
    },

    // Separator Errors
    #[error("Vocal separation failed: {reason}")]
    Separation { reason: String },

    // Feature Extractor Errors
    #[error("Feature extraction failed: {reason}")]
    FeatureExtraction {
        reason: String,
        #[source]
        source: Option<BoxedSource>,
    },

    // Report Composer Errors
    #[error("Report composition failed: missing feature '{missing}'")]
    ReportComposition { missing: String },

    // Pipeline Errors
    #[error("Analysis cancelled before the {stage} stage")]
    Cancelled { stage: &'static str },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SongscopeError {
    /// Build a decode error without an underlying cause
    pub fn decode(reason: impl Into<String>) -> Self {
        SongscopeError::Decode {
            reason: reason.into(),
            source: None,
        }
    }

    /// Build a decode error wrapping the originating failure
    pub fn decode_with<E>(reason: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SongscopeError::Decode {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Build a feature extraction error without an underlying cause
    pub fn feature(reason: impl Into<String>) -> Self {
        SongscopeError::FeatureExtraction {
            reason: reason.into(),
            source: None,
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            SongscopeError::Decode { .. } => "DECODE_ERROR",
            SongscopeError::Separation { .. } => "SEPARATION_ERROR",
            SongscopeError::FeatureExtraction { .. } => "FEATURE_EXTRACTION_ERROR",
            SongscopeError::ReportComposition { .. } => "REPORT_COMPOSITION_ERROR",
            SongscopeError::Cancelled { .. } => "CANCELLED",
            SongscopeError::InvalidConfig { .. } => "INVALID_CONFIG",
            SongscopeError::Io(_) => "IO_ERROR",
            SongscopeError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if retrying with different input or settings can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SongscopeError::Decode { .. }
                | SongscopeError::Separation { .. }
                | SongscopeError::Cancelled { .. }
                | SongscopeError::InvalidConfig { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            SongscopeError::Decode { .. } => vec![
                "Check that the file exists and plays in another application",
                "Supported formats: WAV, MP3",
                "Files larger than the configured upload limit are rejected",
            ],
            SongscopeError::Separation { .. } => vec![
                "Provide a recording longer than one analysis window",
                "Lower the frame size in the configuration",
            ],
            SongscopeError::FeatureExtraction { .. } => vec![
                "The recording may contain invalid sample data",
                "Try re-exporting the audio from its source",
            ],
            SongscopeError::InvalidConfig { .. } => vec![
                "Run 'songscope-cli config' to print the default configuration",
                "Remove the offending field to fall back to its default",
            ],
            SongscopeError::Cancelled { .. } => vec!["Submit the analysis again"],
            _ => vec![],
        }
    }

    /// Get a single user-facing message for this error
    pub fn friendly_message(&self) -> String {
        match self {
            SongscopeError::Decode { reason, .. } => {
                format!("We couldn't read this audio file: {}. Please upload a WAV or MP3 file.", reason)
            }
            SongscopeError::Separation { reason } => {
                format!("The recording could not be split into vocals and accompaniment: {}.", reason)
            }
            SongscopeError::FeatureExtraction { reason, .. } => {
                format!("Analysis of the recording failed: {}.", reason)
            }
            SongscopeError::Cancelled { .. } => "The analysis was cancelled.".to_string(),
            _ => self.to_string(),
        }
    }
}
