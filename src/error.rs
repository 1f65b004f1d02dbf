//! Error handling for fxvariants
//!
//! Errors fall into two groups: per-item failures that the batch layer logs
//! and skips, and job-level failures that abort the whole batch.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for fxvariants operations
pub type Result<T> = std::result::Result<T, FxError>;

/// Main error type for fxvariants operations
#[derive(Error, Debug)]
pub enum FxError {
    // Decode Errors
    #[error("Failed to decode {path}: {reason}")]
    Decode {
        path: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Audio contains no samples")]
    EmptyAudio,

    #[error("Invalid sample rate: {sample_rate} Hz")]
    InvalidSampleRate { sample_rate: u32 },

    // Effect Errors
    #[error("Invalid parameter '{param}' for {effect}: {value} (expected {expected})")]
    InvalidParameter {
        effect: String,
        param: String,
        value: f32,
        expected: String,
    },

    #[error("DSP overflow: {effect} produced invalid audio (NaN/Inf)")]
    DspOverflow { effect: String },

    #[error("Effect {index} ({effect}) in chain failed: {source}")]
    EffectApplication {
        index: usize,
        effect: String,
        #[source]
        source: Box<FxError>,
    },

    // Job Errors
    #[error("Archive error for {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Job {job_id} was cancelled")]
    Cancelled { job_id: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FxError {
    /// Build a decode error for `path` from any underlying error
    pub fn decode<E>(path: impl Into<String>, reason: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        FxError::Decode {
            path: path.into(),
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::Decode { .. } => "DECODE_ERROR",
            FxError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            FxError::EmptyAudio => "EMPTY_AUDIO",
            FxError::InvalidSampleRate { .. } => "INVALID_SAMPLE_RATE",
            FxError::InvalidParameter { .. } => "INVALID_PARAMETER",
            FxError::DspOverflow { .. } => "DSP_OVERFLOW",
            FxError::EffectApplication { .. } => "EFFECT_APPLICATION_ERROR",
            FxError::Archive { .. } => "ARCHIVE_ERROR",
            FxError::InvalidConfig { .. } => "INVALID_CONFIG",
            FxError::Cancelled { .. } => "CANCELLED",
            FxError::FileNotFound { .. } => "FILE_NOT_FOUND",
            FxError::Io(_) => "IO_ERROR",
            FxError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error only affects a single file or variant.
    ///
    /// Recoverable errors are logged and skipped by the batch processor;
    /// everything else aborts the job.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FxError::Decode { .. }
                | FxError::UnsupportedFormat { .. }
                | FxError::EmptyAudio
                | FxError::InvalidSampleRate { .. }
                | FxError::InvalidParameter { .. }
                | FxError::DspOverflow { .. }
                | FxError::EffectApplication { .. }
        )
    }
}

impl From<hound::Error> for FxError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => FxError::Io(e),
            other => FxError::Decode {
                path: String::from("<wav stream>"),
                reason: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}

impl From<zip::result::ZipError> for FxError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => FxError::Io(e),
            other => FxError::Archive {
                path: PathBuf::new(),
                reason: other.to_string(),
            },
        }
    }
}
