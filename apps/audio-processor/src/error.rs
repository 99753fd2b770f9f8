//! Error handling for the audio processor
//!
//! One error type for every stage a job goes through, from ingress decoding
//! to the final upload. Per-job errors end up as the job's `error` message,
//! so their display text is what users see.

use thiserror::Error;

use crate::jobs::JobStatus;

/// Main processor error type
#[derive(Error, Debug)]
pub enum WorkerError {
    // ========== Ingress / Record Errors ==========
    /// Ingress message could not be decoded into a job request
    #[error("invalid job message: {0}")]
    Decode(String),

    /// A stored job record is missing fields or has unparseable values
    #[error("malformed job record '{job_id}': {reason}")]
    MalformedRecord { job_id: String, reason: String },

    /// A status change the job state machine does not allow
    #[error("illegal transition for job '{job_id}': {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    // ========== Store Errors ==========
    /// The job store could not be reached
    #[error("job store unavailable: {0}")]
    StoreUnavailable(String),

    // ========== Pipeline Errors ==========
    /// Fetching the source audio failed
    #[error("download failed for '{url}': {reason}")]
    Download { url: String, reason: String },

    /// Uploading an artifact to object storage failed
    #[error("upload failed for '{key}': {reason}")]
    Upload { key: String, reason: String },

    /// The separation model failed
    #[error("separation failed: {0}")]
    Separation(String),

    /// Mixing stems into the quiz render failed
    #[error("mixing failed: {0}")]
    Mixing(String),

    /// The core API returned an error
    #[error("core API error: {0}")]
    CoreApi(#[from] multitune_core_api_client::CoreApiError),

    /// The track's audio source cannot be resolved
    #[error("unsupported track source: {0}")]
    UnsupportedSource(String),

    // ========== Transport Errors ==========
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// File system access error
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    // ========== Configuration Errors ==========
    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    // ========== Internal Errors ==========
    /// Internal error (catch-all, including pipeline panics)
    #[error("internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    /// Check if this error is retryable
    ///
    /// Only store failures are retried in-process (on the next tick or the
    /// next message). Pipeline failures are terminal for the job.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StoreUnavailable(_) => true,
            Self::CoreApi(e) => e.is_retryable(),
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Get a severity level for logging
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Configuration(_) => ErrorSeverity::Critical,

            Self::StoreUnavailable(_) | Self::Internal(_) | Self::Io(_) => ErrorSeverity::Error,

            Self::Download { .. }
            | Self::Upload { .. }
            | Self::Separation(_)
            | Self::Mixing(_)
            | Self::CoreApi(_)
            | Self::Http(_)
            | Self::MalformedRecord { .. } => ErrorSeverity::Warning,

            Self::Decode(_) | Self::InvalidTransition { .. } | Self::UnsupportedSource(_) => {
                ErrorSeverity::Info
            }
        }
    }

    /// Get the pipeline stage this error relates to, if applicable
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::Decode(_) => Some("ingress"),
            Self::StoreUnavailable(_) | Self::MalformedRecord { .. } => Some("store"),
            Self::Download { .. } | Self::UnsupportedSource(_) => Some("download"),
            Self::Separation(_) => Some("separation"),
            Self::Mixing(_) => Some("mixing"),
            Self::Upload { .. } => Some("upload"),
            Self::CoreApi(_) => Some("report"),
            _ => None,
        }
    }

    /// Log the error with appropriate severity
    pub fn log(&self) {
        let stage = self.stage().unwrap_or("general");
        match self.severity() {
            ErrorSeverity::Critical => {
                tracing::error!(error = %self, stage, retryable = self.is_retryable(), "Critical processor error");
            }
            ErrorSeverity::Error => {
                tracing::error!(error = %self, stage, retryable = self.is_retryable(), "Processor error");
            }
            ErrorSeverity::Warning => {
                tracing::warn!(error = %self, stage, retryable = self.is_retryable(), "Processor warning");
            }
            ErrorSeverity::Info => {
                tracing::info!(error = %self, stage, retryable = self.is_retryable(), "Processor info");
            }
        }
    }

    /// Create a download error
    pub fn download(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Download {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create an upload error
    pub fn upload(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Upload {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed record error
    pub fn malformed(job_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            job_id: job_id.into(),
            reason: reason.into(),
        }
    }
}

/// Error severity levels for logging and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical errors that should trigger alerts
    Critical,
    /// Standard errors
    Error,
    /// Warnings for expected failures
    Warning,
    /// Informational messages
    Info,
}

/// Result type alias for processor operations
pub type WorkerResult<T> = Result<T, WorkerError>;

// ========== Conversion Implementations ==========

impl From<redis::RedisError> for WorkerError {
    fn from(err: redis::RedisError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for WorkerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<multitune_shared_config::ConfigError> for WorkerError {
    fn from(err: multitune_shared_config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<tokio::task::JoinError> for WorkerError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            Self::Internal("processing task panicked".to_string())
        } else {
            Self::Internal(format!("processing task aborted: {}", err))
        }
    }
}
