//! Error types for auditrag
//!
//! Two tiers: `CapabilityError` describes a failed call into an external
//! capability and is usually recovered locally; `PipelineError` is what a
//! run returns when no meaningful answer can be produced.

use thiserror::Error;

/// Failure of a single external capability call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapabilityError {
    /// The call did not complete within the caller-supplied bound
    #[error("{capability} timed out after {duration_ms}ms")]
    Timeout {
        capability: String,
        duration_ms: u64,
    },

    /// The call failed but a later call may succeed
    #[error("{capability} failed: {message}")]
    Transient { capability: String, message: String },

    /// The capability cannot be reached at all
    #[error("{capability} is unavailable: {message}")]
    Unavailable { capability: String, message: String },

    /// The capability rejected the request shape
    #[error("{capability} rejected the request: {message}")]
    InvalidRequest { capability: String, message: String },
}

impl CapabilityError {
    pub fn transient(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            capability: capability.into(),
            message: message.into(),
        }
    }

    pub fn unavailable(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            capability: capability.into(),
            message: message.into(),
        }
    }

    pub fn invalid(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            capability: capability.into(),
            message: message.into(),
        }
    }

    /// Only an unreachable capability aborts a run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Name of the capability that failed
    pub fn capability(&self) -> &str {
        match self {
            Self::Timeout { capability, .. }
            | Self::Transient { capability, .. }
            | Self::Unavailable { capability, .. }
            | Self::InvalidRequest { capability, .. } => capability,
        }
    }
}

/// Main error type for pipeline runs
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A required capability is unreachable
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(CapabilityError),

    /// A capability call failed where no fallback applies
    #[error("Capability failed: {0}")]
    CapabilityFailed(CapabilityError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Corpus loading errors
    #[error("Corpus error: {0}")]
    CorpusError(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic errors with context
    #[error("Pipeline error: {0}")]
    Generic(String),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Convert anyhow errors to PipelineError
impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Generic(err.to_string())
    }
}

impl From<CapabilityError> for PipelineError {
    fn from(err: CapabilityError) -> Self {
        if err.is_fatal() {
            PipelineError::CapabilityUnavailable(err)
        } else {
            PipelineError::CapabilityFailed(err)
        }
    }
}
