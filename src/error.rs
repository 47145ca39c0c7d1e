//! Draupnir error types

use std::time::Duration;

use crate::types::OutputFormat;

/// Draupnir error types
#[derive(Debug, thiserror::Error)]
pub enum DraupnirError {
    // Template errors
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("template '{template_id}' is missing required variables: {}", missing.join(", "))]
    MissingRequiredVariables {
        template_id: String,
        missing: Vec<String>,
    },

    // Backend errors (retryable)
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("backend timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    // Backend errors (permanent)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// All retry attempts were consumed by transient failures.
    #[error("backend failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    // Output errors
    #[error("response is not valid {format}: {message}")]
    FormatValidation {
        format: OutputFormat,
        message: String,
    },

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// A failure previously recorded by a cache with failure caching enabled.
    #[error("cached failure: {0}")]
    CachedFailure(String),

    // Candidate pipeline errors
    #[error("no candidates generated")]
    NoCandidatesGenerated,

    #[error("candidate validation failed: {0}")]
    CandidateValidation(String),

    #[error("operation cancelled")]
    Cancelled,

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl DraupnirError {
    /// Whether this error is transient and the failed call may be retried.
    ///
    /// This is the only classification the retry loop consults.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DraupnirError::RateLimited { .. }
                | DraupnirError::Timeout(_)
                | DraupnirError::Network(_)
        )
    }

    /// Backend-supplied delay hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            DraupnirError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Whether this error is the result of a cancellation request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DraupnirError::Cancelled)
    }
}

/// Result type alias for Draupnir operations
pub type Result<T> = std::result::Result<T, DraupnirError>;
