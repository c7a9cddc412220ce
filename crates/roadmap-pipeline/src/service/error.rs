//! Error types for external collaborators.

use thiserror::Error;

/// Failures reported by the generation, video and persistence backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Connection, timeout, rate-limit or 5xx failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The backend's quota for this key is spent. Retrying the same call will not help.
    #[error("Quota exhausted: {0}")]
    QuotaExhausted(String),

    /// The backend answered, but not with the structure that was asked for.
    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    /// Anything else: bad credentials, rejected request, unknown failure.
    #[error("Fatal service error: {0}")]
    Fatal(String),
}

impl ServiceError {
    /// Check if this error should trigger an automatic retry.
    ///
    /// Network failures and malformed structured output are transient for a
    /// generative backend. Quota exhaustion and fatal errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::Network(_) | ServiceError::SchemaValidation(_)
        )
    }

    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, ServiceError::QuotaExhausted(_))
    }

    /// Short label used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Network(_) => "network",
            ServiceError::QuotaExhausted(_) => "quota_exhausted",
            ServiceError::SchemaValidation(_) => "schema_validation",
            ServiceError::Fatal(_) => "fatal",
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SchemaValidation(err.to_string())
    }
}
