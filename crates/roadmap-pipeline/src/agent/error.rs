//! Error types for the agent module.

use super::gate::GateClosed;
use crate::service::ServiceError;
use thiserror::Error;

/// Errors that can occur during agent execution.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A collaborator call failed, after any retries the policy allowed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// A prompt template failed to render.
    #[error("Failed to render prompt: {0}")]
    Template(#[from] minijinja::Error),

    /// The JSON schema for a response type could not be produced.
    #[error("Failed to build response schema: {0}")]
    Schema(String),

    #[error(transparent)]
    Gate(#[from] GateClosed),

    /// The task running the agent panicked or was aborted.
    #[error("Agent task failed: {0}")]
    TaskFailed(String),
}

impl AgentError {
    /// Short label used in spans and structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Service(e) => e.kind(),
            AgentError::Template(_) => "template",
            AgentError::Schema(_) => "schema",
            AgentError::Gate(_) => "gate_closed",
            AgentError::TaskFailed(_) => "task_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_errors_are_transparent() {
        let err = AgentError::from(ServiceError::Network("reset".into()));
        assert_eq!(err.to_string(), "Network error: reset");
        assert_eq!(err.kind(), "network");
    }

    #[test]
    fn test_kind_of_quota() {
        let err = AgentError::from(ServiceError::QuotaExhausted("daily".into()));
        assert_eq!(err.kind(), "quota_exhausted");
    }

    #[test]
    fn test_kind_of_local_failures() {
        assert_eq!(AgentError::Schema("unsupported type".into()).kind(), "schema");
        assert_eq!(AgentError::from(GateClosed).kind(), "gate_closed");
        assert_eq!(AgentError::TaskFailed("panicked".into()).kind(), "task_failed");
    }
}
