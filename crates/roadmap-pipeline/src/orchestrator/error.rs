//! Error types for pipeline runs.

use super::state::PipelineStage;
use crate::agent::AgentError;
use crate::service::ServiceError;
use thiserror::Error;

/// Why a run ended in [`PipelineStage::Error`]. The display string is the
/// message of the terminal `error` event.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage-aborting agent call failed.
    #[error("{stage} failed: {source}")]
    Stage {
        stage: PipelineStage,
        #[source]
        source: AgentError,
    },

    /// Every per-session call of a degrading stage failed.
    #[error("{stage} failed for all {failures} sessions: {first_error}")]
    AllSessionsFailed {
        stage: PipelineStage,
        failures: usize,
        first_error: String,
    },

    #[error("Failed to save roadmap: {0}")]
    Persistence(#[source] ServiceError),

    #[error("Roadmap store returned an empty id")]
    EmptyRoadmapId,

    /// A stage ran without the data an earlier stage should have produced.
    #[error("Invalid pipeline state: {0}")]
    InvalidState(String),

    /// The spawned run panicked or was aborted.
    #[error("Pipeline task failed: {0}")]
    TaskFailed(String),
}

impl PipelineError {
    pub fn stage(stage: PipelineStage, source: AgentError) -> Self {
        Self::Stage { stage, source }
    }

    /// The stage the failure belongs to, when there is one.
    pub fn failed_stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Stage { stage, .. } | Self::AllSessionsFailed { stage, .. } => Some(*stage),
            Self::Persistence(_) | Self::EmptyRoadmapId => Some(PipelineStage::Saving),
            Self::InvalidState(_) | Self::TaskFailed(_) => None,
        }
    }
}
