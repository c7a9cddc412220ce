//! Contracts for the external collaborators the pipeline depends on.
//!
//! The pipeline never talks to a network directly. Every generation call,
//! video lookup and save goes through one of the traits below, which keeps the
//! orchestrator testable with scripted in-process doubles. HTTP-backed
//! implementations live behind the `gemini-api` and `youtube-api` features.

pub mod error;
pub mod memory;

#[cfg(feature = "gemini-api")]
pub mod gemini;
#[cfg(feature = "youtube-api")]
pub mod youtube;

pub use error::ServiceError;
pub use memory::InMemoryRoadmapStore;

use crate::agent::profile::{AgentRole, ModelProfile};
use crate::language::Language;
use crate::models::{ResearchedSession, SessionOutline, ValidationResult};
use crate::orchestrator::state::FixAttemptRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One structured-output request to the generation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The agent role making the call.
    pub role: AgentRole,
    pub system_prompt: String,
    pub prompt: String,
    /// JSON schema the response must satisfy.
    pub schema: Option<JsonValue>,
    pub profile: ModelProfile,
}

impl GenerationRequest {
    pub fn new(
        role: AgentRole,
        system_prompt: impl Into<String>,
        prompt: impl Into<String>,
        profile: ModelProfile,
    ) -> Self {
        Self {
            role,
            system_prompt: system_prompt.into(),
            prompt: prompt.into(),
            schema: None,
            profile,
        }
    }

    pub fn with_schema(mut self, schema: JsonValue) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Text generation backend returning structured JSON.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Generates a JSON value for the request.
    ///
    /// Implementations report malformed output as [`ServiceError::SchemaValidation`]
    /// so that the caller's retry policy can treat it as transient.
    async fn generate(&self, request: GenerationRequest) -> Result<JsonValue, ServiceError>;
}

/// A search hit from the video provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoCandidate {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// Quota-limited video search.
#[async_trait]
pub trait VideoSearchService: Send + Sync {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        language: Language,
    ) -> Result<Vec<VideoCandidate>, ServiceError>;
}

/// Metadata returned by an existence check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub author_name: String,
    pub thumbnail_url: Option<String>,
}

/// Unauthenticated existence check for a video URL.
#[async_trait]
pub trait VideoVerifier: Send + Sync {
    /// Returns `None` when the video cannot be confirmed to exist.
    async fn verify(&self, url: &str) -> Option<VideoMetadata>;
}

/// Everything handed to the store at the end of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadmapDraft {
    pub pipeline_id: String,
    pub user_id: String,
    pub title: String,
    pub topic: String,
    pub language: Language,
    pub outline: SessionOutline,
    pub sessions: Vec<ResearchedSession>,
    pub validation_result: Option<ValidationResult>,
    pub fix_history: Vec<FixAttemptRecord>,
}

/// Persistence collaborator. Returns an opaque roadmap id.
#[async_trait]
pub trait RoadmapStore: Send + Sync {
    async fn save(&self, draft: RoadmapDraft) -> Result<String, ServiceError>;
}
