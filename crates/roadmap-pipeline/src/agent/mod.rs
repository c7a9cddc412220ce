//! Agents: stateless request/response steps over the generation backend.
//!
//! Each agent turns one typed request into one typed result. Agents never
//! touch [`PipelineState`](crate::orchestrator::state::PipelineState); the
//! orchestrator decides what to keep.
//!
//! Everything an agent needs from the outside world is carried by an
//! [`AgentContext`]: the collaborator handles, the shared
//! [`ConcurrencyGate`], the [`RetryExecutor`], per-role [`ModelProfile`]s and
//! the sticky [`VideoFallbackMode`]. Agents built from clones of the same
//! context share the gate and the fallback flag.

pub mod architect;
pub mod editor;
pub mod error;
pub mod gate;
pub mod interviewer;
pub mod profile;
pub mod researcher;
pub mod retry;
pub mod validator;
pub mod video_finder;

pub use architect::ArchitectAgent;
pub use editor::EditorAgent;
pub use error::AgentError;
pub use gate::{ConcurrencyGate, GateClosed, GatePermit};
pub use interviewer::InterviewerAgent;
pub use profile::{AgentRole, GeminiModel, ModelProfile};
pub use researcher::ResearcherAgent;
pub use retry::{RetryExecutor, RetryPolicy, retry_execution};
pub use validator::ValidatorAgent;
pub use video_finder::{VideoFallbackMode, VideoFinderAgent};

use crate::service::{
    GenerationRequest, GenerationService, ServiceError, VideoSearchService, VideoVerifier,
};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;

/// A single step of the roadmap pipeline.
#[async_trait]
pub trait Agent: Send + Sync {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// The role this agent plays, which also selects its model profile.
    fn role(&self) -> AgentRole;

    /// Name recorded in the agent trace.
    fn name(&self) -> String {
        self.role().to_string()
    }

    async fn execute(&self, input: Self::Input) -> Result<Self::Output, AgentError>;
}

/// Shared handles and policies for every agent of a pipeline.
#[derive(Clone)]
pub struct AgentContext {
    pub generation: Arc<dyn GenerationService>,
    pub video_search: Arc<dyn VideoSearchService>,
    pub video_verifier: Arc<dyn VideoVerifier>,
    pub gate: ConcurrencyGate,
    pub retry: RetryExecutor,
    pub fallback_mode: VideoFallbackMode,
    profiles: HashMap<AgentRole, ModelProfile>,
}

impl AgentContext {
    pub fn new(
        generation: Arc<dyn GenerationService>,
        video_search: Arc<dyn VideoSearchService>,
        video_verifier: Arc<dyn VideoVerifier>,
    ) -> Self {
        Self {
            generation,
            video_search,
            video_verifier,
            gate: ConcurrencyGate::default(),
            retry: RetryExecutor::default(),
            fallback_mode: VideoFallbackMode::default(),
            profiles: HashMap::new(),
        }
    }

    pub fn with_gate(mut self, gate: ConcurrencyGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = RetryExecutor::new(policy);
        self
    }

    /// Shares an existing fallback flag, e.g. one owned by a long-lived service.
    pub fn with_fallback_mode(mut self, fallback_mode: VideoFallbackMode) -> Self {
        self.fallback_mode = fallback_mode;
        self
    }

    pub fn with_profile(mut self, role: AgentRole, profile: ModelProfile) -> Self {
        self.profiles.insert(role, profile);
        self
    }

    /// Profile for `role`: the override if one was set, the role default otherwise.
    pub fn profile(&self, role: AgentRole) -> ModelProfile {
        self.profiles
            .get(&role)
            .cloned()
            .unwrap_or_else(|| ModelProfile::for_role(role))
    }

    /// One structured generation call with retries, decoded into `T`.
    ///
    /// The response schema is derived from `T`. A response that does not
    /// decode into `T` counts as [`ServiceError::SchemaValidation`] and is
    /// retried like any other transient failure.
    pub async fn generate_structured<T>(
        &self,
        role: AgentRole,
        system_prompt: &str,
        prompt: String,
    ) -> Result<T, AgentError>
    where
        T: DeserializeOwned + JsonSchema + Send,
    {
        self.generate_validated(role, system_prompt, prompt, |_: &T| Ok(()))
            .await
    }

    /// Like [`generate_structured`](Self::generate_structured), with an extra
    /// check on the decoded value. A rejected value is retried as a schema failure.
    pub async fn generate_validated<T, V>(
        &self,
        role: AgentRole,
        system_prompt: &str,
        prompt: String,
        validate: V,
    ) -> Result<T, AgentError>
    where
        T: DeserializeOwned + JsonSchema + Send,
        V: Fn(&T) -> Result<(), String> + Send + Sync,
    {
        let schema = serde_json::to_value(schemars::schema_for!(T))
            .map_err(|e| AgentError::Schema(e.to_string()))?;
        let request = GenerationRequest::new(role, system_prompt, prompt, self.profile(role))
            .with_schema(schema);

        let value = self
            .retry
            .execute(
                || {
                    let request = request.clone();
                    let validate = &validate;
                    async move {
                        let value = self.generation.generate(request).await?;
                        let decoded = serde_json::from_value::<T>(value)?;
                        validate(&decoded).map_err(ServiceError::SchemaValidation)?;
                        Ok::<T, ServiceError>(decoded)
                    }
                },
                ServiceError::is_retryable,
            )
            .await?;
        Ok(value)
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("gate_capacity", &self.gate.capacity())
            .field("retry", self.retry.policy())
            .field("fallback_active", &self.fallback_mode.is_active())
            .field("profiles", &self.profiles)
            .finish_non_exhaustive()
    }
}
