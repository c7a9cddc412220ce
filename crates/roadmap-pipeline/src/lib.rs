//! `roadmap-pipeline` - turns a short topic description into a structured,
//! multi-session learning roadmap.
//!
//! The crate coordinates a set of single-purpose agents (interviewer,
//! architect, researcher, validator, editor, video finder) against generation
//! and video backends that are slow, rate limited and occasionally wrong.
//! The interesting parts are not the prompts but the plumbing around them:
//!
//! - a fixed stage sequence with a bounded validate-and-repair loop
//!   ([`orchestrator`]),
//! - a shared concurrency gate for every fan-out call ([`agent::gate`]),
//! - classification-aware retry with capped exponential backoff
//!   ([`agent::retry`]),
//! - a sticky switch from video search to generate-and-verify once the search
//!   quota runs out ([`agent::video_finder`]),
//! - ordered, backpressured progress events for a single consumer
//!   ([`orchestrator::events`]).
//!
//! External systems are reached only through the traits in [`service`].
//! HTTP implementations for Gemini and YouTube are available behind the
//! `gemini-api` and `youtube-api` features.

pub mod agent;
pub mod extract;
pub mod language;
pub mod models;
pub mod observability;
pub mod orchestrator;
pub mod prompt;
pub mod service;

pub use agent::{
    Agent, AgentContext, AgentError, AgentRole, ConcurrencyGate, ModelProfile, RetryExecutor,
    RetryPolicy, VideoFallbackMode,
};
pub use extract::{ParseError, extract_json};
pub use language::{Language, detect_language};
pub use models::{
    ExampleOption, InterviewAnswer, InterviewQuestion, IssueType, ResearchedSession,
    SessionOutline, SessionOutlineItem, SessionType, Severity, ValidationIssue, ValidationResult,
    VideoResource,
};
pub use orchestrator::{
    AgentTrace, PipelineConfig, PipelineError, PipelineOrchestrator, PipelineOutcome,
    PipelineRun, PipelineStage, PipelineState, ProgressEvent, ProgressStream,
};
pub use service::{
    GenerationRequest, GenerationService, InMemoryRoadmapStore, RoadmapDraft, RoadmapStore,
    ServiceError, VideoCandidate, VideoMetadata, VideoSearchService, VideoVerifier,
};
