//! The stage controller that turns a topic into a saved roadmap.
//!
//! A run walks a fixed sequence of stages:
//!
//! ```text
//! Initialized → Interviewing → Architecting → Researching → FindingVideos
//!             → Validating → (Revising → Validating)* → Saving → Complete
//! ```
//!
//! Any stage may end in `Error`. Per-session work (outline details, research,
//! video lookups, edits) fans out as spawned tasks collected through a
//! [`FuturesUnordered`]; the agents themselves take slots from the shared
//! [`ConcurrencyGate`], so the fan-out width never exceeds the gate capacity
//! however many sessions there are.
//!
//! Only the controller mutates [`PipelineState`], and only between fan-outs.
//!
//! # Example
//!
//! ```rust,ignore
//! use roadmap_pipeline::orchestrator::{PipelineConfig, PipelineOrchestrator};
//! use futures::StreamExt;
//!
//! let orchestrator =
//!     PipelineOrchestrator::new(generation, search, verifier, store, PipelineConfig::default());
//! let state = orchestrator.initialize("Learn Python basics", "user-1");
//! let mut run = orchestrator.run_pipeline(state);
//! while let Some(event) = run.events.next().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! let outcome = run.outcome.await?;
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod journal;
pub mod state;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use events::{EventSender, ProgressEvent, ProgressStream, progress_channel};
pub use journal::{AgentSpan, AgentTrace, SpanStatus, TraceStatus};
pub use state::{FixAttemptRecord, PipelineStage, PipelineState};

use crate::agent::architect::{DetailsRequest, OutlineRequest, SessionDetails, assemble_outline};
use crate::agent::editor::EditRequest;
use crate::agent::interviewer::InterviewRequest;
use crate::agent::researcher::ResearchRequest;
use crate::agent::validator::ValidationRequest;
use crate::agent::video_finder::VideoRequest;
use crate::agent::{
    Agent, AgentContext, AgentError, ArchitectAgent, ConcurrencyGate, EditorAgent,
    InterviewerAgent, ResearcherAgent, ValidatorAgent, VideoFinderAgent,
};
use crate::models::{SessionOutline, ValidationResult};
use crate::service::{
    GenerationService, RoadmapDraft, RoadmapStore, ServiceError, VideoSearchService,
    VideoVerifier,
};
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use journal::{OpenSpan, SpanSummary};
use state::FixedIssue;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

const COMPLETE_MESSAGE: &str = "Roadmap created successfully!";

/// Final state and agent trace of a run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub state: PipelineState,
    pub trace: AgentTrace,
}

impl PipelineOutcome {
    pub fn is_complete(&self) -> bool {
        self.state.stage == PipelineStage::Complete
    }

    pub fn roadmap_id(&self) -> Option<&str> {
        self.state.roadmap_id.as_deref()
    }
}

/// A spawned run: its progress events and its eventual outcome.
///
/// Dropping `events` before the run finishes abandons the run.
#[derive(Debug)]
pub struct PipelineRun {
    pub pipeline_id: String,
    pub events: ProgressStream,
    pub outcome: JoinHandle<PipelineOutcome>,
}

impl PipelineRun {
    /// Stops the run before its next stage transition. In-flight calls finish.
    pub fn abandon(&self) {
        self.events.abandon();
    }

    /// Drains every event, then waits for the run to finish.
    pub async fn collect(mut self) -> Result<(Vec<ProgressEvent>, PipelineOutcome), PipelineError> {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        let outcome = self
            .outcome
            .await
            .map_err(|e| PipelineError::TaskFailed(e.to_string()))?;
        Ok((events, outcome))
    }
}

/// Why the controller stopped before `Complete`.
enum Halt {
    Abandoned,
    Failed(PipelineError),
}

impl From<PipelineError> for Halt {
    fn from(err: PipelineError) -> Self {
        Halt::Failed(err)
    }
}

/// Result of one traced agent invocation inside a fan-out.
struct Traced<T> {
    index: usize,
    span: AgentSpan,
    result: Result<T, AgentError>,
}

/// Drives pipeline runs. Cheap to clone; clones share the gate, the video
/// fallback flag and every collaborator.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    ctx: AgentContext,
    store: Arc<dyn RoadmapStore>,
    config: PipelineConfig,
    interviewer: InterviewerAgent,
    architect: ArchitectAgent,
    researcher: ResearcherAgent,
    validator: ValidatorAgent,
    editor: EditorAgent,
    video_finder: VideoFinderAgent,
}

impl PipelineOrchestrator {
    /// Builds a fresh agent context sized by `config`.
    pub fn new(
        generation: Arc<dyn GenerationService>,
        video_search: Arc<dyn VideoSearchService>,
        video_verifier: Arc<dyn VideoVerifier>,
        store: Arc<dyn RoadmapStore>,
        config: PipelineConfig,
    ) -> Self {
        let ctx = AgentContext::new(generation, video_search, video_verifier)
            .with_gate(ConcurrencyGate::new(config.max_concurrent_calls))
            .with_retry_policy(config.retry);
        Self::with_context(ctx, store, config)
    }

    /// Uses an existing context, so several orchestrators can share one gate
    /// and one fallback flag. Gate capacity and retry policy come from `ctx`.
    pub fn with_context(
        ctx: AgentContext,
        store: Arc<dyn RoadmapStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            interviewer: InterviewerAgent::new(ctx.clone()),
            architect: ArchitectAgent::new(ctx.clone()),
            researcher: ResearcherAgent::new(ctx.clone()),
            validator: ValidatorAgent::new(ctx.clone()),
            editor: EditorAgent::new(ctx.clone()),
            video_finder: VideoFinderAgent::new(ctx.clone()),
            ctx,
            store,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn context(&self) -> &AgentContext {
        &self.ctx
    }

    /// Creates the state for a new run.
    pub fn initialize(&self, topic: impl Into<String>, user_id: impl Into<String>) -> PipelineState {
        let state = PipelineState::new(topic, user_id);
        info!(
            pipeline_id = %state.id,
            language = state.language.code(),
            "Pipeline initialized"
        );
        state
    }

    /// Spawns the run and returns its event stream and outcome handle.
    pub fn run_pipeline(&self, state: PipelineState) -> PipelineRun {
        let (sender, events) = progress_channel(self.config.event_buffer);
        let pipeline_id = state.id.clone();
        let orchestrator = self.clone();
        let outcome = tokio::spawn(async move { orchestrator.execute(state, sender).await });
        PipelineRun {
            pipeline_id,
            events,
            outcome,
        }
    }

    /// Runs the pipeline in place, reporting progress through `events`.
    pub async fn execute(&self, mut state: PipelineState, events: EventSender) -> PipelineOutcome {
        let span = info_span!(
            "pipeline_run",
            pipeline_id = %state.id,
            topic = %state.topic,
            language = state.language.code(),
        );

        async move {
            info!("Pipeline started");
            let mut trace = AgentTrace::new(&state);

            let status = match self.drive(&mut state, &mut trace, &events).await {
                Ok(()) => {
                    info!(roadmap_id = ?state.roadmap_id, "Pipeline complete");
                    TraceStatus::Success
                }
                Err(Halt::Abandoned) => {
                    info!(stage = %state.stage, "Consumer gone, pipeline abandoned");
                    TraceStatus::Abandoned
                }
                Err(Halt::Failed(e)) => {
                    error!(stage = %state.stage, error = %e, "Pipeline failed");
                    let message = e.to_string();
                    state.fail(message.clone());
                    events.send(ProgressEvent::Error { message }).await;
                    TraceStatus::Error
                }
            };

            trace.finish(status, &state);
            PipelineOutcome { state, trace }
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        state: &mut PipelineState,
        trace: &mut AgentTrace,
        events: &EventSender,
    ) -> Result<(), Halt> {
        self.interview(state, trace, events).await?;
        self.design_outline(state, trace, events).await?;
        self.research_sessions(state, trace, events).await?;
        self.find_videos(state, trace, events).await?;
        self.validate_and_repair(state, trace, events).await?;
        let roadmap_id = self.save(state, events).await?;

        if events.is_abandoned() {
            return Err(Halt::Abandoned);
        }
        state.transition(PipelineStage::Complete);
        events
            .send(ProgressEvent::Complete {
                roadmap_id,
                message: COMPLETE_MESSAGE.to_string(),
            })
            .await;
        Ok(())
    }

    /// Moves to `stage` and announces it, unless the run was abandoned.
    async fn enter(
        &self,
        state: &mut PipelineState,
        events: &EventSender,
        stage: PipelineStage,
        message: impl Into<String>,
        attempt: Option<u32>,
    ) -> Result<(), Halt> {
        if events.is_abandoned() {
            return Err(Halt::Abandoned);
        }
        state.transition(stage);
        info!(stage = %stage, "Stage started");
        events
            .send(ProgressEvent::StageUpdate {
                stage,
                message: message.into(),
                attempt,
                max_attempts: attempt.map(|_| self.config.max_fix_attempts),
            })
            .await;
        Ok(())
    }

    async fn interview(
        &self,
        state: &mut PipelineState,
        trace: &mut AgentTrace,
        events: &EventSender,
    ) -> Result<(), Halt> {
        let skip = !state.interview_questions.is_empty() || self.config.interview_questions == 0;
        let message = if skip {
            "Reviewing your answers..."
        } else {
            "Preparing clarifying questions..."
        };
        self.enter(state, events, PipelineStage::Interviewing, message, None)
            .await?;
        if skip {
            debug!(
                questions = state.interview_questions.len(),
                answers = state.interview_answers.len(),
                "Skipping interviewer"
            );
            return Ok(());
        }

        let request = InterviewRequest {
            topic: state.topic.clone(),
            language: state.language,
            max_questions: self.config.interview_questions,
        };
        let questions = traced_call(
            trace,
            &self.interviewer.name(),
            "generate_questions",
            self.interviewer.execute(request),
        )
        .await
        .map_err(|e| PipelineError::stage(PipelineStage::Interviewing, e))?;

        info!(questions = questions.len(), "Interview questions ready");
        state.interview_questions = questions;
        Ok(())
    }

    async fn design_outline(
        &self,
        state: &mut PipelineState,
        trace: &mut AgentTrace,
        events: &EventSender,
    ) -> Result<(), Halt> {
        self.enter(
            state,
            events,
            PipelineStage::Architecting,
            "Designing your learning path...",
            None,
        )
        .await?;

        let agent = self.architect.name();
        let request = OutlineRequest {
            topic: state.topic.clone(),
            language: state.language,
            answers: state.answered_questions(),
        };
        let draft = traced_call(
            trace,
            &agent,
            "create_outline",
            self.architect.create_outline_phase1(request),
        )
        .await
        .map_err(|e| PipelineError::stage(PipelineStage::Architecting, e))?;

        if !draft.title.is_empty() {
            state.suggested_title = Some(draft.title.clone());
            events
                .send(ProgressEvent::TitleSuggestion {
                    suggested_title: draft.title.clone(),
                })
                .await;
        }

        let sibling_titles = draft.titles();
        let mut pending: FuturesUnordered<_> = draft
            .sessions
            .iter()
            .enumerate()
            .map(|(index, seed)| {
                let architect = self.architect.clone();
                let request = DetailsRequest {
                    topic: state.topic.clone(),
                    language: state.language,
                    sibling_titles: sibling_titles.clone(),
                    index,
                    seed: seed.clone(),
                };
                spawn_traced(
                    &agent,
                    "session_details",
                    index,
                    info_span!("session_details", index, title = %seed.title),
                    async move { architect.session_details(request).await },
                )
            })
            .collect();

        let mut details: Vec<Option<SessionDetails>> = vec![None; draft.sessions.len()];
        let mut failures = Vec::new();
        while let Some(traced) = pending.next().await {
            trace.record(traced.span);
            match traced.result {
                Ok(detail) => details[traced.index] = Some(detail),
                Err(e) => {
                    warn!(index = traced.index, error = %e, "Session details failed");
                    failures.push((traced.index, e));
                }
            }
        }
        if let Some(e) = first_failure(failures) {
            return Err(PipelineError::stage(PipelineStage::Architecting, e).into());
        }

        let details: Vec<SessionDetails> = details.into_iter().flatten().collect();
        if details.len() != draft.sessions.len() {
            return Err(PipelineError::InvalidState(format!(
                "{} of {} session details resolved",
                details.len(),
                draft.sessions.len()
            ))
            .into());
        }

        let outline = assemble_outline(&draft, details);
        info!(
            sessions = outline.len(),
            hours = outline.total_estimated_hours,
            "Outline created"
        );
        events
            .send(ProgressEvent::StageComplete {
                stage: PipelineStage::Architecting,
                summary: format!("Designed {} sessions", outline.len()),
            })
            .await;
        state.session_outline = Some(outline);
        Ok(())
    }

    async fn research_sessions(
        &self,
        state: &mut PipelineState,
        trace: &mut AgentTrace,
        events: &EventSender,
    ) -> Result<(), Halt> {
        let outline = require_outline(state)?;
        let total = outline.len();
        self.enter(
            state,
            events,
            PipelineStage::Researching,
            format!("Researching {total} sessions..."),
            None,
        )
        .await?;

        let agent = self.researcher.name();
        let siblings = outline.briefs();
        let mut pending: FuturesUnordered<_> = outline
            .sessions
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let researcher = self.researcher.clone();
                let request = ResearchRequest {
                    topic: state.topic.clone(),
                    language: state.language,
                    item: item.clone(),
                    siblings: siblings.clone(),
                };
                spawn_traced(
                    &agent,
                    "research_session",
                    index,
                    info_span!("research_session", order = item.order, title = %item.title),
                    async move { researcher.execute(request).await },
                )
            })
            .collect();

        let mut sessions = Vec::with_capacity(total);
        let mut failures = Vec::new();
        while let Some(traced) = pending.next().await {
            trace.record(traced.span);
            match traced.result {
                Ok(session) => {
                    events
                        .send(ProgressEvent::SessionProgress {
                            current: sessions.len() + 1,
                            total,
                            session_title: session.title.clone(),
                        })
                        .await;
                    sessions.push(session);
                }
                Err(e) => {
                    warn!(index = traced.index, error = %e, "Session research failed");
                    failures.push((traced.index, e));
                }
            }
        }

        let failed = failures.len();
        if let Some(e) = first_failure(failures) {
            error!(failed, total, "Research stage failed");
            return Err(PipelineError::stage(PipelineStage::Researching, e).into());
        }

        sessions.sort_by_key(|s| s.order);
        info!(sessions = sessions.len(), "Research complete");
        events
            .send(ProgressEvent::StageComplete {
                stage: PipelineStage::Researching,
                summary: format!("Researched {} sessions", sessions.len()),
            })
            .await;
        state.researched_sessions = sessions;
        Ok(())
    }

    async fn find_videos(
        &self,
        state: &mut PipelineState,
        trace: &mut AgentTrace,
        events: &EventSender,
    ) -> Result<(), Halt> {
        self.enter(
            state,
            events,
            PipelineStage::FindingVideos,
            "Finding videos for each session...",
            None,
        )
        .await?;

        let agent = self.video_finder.name();
        let total = state.researched_sessions.len();
        let mut pending: FuturesUnordered<_> = state
            .researched_sessions
            .iter()
            .enumerate()
            .map(|(index, session)| {
                let video_finder = self.video_finder.clone();
                let request = VideoRequest {
                    session_title: session.title.clone(),
                    key_concepts: session.key_concepts.clone(),
                    language: state.language,
                    max_videos: self.config.max_videos_per_session,
                };
                spawn_traced(
                    &agent,
                    "find_videos",
                    index,
                    info_span!("find_videos", order = session.order, title = %session.title),
                    async move { video_finder.execute(request).await },
                )
            })
            .collect();

        let mut found = 0;
        let mut failures = Vec::new();
        while let Some(traced) = pending.next().await {
            trace.record(traced.span);
            match traced.result {
                Ok(lookup) => {
                    found += lookup.videos.len();
                    state.researched_sessions[traced.index].videos = lookup.videos;
                }
                Err(e) => {
                    warn!(
                        index = traced.index,
                        error = %e,
                        "Video lookup failed, continuing without videos"
                    );
                    failures.push((traced.index, e));
                }
            }
        }

        let failed = failures.len();
        if total > 0 && failed == total {
            let first_error = first_failure(failures)
                .map(|e| e.to_string())
                .unwrap_or_default();
            return Err(PipelineError::AllSessionsFailed {
                stage: PipelineStage::FindingVideos,
                failures: failed,
                first_error,
            }
            .into());
        }

        info!(
            videos = found,
            failed,
            fallback = self.ctx.fallback_mode.is_active(),
            "Video lookup complete"
        );
        events
            .send(ProgressEvent::StageComplete {
                stage: PipelineStage::FindingVideos,
                summary: format!("Found {found} videos"),
            })
            .await;
        Ok(())
    }

    async fn validate_and_repair(
        &self,
        state: &mut PipelineState,
        trace: &mut AgentTrace,
        events: &EventSender,
    ) -> Result<(), Halt> {
        let outline = require_outline(state)?;
        let agent = self.validator.name();

        loop {
            self.enter(
                state,
                events,
                PipelineStage::Validating,
                "Validating roadmap quality...",
                None,
            )
            .await?;

            let request = ValidationRequest {
                topic: state.topic.clone(),
                language: state.language,
                outline: outline.clone(),
                sessions: state.researched_sessions.clone(),
            };
            let result = traced_call(
                trace,
                &agent,
                "validate_roadmap",
                self.validator.execute(request),
            )
            .await
            .map_err(|e| PipelineError::stage(PipelineStage::Validating, e))?;

            info!(
                score = result.score,
                issues = result.issues.len(),
                high = result.high_severity_count(),
                valid = result.is_valid,
                fix_attempt = state.fix_attempt,
                "Validation complete"
            );
            events
                .send(ProgressEvent::StageComplete {
                    stage: PipelineStage::Validating,
                    summary: format!("Quality score: {}/100", result.score),
                })
                .await;
            state.validation_result = Some(result.clone());

            if result.is_valid {
                return Ok(());
            }
            if state.fix_attempt >= self.config.max_fix_attempts {
                warn!(
                    attempts = state.fix_attempt,
                    issues = result.issues.len(),
                    "Repair attempts exhausted, saving best content"
                );
                return Ok(());
            }

            self.revise(state, trace, events, &outline, &result).await?;
        }
    }

    async fn revise(
        &self,
        state: &mut PipelineState,
        trace: &mut AgentTrace,
        events: &EventSender,
        outline: &SessionOutline,
        result: &ValidationResult,
    ) -> Result<(), Halt> {
        let attempt = state.fix_attempt + 1;
        self.enter(
            state,
            events,
            PipelineStage::Revising,
            format!(
                "Revising content (attempt {attempt}/{})...",
                self.config.max_fix_attempts
            ),
            Some(attempt),
        )
        .await?;

        let agent = self.editor.name();
        let affected = result.affected_session_ids();
        let siblings = outline.briefs();
        let mut pending: FuturesUnordered<_> = state
            .researched_sessions
            .iter()
            .enumerate()
            .filter(|(_, session)| affected.contains(&session.outline_id))
            .map(|(index, session)| {
                let editor = self.editor.clone();
                let request = EditRequest {
                    topic: state.topic.clone(),
                    language: state.language,
                    session: session.clone(),
                    issues: result.issues_for(&session.outline_id),
                    siblings: siblings.clone(),
                };
                spawn_traced(
                    &agent,
                    "edit_session",
                    index,
                    info_span!("edit_session", attempt, title = %session.title),
                    async move { editor.execute(request).await },
                )
            })
            .collect();

        let (mut edited, mut failed) = (0, 0);
        while let Some(traced) = pending.next().await {
            trace.record(traced.span);
            match traced.result {
                Ok(session) => {
                    state.researched_sessions[traced.index] = session;
                    edited += 1;
                }
                Err(e) => {
                    warn!(
                        index = traced.index,
                        error = %e,
                        "Edit failed, keeping previous content"
                    );
                    failed += 1;
                }
            }
        }

        info!(attempt, edited, failed, "Revision complete");
        state.fix_history.push(FixAttemptRecord {
            attempt,
            issues_count: result.issues.len(),
            affected_session_ids: affected,
            issues: result
                .issues
                .iter()
                .map(|issue| FixedIssue {
                    issue_type: issue.issue_type,
                    severity: issue.severity,
                    description: issue.description.clone(),
                })
                .collect(),
            edited_sessions: edited,
            failed_sessions: failed,
        });
        state.fix_attempt = attempt;
        Ok(())
    }

    async fn save(&self, state: &mut PipelineState, events: &EventSender) -> Result<String, Halt> {
        let outline = require_outline(state)?;
        self.enter(
            state,
            events,
            PipelineStage::Saving,
            "Saving your roadmap...",
            None,
        )
        .await?;

        let draft = RoadmapDraft {
            pipeline_id: state.id.clone(),
            user_id: state.user_id.clone(),
            title: state.roadmap_title(),
            topic: state.topic.clone(),
            language: state.language,
            outline,
            sessions: state.researched_sessions.clone(),
            validation_result: state.validation_result.clone(),
            fix_history: state.fix_history.clone(),
        };
        let roadmap_id = self
            .ctx
            .retry
            .execute(|| self.store.save(draft.clone()), ServiceError::is_retryable)
            .await
            .map_err(PipelineError::Persistence)?;

        if roadmap_id.trim().is_empty() {
            return Err(PipelineError::EmptyRoadmapId.into());
        }
        info!(roadmap_id = %roadmap_id, "Roadmap saved");
        state.roadmap_id = Some(roadmap_id.clone());
        Ok(roadmap_id)
    }
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("ctx", &self.ctx)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn require_outline(state: &PipelineState) -> Result<SessionOutline, PipelineError> {
    state.session_outline.clone().ok_or_else(|| {
        PipelineError::InvalidState(format!("no session outline at stage {}", state.stage))
    })
}

/// The failure of the lowest-indexed session, so reports do not depend on completion order.
fn first_failure(failures: Vec<(usize, AgentError)>) -> Option<AgentError> {
    failures
        .into_iter()
        .min_by_key(|(index, _)| *index)
        .map(|(_, e)| e)
}

/// Runs one agent call in place and records its span.
async fn traced_call<T, Fut>(
    trace: &mut AgentTrace,
    agent: &str,
    operation: &str,
    call: Fut,
) -> Result<T, AgentError>
where
    T: SpanSummary,
    Fut: Future<Output = Result<T, AgentError>>,
{
    let open = OpenSpan::start(agent, operation);
    let result = call.await;
    trace.record(open.close_with(&result));
    result
}

/// Spawns one fan-out call under `span`. A panicked task comes back as a
/// [`AgentError::TaskFailed`] result for the same index.
fn spawn_traced<T, Fut>(
    agent: &str,
    operation: &'static str,
    index: usize,
    span: Span,
    call: Fut,
) -> impl Future<Output = Traced<T>> + Send + 'static
where
    T: SpanSummary + Send + 'static,
    Fut: Future<Output = Result<T, AgentError>> + Send + 'static,
{
    let agent = agent.to_string();
    let open = OpenSpan::start(agent.clone(), operation);
    tokio::spawn(
        async move {
            let result = call.await;
            Traced {
                index,
                span: open.close_with(&result),
                result,
            }
        }
        .instrument(span),
    )
    .map(move |joined| {
        joined.unwrap_or_else(|e| {
            let err = AgentError::TaskFailed(e.to_string());
            Traced {
                index,
                span: OpenSpan::start(agent, operation).close(SpanStatus::Error, None, Some(&err)),
                result: Err(err),
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_failure_prefers_lowest_index() {
        let failures = vec![
            (3, AgentError::Schema("third".into())),
            (1, AgentError::Schema("first".into())),
        ];
        let err = first_failure(failures).unwrap();
        assert_eq!(err.to_string(), "Failed to build response schema: first");
        assert!(first_failure(Vec::new()).is_none());
    }

    #[tokio::test]
    async fn test_spawn_traced_reports_panics() {
        let traced: Traced<ValidationResult> = spawn_traced(
            "validator",
            "validate_roadmap",
            4,
            Span::none(),
            async {
                if std::hint::black_box(true) {
                    panic!("boom");
                }
                Err(AgentError::Schema("unreachable".into()))
            },
        )
        .await;
        assert_eq!(traced.index, 4);
        assert_eq!(traced.span.status, SpanStatus::Error);
        assert!(matches!(traced.result, Err(AgentError::TaskFailed(_))));
    }

    #[tokio::test]
    async fn test_traced_call_records_span() {
        let state = PipelineState::new("Rust", "u");
        let mut trace = AgentTrace::new(&state);
        let result: Result<ValidationResult, AgentError> = traced_call(
            &mut trace,
            "validator",
            "validate_roadmap",
            async {
                Ok(ValidationResult {
                    is_valid: true,
                    issues: vec![],
                    score: 90,
                    summary: String::new(),
                })
            },
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(trace.spans.len(), 1);
        assert_eq!(trace.spans[0].status, SpanStatus::Success);
    }
}
