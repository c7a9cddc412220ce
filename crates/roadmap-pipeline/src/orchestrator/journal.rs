use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use strum::Display;
use tokio::time::Instant;

use super::state::PipelineState;
use crate::agent::AgentError;
use crate::agent::architect::{OutlineDraft, SessionDetails};
use crate::agent::video_finder::VideoLookup;
use crate::models::{InterviewQuestion, ResearchedSession, ValidationResult, short_id};

/// Outcome of a single agent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SpanStatus {
    Success,
    Error,
    /// The call succeeded but found nothing, e.g. a video lookup with zero videos.
    NoResults,
}

/// Final status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TraceStatus {
    Running,
    Success,
    Error,
    Abandoned,
}

/// Record of one closed agent invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpan {
    pub span_id: String,
    pub agent: String,
    pub operation: String,
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
    pub duration_ms: u64,
    pub status: SpanStatus,
    pub error: Option<String>,
    pub error_kind: Option<String>,
    pub output_summary: Option<String>,
}

/// An agent invocation in flight. Consumed by [`OpenSpan::close`], so a span
/// can only be closed once.
#[derive(Debug)]
pub struct OpenSpan {
    span_id: String,
    agent: String,
    operation: String,
    started_at_ms: u64,
    started: Instant,
}

impl OpenSpan {
    pub fn start(agent: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            span_id: short_id("span"),
            agent: agent.into(),
            operation: operation.into(),
            started_at_ms: current_timestamp_ms(),
            started: Instant::now(),
        }
    }

    pub fn close(
        self,
        status: SpanStatus,
        output_summary: Option<String>,
        error: Option<&AgentError>,
    ) -> AgentSpan {
        AgentSpan {
            span_id: self.span_id,
            agent: self.agent,
            operation: self.operation,
            started_at_ms: self.started_at_ms,
            ended_at_ms: current_timestamp_ms(),
            duration_ms: self.started.elapsed().as_millis() as u64,
            status,
            error: error.map(ToString::to_string),
            error_kind: error.map(|e| e.kind().to_string()),
            output_summary,
        }
    }

    /// Closes the span from the invocation's result.
    pub fn close_with<T: SpanSummary>(self, result: &Result<T, AgentError>) -> AgentSpan {
        match result {
            Ok(output) => {
                let status = if output.has_results() {
                    SpanStatus::Success
                } else {
                    SpanStatus::NoResults
                };
                self.close(status, Some(output.span_summary()), None)
            }
            Err(e) => self.close(SpanStatus::Error, None, Some(e)),
        }
    }
}

/// Short description of an agent's output for the trace.
pub trait SpanSummary {
    fn span_summary(&self) -> String;

    fn has_results(&self) -> bool {
        true
    }
}

impl SpanSummary for Vec<InterviewQuestion> {
    fn span_summary(&self) -> String {
        format!("{} questions", self.len())
    }

    fn has_results(&self) -> bool {
        !self.is_empty()
    }
}

impl SpanSummary for OutlineDraft {
    fn span_summary(&self) -> String {
        format!("'{}' with {} sessions", self.title, self.sessions.len())
    }
}

impl SpanSummary for SessionDetails {
    fn span_summary(&self) -> String {
        format!(
            "{} min, {} prerequisites",
            self.estimated_duration_minutes,
            self.prerequisite_indices.len()
        )
    }
}

impl SpanSummary for ResearchedSession {
    fn span_summary(&self) -> String {
        format!(
            "'{}': {} chars, {} key concepts",
            self.title,
            self.content.len(),
            self.key_concepts.len()
        )
    }
}

impl SpanSummary for VideoLookup {
    fn span_summary(&self) -> String {
        format!("{} videos via {}", self.videos.len(), self.source)
    }

    fn has_results(&self) -> bool {
        !self.videos.is_empty()
    }
}

impl SpanSummary for ValidationResult {
    fn span_summary(&self) -> String {
        format!(
            "score {}, {} issues, valid: {}",
            self.score,
            self.issues.len(),
            self.is_valid
        )
    }
}

/// Append-only record of every agent invocation in one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTrace {
    pub pipeline_id: String,
    pub user_id: String,
    pub topic: String,
    pub spans: Vec<AgentSpan>,
    pub final_status: TraceStatus,
    pub error_message: Option<String>,
    pub roadmap_id: Option<String>,
    pub started_at_ms: u64,
    pub total_duration_ms: Option<u64>,
}

impl AgentTrace {
    pub fn new(state: &PipelineState) -> Self {
        Self {
            pipeline_id: state.id.clone(),
            user_id: state.user_id.clone(),
            topic: state.topic.clone(),
            spans: Vec::new(),
            final_status: TraceStatus::Running,
            error_message: None,
            roadmap_id: None,
            started_at_ms: current_timestamp_ms(),
            total_duration_ms: None,
        }
    }

    pub fn record(&mut self, span: AgentSpan) {
        self.spans.push(span);
    }

    pub fn finish(&mut self, status: TraceStatus, state: &PipelineState) {
        self.final_status = status;
        self.error_message = state.error_message.clone();
        self.roadmap_id = state.roadmap_id.clone();
        self.total_duration_ms = Some(current_timestamp_ms().saturating_sub(self.started_at_ms));
    }

    pub fn spans_for(&self, agent: &str) -> impl Iterator<Item = &AgentSpan> {
        self.spans.iter().filter(move |s| s.agent == agent)
    }

    pub fn error_count(&self) -> usize {
        self.spans
            .iter()
            .filter(|s| s.status == SpanStatus::Error)
            .count()
    }
}

/// Returns the current system time in milliseconds since UNIX_EPOCH.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
