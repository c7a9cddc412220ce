//! Two-phase outline design.
//!
//! Phase 1 is a single call that returns the roadmap title, a summary and a
//! minimal list of sessions (title and type), so the caller has something to
//! show quickly. Phase 2 fills in each session's objective, duration and
//! prerequisites with one gated call per session. [`assemble_outline`] then
//! assigns ids and turns prerequisite indices into ids, dropping any index
//! that does not point strictly backwards.

use super::{Agent, AgentContext, AgentError, AgentRole};
use crate::language::Language;
use crate::models::{SessionOutline, SessionOutlineItem, SessionType, short_id};
use crate::prompt::{
    ARCHITECT_SYSTEM, OUTLINE_TEMPLATE, SESSION_DETAILS_TEMPLATE, localize, render_prompt,
};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

pub const MIN_SESSIONS: usize = 5;
pub const MAX_SESSIONS: usize = 15;

/// A question the learner answered during the interview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineRequest {
    pub topic: String,
    pub language: Language,
    pub answers: Vec<AnsweredQuestion>,
}

/// Title and type of one session, as produced by phase 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSeed {
    pub title: String,
    pub session_type: SessionType,
}

/// Phase 1 result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineDraft {
    pub title: String,
    pub learning_path_summary: String,
    pub sessions: Vec<SessionSeed>,
}

impl OutlineDraft {
    pub fn titles(&self) -> Vec<String> {
        self.sessions.iter().map(|s| s.title.clone()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailsRequest {
    pub topic: String,
    pub language: Language,
    /// Titles of every phase-1 session, in order.
    pub sibling_titles: Vec<String>,
    /// 0-based position of the session being described.
    pub index: usize,
    pub seed: SessionSeed,
}

/// Phase 2 result for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SessionDetails {
    pub objective: String,
    #[serde(default = "default_duration")]
    pub estimated_duration_minutes: u32,
    /// 0-based indices into the phase-1 ordering. Not yet sanitized.
    #[serde(default, rename = "prerequisites")]
    pub prerequisite_indices: Vec<i64>,
}

fn default_duration() -> u32 {
    60
}

#[derive(Debug, Deserialize, JsonSchema)]
struct OutlineResponse {
    title: String,
    #[serde(default)]
    learning_path_summary: String,
    sessions: Vec<SeedResponse>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SeedResponse {
    title: String,
    /// One of concept, tutorial, practice, project, review.
    #[serde(default)]
    session_type: String,
}

/// Designs the session outline of a roadmap.
#[derive(Debug, Clone)]
pub struct ArchitectAgent {
    ctx: AgentContext,
}

impl ArchitectAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    /// Phase 1: title, summary and minimal session list.
    pub async fn create_outline_phase1(
        &self,
        request: OutlineRequest,
    ) -> Result<OutlineDraft, AgentError> {
        let prompt = render_prompt(
            OUTLINE_TEMPLATE,
            json!({
                "topic": request.topic,
                "answers": request.answers,
                "min_sessions": MIN_SESSIONS,
                "max_sessions": MAX_SESSIONS,
            }),
        )?;

        let response: OutlineResponse = self
            .ctx
            .generate_validated(
                self.role(),
                ARCHITECT_SYSTEM,
                localize(request.language, prompt),
                |r: &OutlineResponse| {
                    if r.sessions.iter().any(|s| !s.title.trim().is_empty()) {
                        Ok(())
                    } else {
                        Err("outline contains no sessions".to_string())
                    }
                },
            )
            .await?;

        let mut sessions: Vec<SessionSeed> = response
            .sessions
            .into_iter()
            .filter(|s| !s.title.trim().is_empty())
            .map(|s| SessionSeed {
                title: s.title.trim().to_string(),
                session_type: SessionType::from_label(&s.session_type),
            })
            .collect();
        if sessions.len() > MAX_SESSIONS {
            warn!(
                returned = sessions.len(),
                kept = MAX_SESSIONS,
                "Outline longer than allowed, truncating"
            );
            sessions.truncate(MAX_SESSIONS);
        }

        Ok(OutlineDraft {
            title: response.title.trim().to_string(),
            learning_path_summary: response.learning_path_summary,
            sessions,
        })
    }

    /// Phase 2: details for one session. Holds a gate slot for the whole call.
    pub async fn session_details(
        &self,
        request: DetailsRequest,
    ) -> Result<SessionDetails, AgentError> {
        let prompt = render_prompt(
            SESSION_DETAILS_TEMPLATE,
            json!({
                "topic": request.topic,
                "sibling_titles": request.sibling_titles,
                "index": request.index,
                "title": request.seed.title,
                "session_type": request.seed.session_type,
            }),
        )?;
        let prompt = localize(request.language, prompt);

        self.ctx
            .gate
            .run(
                self.ctx
                    .generate_structured::<SessionDetails>(self.role(), ARCHITECT_SYSTEM, prompt),
            )
            .await
    }
}

#[async_trait]
impl Agent for ArchitectAgent {
    type Input = OutlineRequest;
    type Output = OutlineDraft;

    fn role(&self) -> AgentRole {
        AgentRole::Architect
    }

    async fn execute(&self, input: OutlineRequest) -> Result<OutlineDraft, AgentError> {
        self.create_outline_phase1(input).await
    }
}

/// Builds the final outline from phase 1 and the phase 2 results, in phase 1 order.
///
/// `details[i]` belongs to `draft.sessions[i]`. Prerequisite indices that are
/// negative, out of range, or not strictly before the session are dropped.
pub fn assemble_outline(draft: &OutlineDraft, details: Vec<SessionDetails>) -> SessionOutline {
    let ids: Vec<String> = draft.sessions.iter().map(|_| short_id("session")).collect();

    let sessions = draft
        .sessions
        .iter()
        .zip(details)
        .enumerate()
        .map(|(index, (seed, detail))| {
            let mut prerequisites: Vec<String> = Vec::new();
            for raw in detail.prerequisite_indices {
                match usize::try_from(raw) {
                    Ok(p) if p < index => {
                        let id = &ids[p];
                        if !prerequisites.contains(id) {
                            prerequisites.push(id.clone());
                        }
                    }
                    _ => debug!(
                        session = index,
                        prerequisite = raw,
                        "Dropping prerequisite that does not point to an earlier session"
                    ),
                }
            }

            SessionOutlineItem {
                id: ids[index].clone(),
                title: seed.title.clone(),
                objective: detail.objective,
                session_type: seed.session_type,
                order: index as u32 + 1,
                estimated_duration_minutes: detail.estimated_duration_minutes,
                prerequisites,
            }
        })
        .collect();

    SessionOutline::new(sessions, draft.learning_path_summary.clone())
}
