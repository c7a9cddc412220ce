//! Targeted revision of one session during the repair loop.
//!
//! Only `content` changes. When the edit asks for more material, one small
//! gap-fill call writes a new section that is appended under its own heading;
//! it is never merged into the existing text.

use super::{Agent, AgentContext, AgentError, AgentRole};
use crate::language::Language;
use crate::models::{ResearchedSession, SessionBrief, ValidationIssue};
use crate::prompt::{
    EDIT_TEMPLATE, EDITOR_RESEARCH_SYSTEM, EDITOR_SYSTEM, GAP_FILL_TEMPLATE, localize,
    render_prompt,
};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

const DEFAULT_GAP_HEADING: &str = "Additional Information";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditRequest {
    pub topic: String,
    pub language: Language,
    pub session: ResearchedSession,
    /// Every issue that names this session.
    pub issues: Vec<ValidationIssue>,
    pub siblings: Vec<SessionBrief>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct EditResponse {
    edited_content: String,
    #[serde(default)]
    needs_research: bool,
    /// What the gap-fill section must cover, when `needs_research` is set.
    #[serde(default)]
    research_request: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct GapFillResponse {
    section_content: String,
    #[serde(default)]
    suggested_heading: Option<String>,
}

/// Rewrites a session's content to resolve validation issues.
#[derive(Debug, Clone)]
pub struct EditorAgent {
    ctx: AgentContext,
}

impl EditorAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    async fn revise(&self, input: EditRequest) -> Result<ResearchedSession, AgentError> {
        let prompt = render_prompt(
            EDIT_TEMPLATE,
            json!({
                "session": input.session,
                "issues": input.issues,
                "siblings": input.siblings,
            }),
        )?;
        let edit: EditResponse = self
            .ctx
            .generate_validated(
                self.role(),
                EDITOR_SYSTEM,
                localize(input.language, prompt),
                |r: &EditResponse| {
                    if r.edited_content.trim().is_empty() {
                        Err("edited content is empty".to_string())
                    } else {
                        Ok(())
                    }
                },
            )
            .await?;

        let mut content = edit.edited_content;
        let research_request = edit
            .research_request
            .filter(|r| edit.needs_research && !r.trim().is_empty());

        if let Some(request) = research_request {
            match self
                .fill_gap(&input.topic, input.language, &input.session.title, &request)
                .await
            {
                Ok(section) => {
                    info!(session = %input.session.title, "Appended gap-fill section");
                    content.push_str(&section);
                }
                Err(e) => warn!(
                    session = %input.session.title,
                    error = %e,
                    "Gap-fill failed, keeping edited content"
                ),
            }
        }

        Ok(ResearchedSession {
            content,
            ..input.session
        })
    }

    async fn fill_gap(
        &self,
        topic: &str,
        language: Language,
        title: &str,
        request: &str,
    ) -> Result<String, AgentError> {
        let prompt = render_prompt(
            GAP_FILL_TEMPLATE,
            json!({ "topic": topic, "title": title, "request": request }),
        )?;
        let gap: GapFillResponse = self
            .ctx
            .generate_structured(
                AgentRole::EditorResearch,
                EDITOR_RESEARCH_SYSTEM,
                localize(language, prompt),
            )
            .await?;
        Ok(format_appended_section(
            gap.suggested_heading.as_deref(),
            &gap.section_content,
        ))
    }
}

#[async_trait]
impl Agent for EditorAgent {
    type Input = EditRequest;
    type Output = ResearchedSession;

    fn role(&self) -> AgentRole {
        AgentRole::Editor
    }

    /// Holds one gate slot for the edit and its gap-fill.
    async fn execute(&self, input: EditRequest) -> Result<ResearchedSession, AgentError> {
        self.ctx.gate.run(self.revise(input)).await
    }
}

fn format_appended_section(heading: Option<&str>, content: &str) -> String {
    let heading = heading
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .unwrap_or(DEFAULT_GAP_HEADING);
    format!("\n\n## {heading}\n\n{}", content.trim())
}
