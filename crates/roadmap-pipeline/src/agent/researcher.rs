//! Session content generation.

use super::{Agent, AgentContext, AgentError, AgentRole};
use crate::language::Language;
use crate::models::{ResearchedSession, SessionBrief, SessionOutlineItem};
use crate::prompt::{RESEARCH_TEMPLATE, localize, render_prompt, researcher_system_prompt};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub topic: String,
    pub language: Language,
    pub item: SessionOutlineItem,
    /// Every session of the outline, so the content can stay out of its siblings' territory.
    pub siblings: Vec<SessionBrief>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ResearchResponse {
    /// Full markdown content of the session.
    content: String,
    #[serde(default)]
    key_concepts: Vec<String>,
    #[serde(default)]
    resources: Vec<String>,
    #[serde(default)]
    exercises: Vec<String>,
}

/// Writes the material for one session. Each call holds a gate slot.
#[derive(Debug, Clone)]
pub struct ResearcherAgent {
    ctx: AgentContext,
}

impl ResearcherAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Agent for ResearcherAgent {
    type Input = ResearchRequest;
    type Output = ResearchedSession;

    fn role(&self) -> AgentRole {
        AgentRole::Researcher
    }

    async fn execute(&self, input: ResearchRequest) -> Result<ResearchedSession, AgentError> {
        let prompt = render_prompt(
            RESEARCH_TEMPLATE,
            json!({
                "topic": input.topic,
                "session": input.item,
                "siblings": input.siblings,
                "total": input.siblings.len(),
            }),
        )?;
        let system = researcher_system_prompt(input.item.session_type);

        let response: ResearchResponse = self
            .ctx
            .gate
            .run(self.ctx.generate_validated(
                self.role(),
                &system,
                localize(input.language, prompt),
                |r: &ResearchResponse| {
                    if r.content.trim().is_empty() {
                        Err("session content is empty".to_string())
                    } else {
                        Ok(())
                    }
                },
            ))
            .await?;

        let item = input.item;
        Ok(ResearchedSession {
            outline_id: item.id,
            title: item.title,
            session_type: item.session_type,
            order: item.order,
            content: response.content,
            key_concepts: response.key_concepts,
            resources: response.resources,
            exercises: response.exercises,
            videos: Vec::new(),
        })
    }
}
