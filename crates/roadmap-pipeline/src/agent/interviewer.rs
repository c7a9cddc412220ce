//! Clarifying questions asked before the outline is designed.

use super::{Agent, AgentContext, AgentError, AgentRole};
use crate::language::Language;
use crate::models::{ExampleOption, InterviewQuestion, short_id};
use crate::prompt::{INTERVIEW_TEMPLATE, INTERVIEWER_SYSTEM, localize, render_prompt};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewRequest {
    pub topic: String,
    pub language: Language,
    pub max_questions: usize,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct QuestionsResponse {
    questions: Vec<QuestionDraft>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct QuestionDraft {
    question: String,
    #[serde(default)]
    purpose: String,
    #[serde(default)]
    example_options: Vec<OptionDraft>,
    #[serde(default = "default_true")]
    allows_freeform: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct OptionDraft {
    #[serde(default)]
    label: String,
    text: String,
}

fn default_true() -> bool {
    true
}

/// Generates up to `max_questions` interview questions for a topic.
#[derive(Debug, Clone)]
pub struct InterviewerAgent {
    ctx: AgentContext,
}

impl InterviewerAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Agent for InterviewerAgent {
    type Input = InterviewRequest;
    type Output = Vec<InterviewQuestion>;

    fn role(&self) -> AgentRole {
        AgentRole::Interviewer
    }

    async fn execute(&self, input: InterviewRequest) -> Result<Vec<InterviewQuestion>, AgentError> {
        let prompt = render_prompt(
            INTERVIEW_TEMPLATE,
            json!({ "topic": input.topic, "max_questions": input.max_questions }),
        )?;
        let response: QuestionsResponse = self
            .ctx
            .generate_structured(self.role(), INTERVIEWER_SYSTEM, localize(input.language, prompt))
            .await?;

        Ok(response
            .questions
            .into_iter()
            .filter(|q| !q.question.trim().is_empty())
            .take(input.max_questions)
            .map(|q| InterviewQuestion {
                id: short_id("q"),
                question: q.question,
                purpose: q.purpose,
                example_options: q
                    .example_options
                    .into_iter()
                    .map(|o| ExampleOption {
                        label: o.label,
                        text: o.text,
                    })
                    .collect(),
                allows_freeform: q.allows_freeform,
            })
            .collect())
    }
}
