//! Whole-roadmap quality review.

use super::{Agent, AgentContext, AgentError, AgentRole};
use crate::language::Language;
use crate::models::{
    IssueType, ResearchedSession, SessionOutline, Severity, ValidationIssue, ValidationResult,
    short_id,
};
use crate::prompt::{VALIDATION_TEMPLATE, VALIDATOR_SYSTEM, localize, render_prompt};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub topic: String,
    pub language: Language,
    pub outline: SessionOutline,
    /// Sessions in outline order.
    pub sessions: Vec<ResearchedSession>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ValidationResponse {
    #[serde(default)]
    pub is_valid: bool,
    #[serde(default)]
    pub issues: Vec<IssueResponse>,
    /// Overall quality from 0 to 100.
    #[serde(default)]
    pub overall_score: f64,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct IssueResponse {
    /// One of overlap, gap, ordering, coherence, depth.
    pub issue_type: String,
    /// One of low, medium, high.
    pub severity: String,
    pub description: String,
    /// 0-based indices of the affected sessions.
    #[serde(default)]
    pub affected_session_indices: Vec<i64>,
    #[serde(default)]
    pub suggested_fix: String,
}

/// Reviews the outline and all session content in one call.
#[derive(Debug, Clone)]
pub struct ValidatorAgent {
    ctx: AgentContext,
}

impl ValidatorAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Agent for ValidatorAgent {
    type Input = ValidationRequest;
    type Output = ValidationResult;

    fn role(&self) -> AgentRole {
        AgentRole::Validator
    }

    async fn execute(&self, input: ValidationRequest) -> Result<ValidationResult, AgentError> {
        let prompt = render_prompt(
            VALIDATION_TEMPLATE,
            json!({
                "topic": input.topic,
                "summary": input.outline.learning_path_summary,
                "sessions": input.sessions,
            }),
        )?;
        let response: ValidationResponse = self
            .ctx
            .generate_structured(self.role(), VALIDATOR_SYSTEM, localize(input.language, prompt))
            .await?;

        Ok(build_validation_result(response, &input.outline))
    }
}

/// Turns a raw validator response into a [`ValidationResult`].
///
/// Session indices become outline ids (out-of-range indices are dropped).
/// The roadmap is valid when no issue is high severity, whatever the model
/// claimed. The score is capped by a ceiling that falls with every issue, so
/// more or severer issues can never produce a higher score.
pub fn build_validation_result(
    response: ValidationResponse,
    outline: &SessionOutline,
) -> ValidationResult {
    let issues: Vec<ValidationIssue> = response
        .issues
        .into_iter()
        .map(|raw| {
            let mut affected_session_ids: Vec<String> = Vec::new();
            for index in raw.affected_session_indices {
                if let Some(id) = usize::try_from(index).ok().and_then(|i| outline.id_at(i))
                    && !affected_session_ids.iter().any(|a| a == id)
                {
                    affected_session_ids.push(id.to_string());
                }
            }
            ValidationIssue {
                id: short_id("issue"),
                issue_type: IssueType::from_label(&raw.issue_type),
                severity: Severity::from_label(&raw.severity),
                description: raw.description,
                suggested_fix: raw.suggested_fix,
                affected_session_ids,
            }
        })
        .collect();

    let is_valid = !issues.iter().any(|i| i.severity == Severity::High);
    let ceiling = 100u32.saturating_sub(issues.iter().map(|i| i.severity.penalty()).sum());
    let reported = if response.overall_score.is_finite() {
        response.overall_score.clamp(0.0, 100.0).round() as u32
    } else {
        0
    };

    ValidationResult {
        is_valid,
        issues,
        score: reported.min(ceiling),
        summary: response.summary,
    }
}
