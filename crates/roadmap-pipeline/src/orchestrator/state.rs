//! The mutable record of one pipeline run.

use crate::agent::architect::AnsweredQuestion;
use crate::language::{Language, detect_language};
use crate::models::{
    InterviewAnswer, InterviewQuestion, IssueType, ResearchedSession, SessionOutline, Severity,
    ValidationResult, short_id,
};
use serde::{Deserialize, Serialize};
use strum::Display;

const TITLE_FROM_TOPIC_CHARS: usize = 100;

/// Stages of a pipeline run, in execution order.
///
/// `Validating` and `Revising` may alternate; `Error` can follow any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PipelineStage {
    Initialized,
    Interviewing,
    Architecting,
    Researching,
    FindingVideos,
    Validating,
    Revising,
    Saving,
    Complete,
    Error,
}

impl PipelineStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Complete | PipelineStage::Error)
    }
}

/// Issue summary kept in the repair history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedIssue {
    pub issue_type: IssueType,
    pub severity: Severity,
    pub description: String,
}

/// One pass of the repair loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixAttemptRecord {
    /// 1-based attempt number.
    pub attempt: u32,
    pub issues_count: usize,
    pub affected_session_ids: Vec<String>,
    pub issues: Vec<FixedIssue>,
    /// Sessions whose edit succeeded.
    pub edited_sessions: usize,
    /// Sessions that kept their previous content because the edit failed.
    pub failed_sessions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    pub id: String,
    pub user_id: String,
    pub topic: String,
    pub language: Language,
    pub stage: PipelineStage,
    pub interview_questions: Vec<InterviewQuestion>,
    pub interview_answers: Vec<InterviewAnswer>,
    pub suggested_title: Option<String>,
    pub session_outline: Option<SessionOutline>,
    pub researched_sessions: Vec<ResearchedSession>,
    pub validation_result: Option<ValidationResult>,
    pub fix_attempt: u32,
    pub fix_history: Vec<FixAttemptRecord>,
    pub roadmap_id: Option<String>,
    pub error_message: Option<String>,
}

impl PipelineState {
    /// Creates a state in [`PipelineStage::Initialized`] with the topic's language detected.
    pub fn new(topic: impl Into<String>, user_id: impl Into<String>) -> Self {
        let topic = topic.into();
        Self {
            id: short_id("pipeline"),
            user_id: user_id.into(),
            language: detect_language(&topic),
            topic,
            stage: PipelineStage::Initialized,
            interview_questions: Vec::new(),
            interview_answers: Vec::new(),
            suggested_title: None,
            session_outline: None,
            researched_sessions: Vec::new(),
            validation_result: None,
            fix_attempt: 0,
            fix_history: Vec::new(),
            roadmap_id: None,
            error_message: None,
        }
    }

    /// Attaches questions asked ahead of the run, so the interviewer is not called again.
    pub fn with_interview(
        mut self,
        questions: Vec<InterviewQuestion>,
        answers: Vec<InterviewAnswer>,
    ) -> Self {
        self.interview_questions = questions;
        self.interview_answers = answers;
        self
    }

    pub fn add_interview_answers(&mut self, answers: impl IntoIterator<Item = InterviewAnswer>) {
        self.interview_answers.extend(answers);
    }

    /// Answers paired with their question text. Blank answers are skipped.
    pub fn answered_questions(&self) -> Vec<AnsweredQuestion> {
        self.interview_answers
            .iter()
            .filter(|a| !a.answer.trim().is_empty())
            .map(|a| AnsweredQuestion {
                question: self
                    .interview_questions
                    .iter()
                    .find(|q| q.id == a.question_id)
                    .map(|q| q.question.clone())
                    .unwrap_or_else(|| a.question_id.clone()),
                answer: a.answer.clone(),
            })
            .collect()
    }

    /// Title for the saved roadmap: the suggested title, else the start of the topic.
    pub fn roadmap_title(&self) -> String {
        match &self.suggested_title {
            Some(title) if !title.trim().is_empty() => title.clone(),
            _ => self.topic.chars().take(TITLE_FROM_TOPIC_CHARS).collect(),
        }
    }

    pub(crate) fn transition(&mut self, stage: PipelineStage) {
        self.stage = stage;
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.stage = PipelineStage::Error;
        self.error_message = Some(message);
    }
}
