//! Domain model shared by agents and the orchestrator.
//!
//! Agents produce these values; only the orchestrator stores them in
//! [`PipelineState`](crate::orchestrator::state::PipelineState).

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use url::Url;

/// Hosts accepted as the video provider's domain.
pub const PROVIDER_HOSTS: &[&str] = &["youtube.com", "www.youtube.com", "m.youtube.com", "youtu.be"];

/// Builds an opaque identifier such as `session_1a2b3c4d`.
pub(crate) fn short_id(prefix: &str) -> String {
    format!("{prefix}_{:08x}", rand::random::<u32>())
}

/// Pedagogical shape of a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionType {
    #[default]
    Concept,
    Tutorial,
    Practice,
    Project,
    Review,
}

impl SessionType {
    /// Parses a model-provided label, falling back to [`SessionType::Concept`].
    pub fn from_label(label: &str) -> Self {
        label.trim().to_lowercase().parse().unwrap_or_default()
    }
}

/// Category of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IssueType {
    Overlap,
    Gap,
    Ordering,
    Coherence,
    Depth,
}

impl IssueType {
    /// Parses a model-provided label, falling back to [`IssueType::Coherence`].
    pub fn from_label(label: &str) -> Self {
        label
            .trim()
            .to_lowercase()
            .parse()
            .unwrap_or(IssueType::Coherence)
    }
}

/// Severity of a validation finding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Parses a model-provided label, falling back to [`Severity::Medium`].
    pub fn from_label(label: &str) -> Self {
        label
            .trim()
            .to_lowercase()
            .parse()
            .unwrap_or(Severity::Medium)
    }

    /// Score points deducted from the ceiling for one issue of this severity.
    pub fn penalty(&self) -> u32 {
        match self {
            Severity::Low => 5,
            Severity::Medium => 10,
            Severity::High => 20,
        }
    }
}

/// One planned session of the roadmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutlineItem {
    pub id: String,
    pub title: String,
    pub objective: String,
    pub session_type: SessionType,
    /// 1-based position in the learning path.
    pub order: u32,
    pub estimated_duration_minutes: u32,
    /// Ids of sessions positioned strictly before this one.
    pub prerequisites: Vec<String>,
}

/// Title and type of a sibling session, given to agents for overlap context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionBrief {
    pub order: u32,
    pub title: String,
    pub session_type: SessionType,
}

/// The ordered plan produced by the architect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutline {
    pub sessions: Vec<SessionOutlineItem>,
    pub learning_path_summary: String,
    pub total_estimated_hours: f64,
}

impl SessionOutline {
    /// Builds an outline and derives the total hours from the session durations.
    pub fn new(sessions: Vec<SessionOutlineItem>, learning_path_summary: impl Into<String>) -> Self {
        let total_minutes: u32 = sessions.iter().map(|s| s.estimated_duration_minutes).sum();
        Self {
            sessions,
            learning_path_summary: learning_path_summary.into(),
            total_estimated_hours: (f64::from(total_minutes) / 60.0 * 10.0).round() / 10.0,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SessionOutlineItem> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Id of the session at a 0-based position.
    pub fn id_at(&self, index: usize) -> Option<&str> {
        self.sessions.get(index).map(|s| s.id.as_str())
    }

    pub fn briefs(&self) -> Vec<SessionBrief> {
        self.sessions
            .iter()
            .map(|s| SessionBrief {
                order: s.order,
                title: s.title.clone(),
                session_type: s.session_type,
            })
            .collect()
    }
}

/// A session with generated teaching material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchedSession {
    /// Id of the outline item this content was generated for.
    pub outline_id: String,
    pub title: String,
    pub session_type: SessionType,
    pub order: u32,
    pub content: String,
    pub key_concepts: Vec<String>,
    pub resources: Vec<String>,
    pub exercises: Vec<String>,
    #[serde(default)]
    pub videos: Vec<VideoResource>,
}

/// A video attached to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoResource {
    pub url: String,
    pub title: String,
    pub channel: String,
    pub thumbnail_url: String,
    pub duration_minutes: Option<u32>,
    pub description: Option<String>,
}

impl VideoResource {
    /// Whether `raw` is an http(s) URL on one of the [`PROVIDER_HOSTS`].
    pub fn is_provider_url(raw: &str) -> bool {
        match Url::parse(raw) {
            Ok(url) => {
                matches!(url.scheme(), "http" | "https")
                    && url
                        .host_str()
                        .is_some_and(|host| PROVIDER_HOSTS.contains(&host))
            }
            Err(_) => false,
        }
    }

    /// Extracts the provider's video id from a watch, embed or short URL.
    pub fn video_id(raw: &str) -> Option<String> {
        let url = Url::parse(raw).ok()?;
        if url.host_str() == Some("youtu.be") {
            return url
                .path_segments()?
                .next()
                .filter(|id| !id.is_empty())
                .map(str::to_string);
        }
        if let Some(id) = url.query_pairs().find(|(k, _)| k == "v").map(|(_, v)| v) {
            return Some(id.into_owned());
        }
        let mut segments = url.path_segments()?;
        match segments.next() {
            Some("embed") | Some("shorts") | Some("live") => segments
                .next()
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            _ => None,
        }
    }

    pub fn watch_url(video_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={video_id}")
    }

    pub fn thumbnail_for(video_id: &str) -> String {
        format!("https://img.youtube.com/vi/{video_id}/maxresdefault.jpg")
    }
}

/// A defect found by the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub id: String,
    pub issue_type: IssueType,
    pub severity: Severity,
    pub description: String,
    pub suggested_fix: String,
    pub affected_session_ids: Vec<String>,
}

/// Verdict over the whole roadmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub issues: Vec<ValidationIssue>,
    /// 0-100, never higher for a larger or more severe set of issues.
    pub score: u32,
    pub summary: String,
}

impl ValidationResult {
    /// Session ids named by at least one issue, deduplicated, in first-seen order.
    pub fn affected_session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for id in self.issues.iter().flat_map(|i| &i.affected_session_ids) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }

    pub fn issues_for(&self, session_id: &str) -> Vec<ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.affected_session_ids.iter().any(|id| id == session_id))
            .cloned()
            .collect()
    }

    pub fn high_severity_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::High)
            .count()
    }
}

/// A labelled example answer offered alongside an interview question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleOption {
    pub label: String,
    pub text: String,
}

/// A clarifying question asked before the outline is designed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewQuestion {
    pub id: String,
    pub question: String,
    pub purpose: String,
    pub example_options: Vec<ExampleOption>,
    pub allows_freeform: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewAnswer {
    pub question_id: String,
    pub answer: String,
}
