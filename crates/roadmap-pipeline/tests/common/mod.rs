//! Scripted in-process collaborators for pipeline integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use roadmap_pipeline::orchestrator::{PipelineConfig, PipelineOrchestrator, PipelineStage};
use roadmap_pipeline::{
    AgentRole, GenerationRequest, GenerationService, InMemoryRoadmapStore, Language,
    ProgressEvent, RoadmapDraft, RoadmapStore, ServiceError, VideoCandidate, VideoMetadata,
    VideoSearchService, VideoVerifier,
};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

pub const TOPIC: &str = "Learn Python basics";

pub const SESSION_TITLES: [&str; 8] = [
    "Installing Python and Tools",
    "Variables and Data Types",
    "Control Flow",
    "Functions and Scope",
    "Collections",
    "Working with Files",
    "Error Handling",
    "Mini Project: Todo CLI",
];

type Responder = dyn Fn(&GenerationRequest) -> Result<Value, ServiceError> + Send + Sync;
type Delay = dyn Fn(&GenerationRequest) -> Duration + Send + Sync;

/// A generation backend answering from a closure. Records every request with
/// the (virtual) time it arrived and tracks how many calls overlap.
pub struct MockGeneration {
    responder: Box<Responder>,
    delay: Box<Delay>,
    requests: Mutex<Vec<(Instant, GenerationRequest)>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockGeneration {
    pub fn new(
        responder: impl Fn(&GenerationRequest) -> Result<Value, ServiceError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            delay: Box::new(|_| Duration::ZERO),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Answers every role with a well-formed default response.
    pub fn happy() -> Self {
        Self::new(|request| Ok(default_response(request)))
    }

    pub fn with_delay(
        mut self,
        delay: impl Fn(&GenerationRequest) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.delay = Box::new(delay);
        self
    }

    pub fn calls(&self, role: AgentRole) -> usize {
        self.requests_for(role).len()
    }

    pub fn requests_for(&self, role: AgentRole) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, r)| r.role == role)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn call_times(&self, role: AgentRole) -> Vec<Instant> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, r)| r.role == role)
            .map(|(at, _)| *at)
            .collect()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationService for MockGeneration {
    async fn generate(&self, request: GenerationRequest) -> Result<Value, ServiceError> {
        self.requests
            .lock()
            .unwrap()
            .push((Instant::now(), request.clone()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let delay = (self.delay)(&request);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        (self.responder)(&request)
    }
}

/// Name of the root schema the request asks for.
pub fn schema_title(request: &GenerationRequest) -> &str {
    request
        .schema
        .as_ref()
        .and_then(|s| s.get("title"))
        .and_then(Value::as_str)
        .unwrap_or_default()
}

/// 0-based index of the session a researcher request is for.
pub fn research_index(request: &GenerationRequest) -> Option<usize> {
    request.prompt.lines().find_map(|line| {
        let rest = line.strip_prefix("Session ")?;
        let (order, _) = rest.split_once(" of ")?;
        order.trim().parse::<usize>().ok()?.checked_sub(1)
    })
}

pub fn outline_response() -> Value {
    json!({
        "title": "Python Foundations in Eight Steps",
        "learning_path_summary": "From installation to a first small project.",
        "sessions": SESSION_TITLES
            .iter()
            .enumerate()
            .map(|(i, title)| json!({
                "title": title,
                "session_type": if i == SESSION_TITLES.len() - 1 { "project" } else { "concept" },
            }))
            .collect::<Vec<_>>(),
    })
}

pub fn research_response(request: &GenerationRequest) -> Value {
    let title = research_index(request)
        .and_then(|i| SESSION_TITLES.get(i))
        .copied()
        .unwrap_or("Unknown");
    json!({
        "content": format!("## {title}\n\nOriginal content for {title}."),
        "key_concepts": [title.to_lowercase()],
        "resources": ["https://docs.python.org/3/tutorial/"],
        "exercises": [format!("Practice {title}")],
    })
}

pub fn valid_review(score: u32) -> Value {
    json!({
        "is_valid": true,
        "issues": [],
        "overall_score": score,
        "summary": "Coherent and well ordered.",
    })
}

pub fn high_issue_review(session_index: usize) -> Value {
    json!({
        "is_valid": false,
        "issues": [
            {
                "issue_type": "depth",
                "severity": "high",
                "description": "Functions are covered too briefly.",
                "affected_session_indices": [session_index],
                "suggested_fix": "Add examples of default and keyword arguments.",
            },
            {
                "issue_type": "overlap",
                "severity": "high",
                "description": "Scope is explained again after Control Flow.",
                "affected_session_indices": [session_index],
                "suggested_fix": "Keep scope in one place.",
            },
        ],
        "overall_score": 55,
        "summary": "One session needs work.",
    })
}

pub fn default_response(request: &GenerationRequest) -> Value {
    match request.role {
        AgentRole::Interviewer => json!({
            "questions": [
                {
                    "question": "How much programming have you done before?",
                    "purpose": "Calibrate the starting level",
                    "example_options": [
                        {"label": "None", "text": "This is my first language"},
                        {"label": "Some", "text": "I know a little JavaScript"},
                    ],
                    "allows_freeform": true,
                },
                {
                    "question": "How many hours per week can you study?",
                    "purpose": "Size the sessions",
                    "example_options": [{"label": "Few", "text": "Two or three"}],
                    "allows_freeform": true,
                },
            ]
        }),
        AgentRole::Architect if schema_title(request) == "SessionDetails" => json!({
            "objective": "Understand the session topic well enough to use it.",
            "estimated_duration_minutes": 60,
            "prerequisites": [],
        }),
        AgentRole::Architect => outline_response(),
        AgentRole::Researcher => research_response(request),
        AgentRole::Validator => valid_review(92),
        AgentRole::Editor => json!({
            "edited_content": "## Revised\n\nRevised content.",
            "needs_research": false,
        }),
        AgentRole::EditorResearch => json!({
            "section_content": "Extra material.",
            "suggested_heading": "More examples",
        }),
        AgentRole::VideoFallback => json!({
            "videos": [
                {"url": "https://www.youtube.com/watch?v=realvideo01", "title": "Python in 1 hour", "channel": "Teacher"},
                {"url": "https://youtu.be/ghostvideo1", "title": "Does not exist", "channel": "Nobody"},
                {"url": "https://vimeo.com/123456", "title": "Wrong provider", "channel": "Elsewhere"},
            ]
        }),
    }
}

/// Video search answering from a closure, counting calls.
pub struct MockVideoSearch {
    responder: Box<dyn Fn(&str) -> Result<Vec<VideoCandidate>, ServiceError> + Send + Sync>,
    calls: AtomicUsize,
}

impl MockVideoSearch {
    pub fn new(
        responder: impl Fn(&str) -> Result<Vec<VideoCandidate>, ServiceError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
        }
    }

    /// Two hits for every query.
    pub fn happy() -> Self {
        Self::new(|query| {
            Ok(vec![candidate("searchhit01", query), candidate("searchhit02", query)])
        })
    }

    pub fn quota_exhausted() -> Self {
        Self::new(|_| {
            Err(ServiceError::QuotaExhausted(
                "The request cannot be completed because you have exceeded your quota.".into(),
            ))
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn candidate(video_id: &str, query: &str) -> VideoCandidate {
    VideoCandidate {
        video_id: video_id.to_string(),
        title: format!("Video about {query}"),
        channel: "Python Channel".to_string(),
        description: None,
        thumbnail_url: None,
    }
}

#[async_trait]
impl VideoSearchService for MockVideoSearch {
    async fn search(
        &self,
        query: &str,
        _max_results: usize,
        _language: Language,
    ) -> Result<Vec<VideoCandidate>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.responder)(query)
    }
}

/// Confirms only the URLs it was given.
#[derive(Default)]
pub struct MockVerifier {
    known: HashSet<String>,
    calls: AtomicUsize,
}

impl MockVerifier {
    pub fn knowing(urls: &[&str]) -> Self {
        Self {
            known: urls.iter().map(|u| u.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoVerifier for MockVerifier {
    async fn verify(&self, url: &str) -> Option<VideoMetadata> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.known.contains(url).then(|| VideoMetadata {
            title: "Verified title".to_string(),
            author_name: "Verified channel".to_string(),
            thumbnail_url: None,
        })
    }
}

/// A store that accepts the draft but hands back an unusable id.
pub struct BlankIdStore;

#[async_trait]
impl RoadmapStore for BlankIdStore {
    async fn save(&self, _draft: RoadmapDraft) -> Result<String, ServiceError> {
        Ok("  ".to_string())
    }
}

/// Every collaborator of one test pipeline, kept for later assertions.
pub struct Harness {
    pub generation: Arc<MockGeneration>,
    pub search: Arc<MockVideoSearch>,
    pub verifier: Arc<MockVerifier>,
    pub store: Arc<InMemoryRoadmapStore>,
    pub orchestrator: PipelineOrchestrator,
}

impl Harness {
    pub fn new(generation: MockGeneration, search: MockVideoSearch, config: PipelineConfig) -> Self {
        Self::with_verifier(
            generation,
            search,
            MockVerifier::knowing(&["https://www.youtube.com/watch?v=realvideo01"]),
            config,
        )
    }

    pub fn with_verifier(
        generation: MockGeneration,
        search: MockVideoSearch,
        verifier: MockVerifier,
        config: PipelineConfig,
    ) -> Self {
        let generation = Arc::new(generation);
        let search = Arc::new(search);
        let verifier = Arc::new(verifier);
        let store = Arc::new(InMemoryRoadmapStore::new());
        let orchestrator = PipelineOrchestrator::new(
            generation.clone(),
            search.clone(),
            verifier.clone(),
            store.clone(),
            config,
        );
        Self {
            generation,
            search,
            verifier,
            store,
            orchestrator,
        }
    }
}

/// The stages announced through `stage_update` events, in order.
pub fn stage_updates(events: &[ProgressEvent]) -> Vec<PipelineStage> {
    events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::StageUpdate { stage, .. } => Some(*stage),
            _ => None,
        })
        .collect()
}

pub fn terminal_events(events: &[ProgressEvent]) -> Vec<&ProgressEvent> {
    events.iter().filter(|e| e.is_terminal()).collect()
}
