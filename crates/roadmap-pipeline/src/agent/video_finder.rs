//! Video lookup with a sticky switch from search to generate-and-verify.
//!
//! The primary path asks the video search backend. Once that backend reports
//! quota exhaustion, the shared [`VideoFallbackMode`] is set and every later
//! lookup using the same context skips search entirely: it asks the
//! generation backend for candidates and keeps only those the existence
//! verifier confirms.

use super::{Agent, AgentContext, AgentError, AgentRole};
use crate::language::Language;
use crate::models::VideoResource;
use crate::prompt::{VIDEO_FALLBACK_SYSTEM, VIDEO_FALLBACK_TEMPLATE, render_prompt};
use crate::service::{ServiceError, VideoCandidate};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use strum::Display;
use tracing::{debug, warn};

const QUERY_KEY_CONCEPTS: usize = 3;

/// Sticky flag: once active, video lookups skip the search backend.
///
/// Clones share the flag. It is never reset.
#[derive(Debug, Clone, Default)]
pub struct VideoFallbackMode(Arc<AtomicBool>);

impl VideoFallbackMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Turns fallback mode on. Returns `true` if this call switched it.
    pub fn activate(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRequest {
    pub session_title: String,
    pub key_concepts: Vec<String>,
    pub language: Language,
    pub max_videos: usize,
}

impl VideoRequest {
    /// Search query: the session title followed by its leading key concepts.
    pub fn query(&self) -> String {
        std::iter::once(self.session_title.as_str())
            .chain(
                self.key_concepts
                    .iter()
                    .take(QUERY_KEY_CONCEPTS)
                    .map(String::as_str),
            )
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Which path produced the videos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VideoSource {
    Search,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoLookup {
    pub videos: Vec<VideoResource>,
    pub source: VideoSource,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct FallbackResponse {
    #[serde(default)]
    videos: Vec<FallbackCandidate>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct FallbackCandidate {
    /// Full YouTube watch URL.
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    channel: String,
    #[serde(default)]
    description: Option<String>,
}

/// Finds videos for one session. Each lookup holds a gate slot.
#[derive(Debug, Clone)]
pub struct VideoFinderAgent {
    ctx: AgentContext,
}

impl VideoFinderAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub fn fallback_mode(&self) -> &VideoFallbackMode {
        &self.ctx.fallback_mode
    }

    async fn search(&self, request: &VideoRequest) -> Result<Vec<VideoResource>, ServiceError> {
        let query = request.query();
        let candidates = self
            .ctx
            .retry
            .execute(
                || {
                    self.ctx
                        .video_search
                        .search(&query, request.max_videos, request.language)
                },
                ServiceError::is_retryable,
            )
            .await?;

        Ok(candidates
            .into_iter()
            .map(candidate_to_resource)
            .filter(|v| VideoResource::is_provider_url(&v.url))
            .take(request.max_videos)
            .collect())
    }

    async fn generate_and_verify(
        &self,
        request: &VideoRequest,
    ) -> Result<Vec<VideoResource>, AgentError> {
        let prompt = render_prompt(
            VIDEO_FALLBACK_TEMPLATE,
            json!({
                "title": request.session_title,
                "key_concepts": request.key_concepts,
                "max_videos": request.max_videos,
                "language": request.language.code(),
            }),
        )?;
        let response: FallbackResponse = self
            .ctx
            .generate_structured(AgentRole::VideoFallback, VIDEO_FALLBACK_SYSTEM, prompt)
            .await?;

        let mut videos: Vec<VideoResource> = Vec::new();
        for candidate in response.videos {
            if videos.len() >= request.max_videos {
                break;
            }
            if !VideoResource::is_provider_url(&candidate.url) {
                debug!(url = %candidate.url, "Dropping candidate outside the provider domain");
                continue;
            }
            let video_id = VideoResource::video_id(&candidate.url);
            let url = video_id
                .as_deref()
                .map(VideoResource::watch_url)
                .unwrap_or_else(|| candidate.url.clone());
            if videos.iter().any(|v| v.url == url) {
                continue;
            }

            let Some(metadata) = self.ctx.video_verifier.verify(&url).await else {
                debug!(url = %url, "Dropping unverified candidate");
                continue;
            };

            let thumbnail_url = metadata
                .thumbnail_url
                .or_else(|| video_id.as_deref().map(VideoResource::thumbnail_for))
                .unwrap_or_default();
            videos.push(VideoResource {
                url,
                title: non_empty(metadata.title, candidate.title),
                channel: non_empty(metadata.author_name, candidate.channel),
                thumbnail_url,
                duration_minutes: None,
                description: candidate.description,
            });
        }
        Ok(videos)
    }
}

#[async_trait]
impl Agent for VideoFinderAgent {
    type Input = VideoRequest;
    type Output = VideoLookup;

    fn role(&self) -> AgentRole {
        AgentRole::VideoFallback
    }

    fn name(&self) -> String {
        "video_finder".to_string()
    }

    async fn execute(&self, input: VideoRequest) -> Result<VideoLookup, AgentError> {
        let _permit = self.ctx.gate.acquire().await?;

        if !self.ctx.fallback_mode.is_active() {
            match self.search(&input).await {
                Ok(videos) => {
                    return Ok(VideoLookup {
                        videos,
                        source: VideoSource::Search,
                    });
                }
                Err(e) if e.is_quota_exhausted() => {
                    if self.ctx.fallback_mode.activate() {
                        warn!(
                            session = %input.session_title,
                            error = %e,
                            "Video search quota exhausted, switching to fallback mode"
                        );
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        let videos = self.generate_and_verify(&input).await?;
        Ok(VideoLookup {
            videos,
            source: VideoSource::Fallback,
        })
    }
}

fn candidate_to_resource(candidate: VideoCandidate) -> VideoResource {
    let thumbnail_url = candidate
        .thumbnail_url
        .unwrap_or_else(|| VideoResource::thumbnail_for(&candidate.video_id));
    VideoResource {
        url: VideoResource::watch_url(&candidate.video_id),
        title: candidate.title,
        channel: candidate.channel,
        thumbnail_url,
        duration_minutes: None,
        description: candidate.description,
    }
}

fn non_empty(preferred: String, fallback: String) -> String {
    if preferred.trim().is_empty() {
        fallback
    } else {
        preferred
    }
}
