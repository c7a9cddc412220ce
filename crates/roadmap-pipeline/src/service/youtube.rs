//! YouTube Data API v3 search and oEmbed existence checks.

use super::{ServiceError, VideoCandidate, VideoMetadata, VideoSearchService, VideoVerifier};
use crate::language::Language;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::env;
use std::time::Duration;
use tracing::debug;

const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";
const OEMBED_URL: &str = "https://www.youtube.com/oembed";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Quota-limited keyword search. Each call costs search quota on the API key.
#[derive(Clone)]
pub struct YouTubeSearchService {
    client: Client,
    api_key: String,
}

impl YouTubeSearchService {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Reads `YOUTUBE_API_KEY`.
    pub fn try_from_env() -> Result<Self, ServiceError> {
        let api_key = env::var("YOUTUBE_API_KEY").map_err(|_| {
            ServiceError::Fatal("YOUTUBE_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self::new(api_key))
    }
}

#[async_trait]
impl VideoSearchService for YouTubeSearchService {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        language: Language,
    ) -> Result<Vec<VideoCandidate>, ServiceError> {
        let max_results = max_results.to_string();
        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("part", "snippet"),
                ("q", query),
                ("type", "video"),
                ("maxResults", max_results.as_str()),
                ("videoDuration", "medium"),
                ("relevanceLanguage", language.code()),
                ("key", self.api_key.as_str()),
            ])
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await
            .map_err(|err| ServiceError::Network(format!("YouTube search failed: {err}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ServiceError::Network(format!("Failed to read YouTube response: {err}")))?;
        if !status.is_success() {
            return Err(map_search_error(status, &body));
        }

        let parsed: SearchResponse = serde_json::from_str(&body)
            .map_err(|err| ServiceError::Fatal(format!("Unexpected YouTube response: {err}")))?;
        Ok(parsed
            .items
            .into_iter()
            .filter_map(SearchItem::into_candidate)
            .collect())
    }
}

impl std::fmt::Debug for YouTubeSearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YouTubeSearchService").finish_non_exhaustive()
    }
}

/// Unauthenticated existence check through the public oEmbed endpoint.
#[derive(Debug, Clone, Default)]
pub struct OEmbedVerifier {
    client: Client,
}

impl OEmbedVerifier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoVerifier for OEmbedVerifier {
    async fn verify(&self, url: &str) -> Option<VideoMetadata> {
        let response = self
            .client
            .get(OEMBED_URL)
            .query(&[("url", url), ("format", "json")])
            .timeout(VERIFY_TIMEOUT)
            .send()
            .await
            .inspect_err(|err| debug!(url, error = %err, "oEmbed request failed"))
            .ok()?;

        if response.status() != StatusCode::OK {
            debug!(url, status = response.status().as_u16(), "Video not found");
            return None;
        }

        let oembed: OEmbedResponse = response
            .json()
            .await
            .inspect_err(|err| debug!(url, error = %err, "Unreadable oEmbed response"))
            .ok()?;
        Some(VideoMetadata {
            title: oembed.title,
            author_name: oembed.author_name,
            thumbnail_url: oembed.thumbnail_url,
        })
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: SearchItemId,
    #[serde(default)]
    snippet: Snippet,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Deserialize, Default)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
    url: String,
}

impl SearchItem {
    fn into_candidate(self) -> Option<VideoCandidate> {
        let video_id = self.id.video_id.filter(|id| !id.is_empty())?;
        let Thumbnails {
            high,
            medium,
            default,
        } = self.snippet.thumbnails;
        Some(VideoCandidate {
            video_id,
            title: self.snippet.title,
            channel: self.snippet.channel_title,
            description: Some(self.snippet.description).filter(|d| !d.is_empty()),
            thumbnail_url: high.or(medium).or(default).map(|t| t.url),
        })
    }
}

#[derive(Deserialize)]
struct OEmbedResponse {
    #[serde(default)]
    title: String,
    #[serde(default)]
    author_name: String,
    thumbnail_url: Option<String>,
}

fn map_search_error(status: StatusCode, body: &str) -> ServiceError {
    let detail = format!("YouTube API error {}: {body}", status.as_u16());
    match status {
        StatusCode::FORBIDDEN if body.contains("quotaExceeded") => {
            ServiceError::QuotaExhausted(detail)
        }
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => ServiceError::Network(detail),
        _ => ServiceError::Fatal(detail),
    }
}
