//! Configuration for pipeline runs.

use crate::agent::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Tunables for [`PipelineOrchestrator`](super::PipelineOrchestrator).
///
/// # Examples
///
/// ```
/// use roadmap_pipeline::orchestrator::PipelineConfig;
///
/// let config = PipelineConfig::default()
///     .with_max_fix_attempts(1)
///     .with_max_concurrent_calls(3);
/// assert_eq!(config.max_fix_attempts, 1);
/// assert_eq!(config.max_videos_per_session, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on Revising passes. At the cap the best content is saved
    /// with its remaining issues.
    ///
    /// **Default:** 2
    pub max_fix_attempts: u32,

    /// Capacity of the gate shared by every fan-out call.
    ///
    /// **Default:** 5
    pub max_concurrent_calls: usize,

    /// Backoff for every external call.
    ///
    /// **Default:** 3 retries, 1s base, 30s cap
    pub retry: RetryPolicy,

    /// **Default:** 3
    pub max_videos_per_session: usize,

    /// How many clarifying questions the interviewer may ask. Zero skips the call.
    ///
    /// **Default:** 5
    pub interview_questions: usize,

    /// Progress events buffered before the controller waits for the consumer.
    ///
    /// **Default:** 32
    pub event_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_fix_attempts: 2,
            max_concurrent_calls: 5,
            retry: RetryPolicy::default(),
            max_videos_per_session: 3,
            interview_questions: 5,
            event_buffer: 32,
        }
    }
}

impl PipelineConfig {
    pub fn with_max_fix_attempts(mut self, attempts: u32) -> Self {
        self.max_fix_attempts = attempts;
        self
    }

    pub fn with_max_concurrent_calls(mut self, calls: usize) -> Self {
        self.max_concurrent_calls = calls;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_max_videos_per_session(mut self, videos: usize) -> Self {
        self.max_videos_per_session = videos;
        self
    }

    pub fn with_interview_questions(mut self, questions: usize) -> Self {
        self.interview_questions = questions;
        self
    }

    pub fn with_event_buffer(mut self, buffer: usize) -> Self {
        self.event_buffer = buffer;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_fix_attempts, 2);
        assert_eq!(config.max_concurrent_calls, 5);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay, Duration::from_secs(1));
        assert_eq!(config.retry.max_delay, Duration::from_secs(30));
        assert_eq!(config.interview_questions, 5);
        assert_eq!(config.event_buffer, 32);
    }

    #[test]
    fn test_partial_override() {
        let config = PipelineConfig {
            max_videos_per_session: 1,
            ..Default::default()
        };
        assert_eq!(config.max_videos_per_session, 1);
        assert_eq!(config.max_fix_attempts, 2);
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"max_fix_attempts": 0, "event_buffer": 8}"#).unwrap();
        assert_eq!(config.max_fix_attempts, 0);
        assert_eq!(config.event_buffer, 8);
        assert_eq!(config.max_concurrent_calls, 5);
    }
}
