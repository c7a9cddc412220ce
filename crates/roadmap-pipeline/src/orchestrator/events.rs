//! Progress events and the bounded channel that carries them.
//!
//! One producer (the stage controller) and one consumer. Delivery is ordered
//! and never drops an event while the consumer is alive. When the consumer
//! goes away the run is marked abandoned; the controller checks that flag
//! before every stage transition.

use super::state::PipelineStage;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A notification about a pipeline run.
///
/// Serializes as `{"kind": "...", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A stage started. Revising carries the attempt number and the cap.
    #[serde(rename_all = "camelCase")]
    StageUpdate {
        stage: PipelineStage,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attempt: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_attempts: Option<u32>,
    },
    /// One more session finished researching.
    #[serde(rename_all = "camelCase")]
    SessionProgress {
        current: usize,
        total: usize,
        session_title: String,
    },
    #[serde(rename_all = "camelCase")]
    TitleSuggestion { suggested_title: String },
    #[serde(rename_all = "camelCase")]
    StageComplete {
        stage: PipelineStage,
        summary: String,
    },
    #[serde(rename_all = "camelCase")]
    Complete { roadmap_id: String, message: String },
    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

impl ProgressEvent {
    pub fn stage_update(stage: PipelineStage, message: impl Into<String>) -> Self {
        ProgressEvent::StageUpdate {
            stage,
            message: message.into(),
            attempt: None,
            max_attempts: None,
        }
    }

    /// `complete` or `error`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Complete { .. } | ProgressEvent::Error { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::StageUpdate { .. } => "stage_update",
            ProgressEvent::SessionProgress { .. } => "session_progress",
            ProgressEvent::TitleSuggestion { .. } => "title_suggestion",
            ProgressEvent::StageComplete { .. } => "stage_complete",
            ProgressEvent::Complete { .. } => "complete",
            ProgressEvent::Error { .. } => "error",
        }
    }
}

/// Creates a connected sender/stream pair holding at most `buffer` undelivered events.
pub fn progress_channel(buffer: usize) -> (EventSender, ProgressStream) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let abandoned = CancellationToken::new();
    (
        EventSender {
            tx,
            abandoned: abandoned.clone(),
        },
        ProgressStream { rx, abandoned },
    )
}

/// Producer side, owned by the stage controller.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<ProgressEvent>,
    abandoned: CancellationToken,
}

impl EventSender {
    /// Waits for buffer space and delivers `event`.
    ///
    /// Returns `false` if the run is abandoned or the consumer is gone; in the
    /// latter case the run is marked abandoned.
    pub async fn send(&self, event: ProgressEvent) -> bool {
        if self.abandoned.is_cancelled() {
            debug!(kind = event.kind(), "Run abandoned, not sending event");
            return false;
        }
        match self.tx.send(event).await {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                info!(
                    kind = event.kind(),
                    "Progress consumer disconnected, marking run abandoned"
                );
                self.abandoned.cancel();
                false
            }
        }
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.is_cancelled() || self.tx.is_closed()
    }

    /// Token that abandons the run when cancelled.
    pub fn abandon_token(&self) -> CancellationToken {
        self.abandoned.clone()
    }
}

/// Consumer side. Dropping it abandons the run.
#[derive(Debug)]
pub struct ProgressStream {
    rx: mpsc::Receiver<ProgressEvent>,
    abandoned: CancellationToken,
}

impl ProgressStream {
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Stops the run before its next stage transition.
    pub fn abandon(&self) {
        self.abandoned.cancel();
    }
}

impl Stream for ProgressStream {
    type Item = ProgressEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for ProgressStream {
    fn drop(&mut self) {
        self.abandoned.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let event = ProgressEvent::SessionProgress {
            current: 2,
            total: 8,
            session_title: "Loops".into(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "kind": "session_progress",
                "payload": {"current": 2, "total": 8, "sessionTitle": "Loops"}
            })
        );

        let complete = ProgressEvent::Complete {
            roadmap_id: "r1".into(),
            message: "done".into(),
        };
        assert_eq!(
            serde_json::to_value(&complete).unwrap()["payload"]["roadmapId"],
            "r1"
        );
    }

    #[test]
    fn test_stage_update_omits_empty_attempt() {
        let value =
            serde_json::to_value(ProgressEvent::stage_update(PipelineStage::Researching, "go"))
                .unwrap();
        assert_eq!(
            value,
            json!({"kind": "stage_update", "payload": {"stage": "researching", "message": "go"}})
        );
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (sender, stream) = progress_channel(4);
        tokio::spawn(async move {
            for stage in [PipelineStage::Interviewing, PipelineStage::Architecting] {
                sender.send(ProgressEvent::stage_update(stage, "")).await;
            }
        });
        let kinds: Vec<PipelineStage> = stream
            .filter_map(|e| async move {
                match e {
                    ProgressEvent::StageUpdate { stage, .. } => Some(stage),
                    _ => None,
                }
            })
            .collect()
            .await;
        assert_eq!(
            kinds,
            vec![PipelineStage::Interviewing, PipelineStage::Architecting]
        );
    }

    #[tokio::test]
    async fn test_dropping_stream_abandons() {
        let (sender, stream) = progress_channel(1);
        assert!(!sender.is_abandoned());
        drop(stream);
        assert!(sender.is_abandoned());
        assert!(!sender.send(ProgressEvent::Error { message: "x".into() }).await);
    }

    #[tokio::test]
    async fn test_explicit_abandon() {
        let (sender, stream) = progress_channel(1);
        stream.abandon();
        assert!(sender.is_abandoned());
        assert!(sender.abandon_token().is_cancelled());
    }
}
