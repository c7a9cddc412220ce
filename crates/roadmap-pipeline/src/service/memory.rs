use super::{RoadmapDraft, RoadmapStore, ServiceError};
use crate::models::short_id;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Keeps saved roadmaps in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRoadmapStore {
    saved: Mutex<Vec<(String, RoadmapDraft)>>,
}

impl InMemoryRoadmapStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every saved draft with its id, in save order.
    pub async fn saved(&self) -> Vec<(String, RoadmapDraft)> {
        self.saved.lock().await.clone()
    }

    pub async fn get(&self, roadmap_id: &str) -> Option<RoadmapDraft> {
        self.saved
            .lock()
            .await
            .iter()
            .find(|(id, _)| id == roadmap_id)
            .map(|(_, draft)| draft.clone())
    }
}

#[async_trait]
impl RoadmapStore for InMemoryRoadmapStore {
    async fn save(&self, draft: RoadmapDraft) -> Result<String, ServiceError> {
        let roadmap_id = short_id("roadmap");
        self.saved.lock().await.push((roadmap_id.clone(), draft));
        Ok(roadmap_id)
    }
}
