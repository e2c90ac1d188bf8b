//! In-memory checkpoint store
//!
//! Survives nothing but a dropped future; used for tests and for
//! deployments that accept losing in-flight calls on restart.

use crate::domain::checkpoint::{Checkpoint, CheckpointStore};
use crate::domain::shared::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Clone, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Arc<RwLock<HashMap<String, Checkpoint>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.checkpoints.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, workflow_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.checkpoints.read().await.get(workflow_id).cloned())
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        debug!(
            "Saving checkpoint {} ({})",
            checkpoint.workflow_id,
            checkpoint.state.as_str()
        );
        self.checkpoints
            .write()
            .await
            .insert(checkpoint.workflow_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn delete(&self, workflow_id: &str) -> Result<()> {
        self.checkpoints.write().await.remove(workflow_id);
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<Checkpoint>> {
        let mut pending: Vec<Checkpoint> = self
            .checkpoints
            .read()
            .await
            .values()
            .filter(|c| !c.state.is_terminal())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pending)
    }
}
