//! PostgreSQL implementation of the checkpoint store

use crate::domain::checkpoint::{Checkpoint, CheckpointStore};
use crate::domain::shared::{FlowError, Result};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{debug, error};

#[derive(FromRow)]
struct CheckpointRow {
    checkpoint: Json<Checkpoint>,
}

pub struct PgCheckpointStore {
    pool: PgPool,
}

impl PgCheckpointStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(operation: &str, e: sqlx::Error) -> FlowError {
    error!("Failed to {} checkpoint: {}", operation, e);
    FlowError::Checkpoint(format!("database error: {}", e))
}

#[async_trait]
impl CheckpointStore for PgCheckpointStore {
    async fn load(&self, workflow_id: &str) -> Result<Option<Checkpoint>> {
        let row = sqlx::query_as::<_, CheckpointRow>(
            "SELECT checkpoint FROM workflow_checkpoints WHERE workflow_id = $1",
        )
        .bind(workflow_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("load", e))?;

        Ok(row.map(|r| r.checkpoint.0))
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        debug!(
            "Saving checkpoint {} ({})",
            checkpoint.workflow_id,
            checkpoint.state.as_str()
        );

        sqlx::query(
            r#"
            INSERT INTO workflow_checkpoints (workflow_id, state, checkpoint, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (workflow_id) DO UPDATE
            SET state = EXCLUDED.state,
                checkpoint = EXCLUDED.checkpoint,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&checkpoint.workflow_id)
        .bind(checkpoint.state.as_str())
        .bind(Json(checkpoint))
        .bind(checkpoint.created_at)
        .bind(checkpoint.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("save", e))?;

        Ok(())
    }

    async fn delete(&self, workflow_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM workflow_checkpoints WHERE workflow_id = $1")
            .bind(workflow_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete", e))?;

        debug!("Checkpoint deleted: {}", workflow_id);
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<Checkpoint>> {
        let rows = sqlx::query_as::<_, CheckpointRow>(
            r#"
            SELECT checkpoint FROM workflow_checkpoints
            WHERE state NOT IN ('succeeded', 'failed')
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list", e))?;

        Ok(rows.into_iter().map(|r| r.checkpoint.0).collect())
    }
}
