//! Workflow API data transfer objects

use crate::domain::checkpoint::{Checkpoint, StepRecord};
use crate::domain::output::WorkflowOutput;
use crate::domain::shared::FlowError;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Stored workflow progress
#[derive(Debug, Serialize)]
pub struct WorkflowStatusResponse {
    pub workflow_id: String,
    pub state: &'static str,
    pub running: bool,
    pub steps: Vec<StepRecord>,
    pub output: Option<WorkflowOutput>,
    pub error: Option<FlowError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowStatusResponse {
    pub fn new(checkpoint: Checkpoint, running: bool) -> Self {
        Self {
            workflow_id: checkpoint.workflow_id,
            state: checkpoint.state.as_str(),
            running,
            steps: checkpoint.steps,
            output: checkpoint.output,
            error: checkpoint.error,
            created_at: checkpoint.created_at,
            updated_at: checkpoint.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub workflow_id: String,
    pub cancelled: bool,
}

/// HTTP status for a workflow error
pub fn status_for(error: &FlowError) -> StatusCode {
    match error {
        FlowError::Input(_) | FlowError::MissingField(_) | FlowError::UnsupportedAction(_) => {
            StatusCode::BAD_REQUEST
        }
        FlowError::AlreadyRunning(_) | FlowError::Cancelled(_) => StatusCode::CONFLICT,
        FlowError::Transport(_) | FlowError::Timeout(_) => StatusCode::BAD_GATEWAY,
        FlowError::Checkpoint(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
