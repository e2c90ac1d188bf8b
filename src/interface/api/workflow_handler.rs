//! Workflow API handlers

use super::dto::{status_for, ApiResponse, CancelResponse, WorkflowStatusResponse};
use crate::application::workflow::InboundCallWorkflow;
use crate::domain::output::WorkflowOutput;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared state for workflow routes
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<InboundCallWorkflow>,
}

impl AppState {
    pub fn new(workflow: Arc<InboundCallWorkflow>) -> Self {
        Self { workflow }
    }
}

/// Health check handler
pub async fn health_check() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("OK"))
}

/// Run an inbound call workflow to completion.
///
/// The run is spawned so it is never dropped halfway through a step. If the
/// client goes away first the run is cancelled and compensates itself.
pub async fn start_inbound(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<ApiResponse<WorkflowOutput>>) {
    info!("API: Starting inbound workflow");

    let mut abandon = CancelOnDrop {
        workflow: state.workflow.clone(),
        workflow_id: payload
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::to_string),
    };

    let workflow = state.workflow.clone();
    let run = tokio::spawn(async move { workflow.start(payload).await });
    let result = run.await;
    abandon.workflow_id = None;

    match result {
        Ok(Ok(output)) => (StatusCode::OK, Json(ApiResponse::success(output))),
        Ok(Err(e)) => {
            error!("API: Inbound workflow failed: {}", e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
        Err(e) => {
            error!("API: Inbound workflow task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(format!("workflow task failed: {}", e))),
            )
        }
    }
}

/// Cancels the spawned run when the request future is dropped before it ends
struct CancelOnDrop {
    workflow: Arc<InboundCallWorkflow>,
    workflow_id: Option<String>,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(id) = self.workflow_id.take() {
            warn!(workflow_id = %id, "API: Client went away, cancelling workflow");
            self.workflow.signal_cancel(&id);
        }
    }
}

/// Get the stored progress of a workflow
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<WorkflowStatusResponse>>, StatusCode> {
    info!("API: Getting workflow {}", id);

    match state.workflow.status(&id).await {
        Ok(Some(checkpoint)) => {
            let running = state.workflow.is_running(&id);
            Ok(Json(ApiResponse::success(WorkflowStatusResponse::new(checkpoint, running))))
        }
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("Failed to load workflow {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Cancel a workflow and tear down its pending leg
pub async fn cancel_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<ApiResponse<CancelResponse>>) {
    info!("API: Cancelling workflow {}", id);

    match state.workflow.cancel(&id).await {
        Ok(cancelled) => (
            StatusCode::OK,
            Json(ApiResponse::success(CancelResponse {
                workflow_id: id,
                cancelled,
            })),
        ),
        Err(e) => {
            error!("Failed to cancel workflow {}: {}", id, e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}
