//! Prometheus metrics handler

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics exporter
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("callflow_activity_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
        )?
        .install_recorder()?;

    describe_metrics();

    Ok(handle)
}

fn describe_metrics() {
    describe_counter!(
        "callflow_workflows_started_total",
        "Total number of inbound call workflow runs started"
    );
    describe_counter!(
        "callflow_workflows_finished_total",
        "Total number of workflows that reached a terminal state"
    );
    describe_gauge!(
        "callflow_workflows_running",
        "Number of workflows currently running in this process"
    );
    describe_counter!(
        "callflow_activity_executions_total",
        "Total number of activity executions by outcome"
    );
    describe_histogram!(
        "callflow_activity_duration_seconds",
        "Activity attempt duration in seconds"
    );
    describe_counter!(
        "callflow_activity_retries_total",
        "Total number of activity retries"
    );
    describe_counter!(
        "callflow_reflex_events_total",
        "Total number of switch events handled by the reflex path"
    );
}

/// HTTP metrics handler
pub async fn metrics_handler(
    axum::extract::State(prometheus_handle): axum::extract::State<PrometheusHandle>,
) -> Response {
    let metrics = prometheus_handle.render();
    (StatusCode::OK, metrics).into_response()
}
