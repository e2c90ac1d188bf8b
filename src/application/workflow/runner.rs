//! Activity runner - worker slots, timeouts and retries

use super::options::ActivityOptions;
use crate::application::activities::Activity;
use crate::domain::output::WorkflowOutput;
use crate::domain::shared::{FlowError, Result};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs activities on a bounded pool of worker slots.
///
/// Slots are shared by every call, so activities of different calls run in
/// parallel up to the pool size.
#[derive(Clone)]
pub struct ActivityRunner {
    slots: Arc<Semaphore>,
}

impl ActivityRunner {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Run an activity to completion, retrying retryable failures
    pub async fn run<A: Activity>(
        &self,
        activity: &A,
        input: A::Input,
        options: &ActivityOptions,
    ) -> Result<WorkflowOutput> {
        let name = activity.name();
        let mut attempt = 1;

        loop {
            let started = Instant::now();
            let result = self.attempt(activity, input.clone(), options).await;
            histogram!("callflow_activity_duration_seconds", "activity" => name)
                .record(started.elapsed().as_secs_f64());

            match result {
                Ok(output) => {
                    let outcome = if output.success { "success" } else { "unsuccessful" };
                    counter!("callflow_activity_executions_total", "activity" => name, "outcome" => outcome)
                        .increment(1);
                    return Ok(output);
                }
                Err(err) if err.is_retryable() && attempt < options.retry.max_attempts => {
                    let delay = options.retry.backoff(attempt);
                    warn!(
                        activity = name,
                        attempt,
                        error = %err,
                        "Activity failed, retrying in {:?}",
                        delay
                    );
                    counter!("callflow_activity_retries_total", "activity" => name).increment(1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    counter!("callflow_activity_executions_total", "activity" => name, "outcome" => err.kind())
                        .increment(1);
                    return Err(err);
                }
            }
        }
    }

    async fn attempt<A: Activity>(
        &self,
        activity: &A,
        input: A::Input,
        options: &ActivityOptions,
    ) -> Result<WorkflowOutput> {
        let name = activity.name();

        let _permit = match timeout(options.schedule_to_start, self.slots.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(FlowError::Cancelled("activity workers shut down".to_string())),
            Err(_) => {
                return Err(FlowError::Timeout(format!(
                    "{} was not started within {:?}",
                    name, options.schedule_to_start
                )))
            }
        };

        debug!(activity = name, "Activity started");

        match timeout(options.start_to_close, activity.execute(input)).await {
            Ok(result) => result,
            Err(_) => Err(FlowError::Timeout(format!(
                "{} did not complete within {:?}",
                name, options.start_to_close
            ))),
        }
    }
}
