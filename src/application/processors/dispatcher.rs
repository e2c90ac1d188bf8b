//! Routes switch events to processors

use super::ActivityProcessorFactory;
use crate::domain::output::WorkflowOutput;
use crate::domain::shared::Result;
use crate::domain::switch::SwitchEvent;
use metrics::counter;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Channel variable naming the action an event asks for
pub const ACTION_HEADER: &str = "variable_callflow_action";

pub struct ReflexDispatcher {
    factory: ActivityProcessorFactory,
}

impl ReflexDispatcher {
    pub fn new(factory: ActivityProcessorFactory) -> Self {
        Self { factory }
    }

    /// Handle one event. Events that do not name an action return `None`.
    pub async fn dispatch(&self, event: &SwitchEvent) -> Option<Result<WorkflowOutput>> {
        let action = event.header(ACTION_HEADER)?.trim();
        if action.is_empty() {
            return None;
        }

        debug!(
            "Dispatching {} for leg {:?} ({:?})",
            action,
            event.unique_id(),
            event.event_name()
        );

        let result = match self.factory.create(action) {
            Ok(processor) => processor.handle(event).await,
            Err(e) => Err(e),
        };

        let outcome = match &result {
            Ok(output) if output.success => "success",
            Ok(_) => "unsuccessful",
            Err(e) => e.kind(),
        };
        counter!("callflow_reflex_events_total", "action" => action.to_string(), "outcome" => outcome)
            .increment(1);

        match &result {
            Ok(output) => info!("Reflex {} handled (success: {})", action, output.success),
            Err(e) => warn!("Reflex {} failed: {}", action, e),
        }

        Some(result)
    }

    /// Handle events until the channel closes, each on its own task
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<SwitchEvent>) {
        info!("Reflex dispatcher started");

        while let Some(event) = events.recv().await {
            let dispatcher = self.clone();
            tokio::spawn(async move {
                dispatcher.dispatch(&event).await;
            });
        }

        error!("Switch event stream closed, reflex dispatcher stopped");
    }
}
