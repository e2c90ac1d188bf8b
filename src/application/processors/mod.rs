//! Reflex path - one-off commands triggered by raw switch events
//!
//! Unlike the inbound workflow nothing here is checkpointed. Each event
//! carries the action to perform in `variable_callflow_action`; the
//! [`ActivityProcessorFactory`] turns that key into a processor which
//! derives the activity input from the event headers.

pub mod bridge;
pub mod dispatcher;
pub mod factory;
pub mod hangup;
pub mod ledger;
pub mod originate;

pub use bridge::BridgeProcessor;
pub use dispatcher::{ReflexDispatcher, ACTION_HEADER};
pub use factory::{processor_constructor, ActivityProcessorFactory, ProcessorConstructor};
pub use hangup::HangupProcessor;
pub use ledger::{EventLedger, DEFAULT_LEDGER_CAPACITY};
pub use originate::OriginateProcessor;

use crate::domain::output::WorkflowOutput;
use crate::domain::shared::Result;
use crate::domain::switch::SwitchEvent;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Handles a switch event for one action
#[async_trait]
pub trait ActivityProcessor: Send + Sync {
    /// Action key this processor is registered under
    fn action(&self) -> &str;

    /// Handle an event. Safe to call again for a redelivered event.
    async fn handle(&self, event: &SwitchEvent) -> Result<WorkflowOutput>;
}

/// Build an activity payload from event headers.
///
/// Absent headers are left out so the activity's own input conversion
/// reports them.
pub(crate) fn payload_from_headers(event: &SwitchEvent, fields: &[(&str, &str)]) -> Value {
    let mut payload = Map::new();
    for (field, header) in fields {
        if let Some(value) = event.header(header) {
            payload.insert(field.to_string(), Value::String(value.to_string()));
        }
    }
    Value::Object(payload)
}
