//! Originate processor - dial a new leg for a parked channel

use super::{payload_from_headers, ActivityProcessor, EventLedger};
use crate::application::activities::{Activity, OriginateActivity};
use crate::domain::call::Action;
use crate::domain::output::WorkflowOutput;
use crate::domain::shared::{FlowError, Result};
use crate::domain::switch::{SwitchClient, SwitchEvent};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const TIMEOUT_HEADER: &str = "variable_callflow_timeout";

/// Originates a new leg described by the event's `callflow_*` variables
pub struct OriginateProcessor {
    activity: OriginateActivity,
    ledger: Arc<EventLedger>,
}

impl OriginateProcessor {
    pub fn new(client: Arc<dyn SwitchClient>, ledger: Arc<EventLedger>) -> Self {
        Self {
            activity: OriginateActivity::new(client),
            ledger,
        }
    }

    fn payload(event: &SwitchEvent) -> Result<Value> {
        let mut payload = payload_from_headers(
            event,
            &[
                ("destination", "variable_callflow_destination"),
                ("gateway", "variable_callflow_gateway"),
                ("profile", "variable_callflow_profile"),
            ],
        );

        if let Some(raw) = event.header(TIMEOUT_HEADER) {
            let seconds: u64 = raw
                .trim()
                .parse()
                .map_err(|_| FlowError::input(format!("{} is not a number: {}", TIMEOUT_HEADER, raw)))?;
            payload["timeoutSeconds"] = Value::from(seconds);
        }

        Ok(payload)
    }
}

#[async_trait]
impl ActivityProcessor for OriginateProcessor {
    fn action(&self) -> &str {
        Action::Originate.as_str()
    }

    async fn handle(&self, event: &SwitchEvent) -> Result<WorkflowOutput> {
        let payload = Self::payload(event)?;
        self.ledger
            .run_once(self.action(), event, || self.activity.handle(payload))
            .await
    }
}
