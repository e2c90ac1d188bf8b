//! Hangup processor - terminate a parked channel

use super::{payload_from_headers, ActivityProcessor, EventLedger};
use crate::application::activities::{Activity, HangupActivity};
use crate::domain::call::Action;
use crate::domain::output::WorkflowOutput;
use crate::domain::shared::Result;
use crate::domain::switch::{SwitchClient, SwitchEvent};
use async_trait::async_trait;
use std::sync::Arc;

/// Hangs up the leg the event belongs to
pub struct HangupProcessor {
    activity: HangupActivity,
    ledger: Arc<EventLedger>,
}

impl HangupProcessor {
    pub fn new(client: Arc<dyn SwitchClient>, ledger: Arc<EventLedger>) -> Self {
        Self {
            activity: HangupActivity::new(client),
            ledger,
        }
    }
}

#[async_trait]
impl ActivityProcessor for HangupProcessor {
    fn action(&self) -> &str {
        Action::Hangup.as_str()
    }

    async fn handle(&self, event: &SwitchEvent) -> Result<WorkflowOutput> {
        let payload = payload_from_headers(
            event,
            &[
                ("sessionId", "Unique-ID"),
                ("hangupCause", "variable_callflow_hangup_cause"),
            ],
        );
        self.ledger
            .run_once(self.action(), event, || self.activity.handle(payload))
            .await
    }
}
