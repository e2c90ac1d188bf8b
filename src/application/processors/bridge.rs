//! Bridge processor - join a parked channel to another leg

use super::{payload_from_headers, ActivityProcessor, EventLedger};
use crate::application::activities::{Activity, BridgeActivity};
use crate::domain::call::Action;
use crate::domain::output::WorkflowOutput;
use crate::domain::shared::Result;
use crate::domain::switch::{SwitchClient, SwitchEvent};
use async_trait::async_trait;
use std::sync::Arc;

/// Bridges the event's leg to the leg named in `variable_callflow_bridge_to`
pub struct BridgeProcessor {
    activity: BridgeActivity,
    ledger: Arc<EventLedger>,
}

impl BridgeProcessor {
    pub fn new(client: Arc<dyn SwitchClient>, ledger: Arc<EventLedger>) -> Self {
        Self {
            activity: BridgeActivity::new(client),
            ledger,
        }
    }
}

#[async_trait]
impl ActivityProcessor for BridgeProcessor {
    fn action(&self) -> &str {
        Action::Bridge.as_str()
    }

    async fn handle(&self, event: &SwitchEvent) -> Result<WorkflowOutput> {
        let payload = payload_from_headers(
            event,
            &[
                ("originator", "Unique-ID"),
                ("originatee", "variable_callflow_bridge_to"),
            ],
        );
        self.ledger
            .run_once(self.action(), event, || self.activity.handle(payload))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::switch::MockSwitchClient;

    fn event() -> SwitchEvent {
        SwitchEvent::default()
            .with_header("Core-UUID", "core-1")
            .with_header("Event-Sequence", "42")
            .with_header("Unique-ID", "leg-a")
            .with_header("variable_callflow_bridge_to", "leg-b")
    }

    #[tokio::test]
    async fn test_redelivered_event_bridges_once() {
        let mut client = MockSwitchClient::new();
        client
            .expect_api()
            .withf(|cmd| cmd.app_name == "uuid_bridge" && cmd.app_args == "leg-a leg-b")
            .times(1)
            .returning(|_| Ok("+OK".to_string()));

        let processor = BridgeProcessor::new(Arc::new(client), Arc::new(EventLedger::default()));

        let first = processor.handle(&event()).await.unwrap();
        let second = processor.handle(&event()).await.unwrap();
        assert!(first.success);
        assert_eq!(first, second);
    }
}
