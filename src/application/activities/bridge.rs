//! Bridge activity - join two existing legs

use super::{check_reply, require_non_empty, Activity};
use crate::domain::call::Command;
use crate::domain::output::{Metadata, WorkflowOutput};
use crate::domain::shared::{FlowError, Result};
use crate::domain::switch::SwitchClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeInput {
    /// Leg that stays (the original inbound call)
    pub originator: String,
    /// Leg joined to it
    pub originatee: String,
}

pub struct BridgeActivity {
    client: Arc<dyn SwitchClient>,
}

impl BridgeActivity {
    pub const NAME: &'static str = "Bridge";

    pub fn new(client: Arc<dyn SwitchClient>) -> Self {
        Self { client }
    }

    pub fn command(input: &BridgeInput) -> Command {
        Command::new("uuid_bridge", format!("{} {}", input.originator, input.originatee))
    }
}

#[async_trait]
impl Activity for BridgeActivity {
    type Input = BridgeInput;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn execute(&self, input: BridgeInput) -> Result<WorkflowOutput> {
        require_non_empty(&input.originator, "originator")?;
        require_non_empty(&input.originatee, "originatee")?;
        if input.originator == input.originatee {
            return Err(FlowError::input(format!(
                "cannot bridge leg {} to itself",
                input.originator
            )));
        }

        let reply = self.client.api(&Self::command(&input)).await?;
        let reply = check_reply(&reply)?;

        info!("Bridged {} with {}", input.originator, input.originatee);

        Ok(WorkflowOutput::succeeded(Metadata {
            message: Some(reply),
            ..Default::default()
        }))
    }
}
