//! Hangup activity - terminate a leg with an optional cause

use super::{check_reply, require_non_empty, Activity};
use crate::domain::call::Command;
use crate::domain::output::{Metadata, WorkflowOutput};
use crate::domain::shared::Result;
use crate::domain::switch::SwitchClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HangupInput {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hangup_cause: Option<String>,
}

pub struct HangupActivity {
    client: Arc<dyn SwitchClient>,
}

impl HangupActivity {
    pub const NAME: &'static str = "Hangup";

    pub fn new(client: Arc<dyn SwitchClient>) -> Self {
        Self { client }
    }

    pub fn command(input: &HangupInput) -> Command {
        match input.hangup_cause.as_deref().filter(|c| !c.is_empty()) {
            Some(cause) => Command::new("uuid_kill", format!("{} {}", input.session_id, cause)),
            None => Command::new("uuid_kill", input.session_id.clone()),
        }
    }
}

#[async_trait]
impl Activity for HangupActivity {
    type Input = HangupInput;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn execute(&self, input: HangupInput) -> Result<WorkflowOutput> {
        require_non_empty(&input.session_id, "sessionId")?;

        let reply = self.client.api(&Self::command(&input)).await?;
        let reply = check_reply(&reply)?;

        info!(
            "Hung up {} (cause: {})",
            input.session_id,
            input.hangup_cause.as_deref().unwrap_or("default")
        );

        Ok(WorkflowOutput::succeeded(Metadata {
            hangup_cause: input.hangup_cause,
            message: Some(reply),
            ..Default::default()
        }))
    }
}
