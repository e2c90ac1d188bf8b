//! Originate activity - create a new outbound leg through a gateway

use super::{check_reply, require_non_empty, Activity};
use crate::domain::call::{CallDirection, Command, DEFAULT_TIMEOUT_SECS};
use crate::domain::output::{Metadata, WorkflowOutput};
use crate::domain::shared::Result;
use crate::domain::switch::SwitchClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_direction() -> CallDirection {
    CallDirection::Inbound
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginateInput {
    pub destination: String,
    pub gateway: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Id to assign to the new leg
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_seconds: u64,
    /// Fail as soon as the far end rejects instead of trying further
    #[serde(default)]
    pub allow_reject: bool,
    #[serde(default)]
    pub auto_answer: bool,
    #[serde(default = "default_direction")]
    pub direction: CallDirection,
}

pub struct OriginateActivity {
    client: Arc<dyn SwitchClient>,
}

impl OriginateActivity {
    pub const NAME: &'static str = "Originate";

    pub fn new(client: Arc<dyn SwitchClient>) -> Self {
        Self { client }
    }

    /// Dial string of the new leg
    pub fn dial_string(input: &OriginateInput) -> String {
        match input.profile.as_deref().filter(|p| !p.is_empty()) {
            Some(profile) => format!("sofia/{}/{}@{}", profile, input.destination, input.gateway),
            None => format!("sofia/gateway/{}/{}", input.gateway, input.destination),
        }
    }

    pub fn command(input: &OriginateInput) -> Command {
        let mut variables = Vec::with_capacity(5);
        if let Some(uid) = input.uid.as_deref().filter(|u| !u.is_empty()) {
            variables.push(format!("origination_uuid={}", uid));
        }
        variables.push(format!("originate_timeout={}", input.timeout_seconds));
        variables.push(format!("fail_on_single_reject={}", input.allow_reject));
        variables.push(format!("sip_auto_answer={}", input.auto_answer));
        variables.push(format!("call_direction={}", input.direction));

        Command::new(
            "originate",
            format!("{{{}}}{} &park()", variables.join(","), Self::dial_string(input)),
        )
    }
}

#[async_trait]
impl Activity for OriginateActivity {
    type Input = OriginateInput;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn execute(&self, input: OriginateInput) -> Result<WorkflowOutput> {
        require_non_empty(&input.destination, "destination")?;
        require_non_empty(&input.gateway, "gateway")?;

        let reply = self.client.api(&Self::command(&input)).await?;
        let reply = check_reply(&reply)?;

        let mut metadata = Metadata {
            destination: Some(input.destination.clone()),
            gateway: Some(input.gateway.clone()),
            profile: input.profile.clone(),
            message: Some(reply.clone()),
            ..Default::default()
        };

        let Some(rest) = reply.strip_prefix("+OK") else {
            warn!("Originate to {} returned unexpected reply: {}", input.destination, reply);
            return Ok(WorkflowOutput::failed(metadata));
        };

        metadata.uid = Some(rest.trim())
            .filter(|uid| !uid.is_empty())
            .map(str::to_string)
            .or(input.uid);

        info!(
            "Originated {} via {} (uid: {:?})",
            input.destination, input.gateway, metadata.uid
        );

        Ok(WorkflowOutput::succeeded(metadata))
    }
}
