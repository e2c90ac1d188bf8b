//! Session initialization - confirm the call leg and obtain the next action
//!
//! How the action is chosen from ANI/DNIS/domain/initializer is business
//! logic owned by the embedding application; it is injected through
//! [`ActionDecider`].

use super::{check_reply, require_non_empty, Activity};
use crate::domain::call::{CallSession, Command};
use crate::domain::output::{Metadata, WorkflowOutput};
use crate::domain::shared::Result;
use crate::domain::switch::SwitchClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInitInput {
    #[serde(default)]
    pub ani: String,
    #[serde(default)]
    pub dnis: String,
    #[serde(default)]
    pub domain: String,
    pub session_id: String,
    #[serde(default)]
    pub initializer: String,
    pub timeout_seconds: u64,
}

impl From<&CallSession> for SessionInitInput {
    fn from(session: &CallSession) -> Self {
        Self {
            ani: session.ani().to_string(),
            dnis: session.dnis().to_string(),
            domain: session.domain().to_string(),
            session_id: session.session_id().to_string(),
            initializer: session.initializer().to_string(),
            timeout_seconds: session.timeout_seconds(),
        }
    }
}

/// Decides what a freshly initialized session does next.
///
/// The returned metadata must carry `action` and whatever the chosen
/// branch needs (`destination` and `gateway` for originate, optionally
/// `hangupCause` for hangup).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActionDecider: Send + Sync {
    async fn decide(&self, input: &SessionInitInput) -> Result<Metadata>;
}

/// Decider that answers every session with the same metadata
#[derive(Debug, Clone, Default)]
pub struct StaticActionDecider {
    metadata: Metadata,
}

impl StaticActionDecider {
    pub fn new(metadata: Metadata) -> Self {
        Self { metadata }
    }
}

#[async_trait]
impl ActionDecider for StaticActionDecider {
    async fn decide(&self, _input: &SessionInitInput) -> Result<Metadata> {
        Ok(self.metadata.clone())
    }
}

pub struct SessionInitActivity {
    client: Arc<dyn SwitchClient>,
    decider: Arc<dyn ActionDecider>,
}

impl SessionInitActivity {
    pub const NAME: &'static str = "SessionInit";

    pub fn new(client: Arc<dyn SwitchClient>, decider: Arc<dyn ActionDecider>) -> Self {
        Self { client, decider }
    }

    pub fn command(input: &SessionInitInput) -> Command {
        Command::new("uuid_exists", input.session_id.clone())
    }
}

#[async_trait]
impl Activity for SessionInitActivity {
    type Input = SessionInitInput;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn execute(&self, input: SessionInitInput) -> Result<WorkflowOutput> {
        require_non_empty(&input.session_id, "sessionId")?;

        let reply = self.client.api(&Self::command(&input)).await?;
        if check_reply(&reply)? != "true" {
            warn!("Session {} is not known to the switch", input.session_id);
            return Ok(WorkflowOutput::failed(Metadata {
                message: Some(format!("session {} does not exist", input.session_id)),
                ..Default::default()
            }));
        }

        let metadata = self.decider.decide(&input).await?;

        info!(
            "Session {} initialized ({} -> {}@{}), action: {:?}",
            input.session_id, input.ani, input.dnis, input.domain, metadata.action
        );

        Ok(WorkflowOutput::succeeded(metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::call::Action;
    use crate::domain::shared::FlowError;
    use crate::domain::switch::MockSwitchClient;
    use serde_json::json;

    fn payload() -> serde_json::Value {
        json!({
            "ani": "0901234567",
            "dnis": "1900",
            "domain": "pbx.example.com",
            "sessionId": "leg-a",
            "initializer": "ivr-main",
            "timeoutSeconds": 10
        })
    }

    #[tokio::test]
    async fn test_existing_session_uses_decider() {
        let mut client = MockSwitchClient::new();
        client
            .expect_api()
            .withf(|cmd| cmd.app_name == "uuid_exists" && cmd.app_args == "leg-a")
            .times(1)
            .returning(|_| Ok("true".to_string()));

        let mut decider = MockActionDecider::new();
        decider
            .expect_decide()
            .withf(|input| input.initializer == "ivr-main" && input.dnis == "1900")
            .times(1)
            .returning(|_| Ok(Metadata::with_action(Action::Bridge)));

        let activity = SessionInitActivity::new(Arc::new(client), Arc::new(decider));
        let output = activity.handle(payload()).await.unwrap();

        assert!(output.success);
        assert_eq!(output.action(), Some(Action::Bridge));
    }

    #[tokio::test]
    async fn test_unknown_session_is_unsuccessful() {
        let mut client = MockSwitchClient::new();
        client.expect_api().times(1).returning(|_| Ok("false".to_string()));
        let mut decider = MockActionDecider::new();
        decider.expect_decide().never();

        let activity = SessionInitActivity::new(Arc::new(client), Arc::new(decider));
        let output = activity.handle(payload()).await.unwrap();

        assert!(!output.success);
        assert_eq!(output.metadata.message.as_deref(), Some("session leg-a does not exist"));
    }

    #[tokio::test]
    async fn test_bad_payload_issues_no_command() {
        let mut client = MockSwitchClient::new();
        client.expect_api().never();

        let activity = SessionInitActivity::new(
            Arc::new(client),
            Arc::new(StaticActionDecider::default()),
        );
        let err = activity.handle(json!({ "ani": "100" })).await.unwrap_err();
        assert!(matches!(err, FlowError::Input(_)));
    }

    #[tokio::test]
    async fn test_static_decider() {
        let decider = StaticActionDecider::new(Metadata {
            action: Some(Action::Hangup),
            hangup_cause: Some("CALL_REJECTED".to_string()),
            ..Default::default()
        });
        let input: SessionInitInput = serde_json::from_value(payload()).unwrap();
        let metadata = decider.decide(&input).await.unwrap();
        assert_eq!(metadata.hangup_cause.as_deref(), Some("CALL_REJECTED"));
    }
}
