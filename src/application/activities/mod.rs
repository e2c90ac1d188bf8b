//! Activities - stateless units that each issue exactly one switch command
//!
//! Every activity follows the same contract:
//! 1. Convert the generic payload to its typed input; a shape mismatch is
//!    an [`FlowError::Input`] and no command is sent.
//! 2. Build one [`Command`](crate::domain::call::Command) and send it
//!    through the shared [`SwitchClient`](crate::domain::switch::SwitchClient).
//! 3. Propagate transport errors unchanged; retrying is the engine's call.
//! 4. Normalize the reply into a [`WorkflowOutput`].

pub mod bridge;
pub mod hangup;
pub mod originate;
pub mod session_init;

pub use bridge::{BridgeActivity, BridgeInput};
pub use hangup::{HangupActivity, HangupInput};
pub use originate::{OriginateActivity, OriginateInput};
pub use session_init::{ActionDecider, SessionInitActivity, SessionInitInput, StaticActionDecider};

use crate::domain::output::WorkflowOutput;
use crate::domain::shared::{FlowError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A unit of work scheduled by the workflow engine
#[async_trait]
pub trait Activity: Send + Sync {
    /// Typed input of the activity
    type Input: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    /// Name recorded in checkpoints, logs and metrics
    fn name(&self) -> &'static str;

    /// Run the activity with an already typed input
    async fn execute(&self, input: Self::Input) -> Result<WorkflowOutput>;

    /// Run the activity from a generic payload
    async fn handle(&self, payload: Value) -> Result<WorkflowOutput> {
        let input = convert_input::<Self::Input>(payload, self.name())?;
        self.execute(input).await
    }
}

/// Convert a generic payload into an activity input
pub fn convert_input<T: DeserializeOwned>(payload: Value, activity: &str) -> Result<T> {
    serde_json::from_value(payload)
        .map_err(|e| FlowError::input(format!("cannot convert payload to {} input: {}", activity, e)))
}

pub(crate) fn require_non_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(FlowError::input(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Turn an `-ERR` reply into a transport error, otherwise return the trimmed body
pub(crate) fn check_reply(reply: &str) -> Result<String> {
    let reply = reply.trim();
    if let Some(reason) = reply.strip_prefix("-ERR") {
        let reason = reason.trim();
        return Err(FlowError::Transport(if reason.is_empty() {
            "switch rejected the command".to_string()
        } else {
            reason.to_string()
        }));
    }
    Ok(reply.to_string())
}
