//! Durable workflow progress
//!
//! A [`Checkpoint`] is everything needed to rebuild an inbound call
//! workflow after the process dies: the session, an explicit state tag and
//! one [`StepRecord`] per activity invocation. The executor persists it
//! before and after every activity so a resumed run replays completed
//! steps from their records instead of re-issuing switch commands.

use crate::domain::call::CallSession;
use crate::domain::output::WorkflowOutput;
use crate::domain::shared::{FlowError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Workflow state tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    Init,
    /// Session initialization in progress
    Deciding,
    /// Nothing left to do, the decision output is the result
    Completing,
    HangingUp,
    /// Creating the second leg; `uid` is fixed before the command is sent
    Originating { uid: String },
    /// Joining the caller with leg `uid`
    Bridging { uid: String },
    Succeeded,
    Failed,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Init => "init",
            WorkflowState::Deciding => "deciding",
            WorkflowState::Completing => "completing",
            WorkflowState::HangingUp => "hanging_up",
            WorkflowState::Originating { .. } => "originating",
            WorkflowState::Bridging { .. } => "bridging",
            WorkflowState::Succeeded => "succeeded",
            WorkflowState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Succeeded | WorkflowState::Failed)
    }

    /// Leg that may exist on the switch without being bridged yet
    pub fn pending_leg(&self) -> Option<&str> {
        match self {
            WorkflowState::Originating { uid } | WorkflowState::Bridging { uid } => Some(uid),
            _ => None,
        }
    }

    /// Check if state transition is valid
    pub fn can_transition_to(&self, next: &WorkflowState) -> bool {
        use WorkflowState::*;

        match (self, next) {
            (Init, Deciding) => true,
            (Deciding, Completing | HangingUp | Originating { .. }) => true,
            (Originating { .. }, Bridging { .. }) => true,
            (Completing | HangingUp | Bridging { .. }, Succeeded) => true,
            // Any live state may fail
            (current, Failed) => !current.is_terminal(),
            _ => false,
        }
    }
}

/// Fixed step slots of the inbound call plan
pub mod step {
    pub const SESSION_INIT: u32 = 0;
    pub const HANGUP: u32 = 1;
    pub const ORIGINATE: u32 = 1;
    pub const BRIDGE: u32 = 2;
    /// Out-of-plan compensating hangup
    pub const COMPENSATION: u32 = 9;
}

/// One activity invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: u32,
    pub activity: String,
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<WorkflowOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FlowError>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepRecord {
    pub fn started(index: u32, activity: &str, input: Value) -> Self {
        Self {
            index,
            activity: activity.to_string(),
            input,
            output: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Completed with an output or a final error. A step that ended in a
    /// retryable error runs again when the workflow resumes.
    pub fn is_replayable(&self) -> bool {
        self.is_completed() && !self.error.as_ref().is_some_and(FlowError::is_retryable)
    }
}

/// Persisted workflow progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub workflow_id: String,
    pub session: CallSession,
    pub state: WorkflowState,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<WorkflowOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FlowError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Fresh checkpoint for a session; the workflow id is the session id
    pub fn new(session: CallSession) -> Self {
        let now = Utc::now();
        Self {
            workflow_id: session.session_id().to_string(),
            session,
            state: WorkflowState::Init,
            steps: Vec::new(),
            output: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn step(&self, index: u32) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.index == index)
    }

    /// Record that a step is about to run, replacing an interrupted attempt
    pub fn begin_step(&mut self, record: StepRecord) {
        self.steps.retain(|s| s.index != record.index);
        self.steps.push(record);
        self.touch();
    }

    /// Store the result of a started step
    pub fn complete_step(&mut self, index: u32, result: &Result<WorkflowOutput>) {
        if let Some(record) = self.steps.iter_mut().find(|s| s.index == index) {
            match result {
                Ok(output) => record.output = Some(output.clone()),
                Err(err) => record.error = Some(err.clone()),
            }
            record.completed_at = Some(Utc::now());
        }
        self.touch();
    }

    pub fn transition(&mut self, next: WorkflowState) -> Result<()> {
        if !self.state.can_transition_to(&next) {
            return Err(FlowError::Checkpoint(format!(
                "cannot transition workflow {} from {} to {}",
                self.workflow_id,
                self.state.as_str(),
                next.as_str()
            )));
        }
        self.state = next;
        self.touch();
        Ok(())
    }

    /// Move to `Succeeded` or `Failed` and keep the result
    pub fn finish(&mut self, output: WorkflowOutput, error: Option<FlowError>) -> Result<()> {
        let next = if error.is_none() && output.success {
            WorkflowState::Succeeded
        } else {
            WorkflowState::Failed
        };
        self.transition(next)?;
        self.output = Some(output);
        self.error = error;
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Checkpoint persistence port
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Find the checkpoint of a workflow
    async fn load(&self, workflow_id: &str) -> Result<Option<Checkpoint>>;

    /// Save a checkpoint (insert or update)
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Forget a workflow
    async fn delete(&self, workflow_id: &str) -> Result<()>;

    /// All checkpoints that have not reached a terminal state
    async fn list_pending(&self) -> Result<Vec<Checkpoint>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::output::Metadata;
    use std::time::Duration;

    fn session() -> CallSession {
        CallSession::new("100", "200", "example.com", "leg-a", "ivr", Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn test_valid_transitions() {
        let init = WorkflowState::Init;
        assert!(init.can_transition_to(&WorkflowState::Deciding));
        assert!(!init.can_transition_to(&WorkflowState::HangingUp));

        let deciding = WorkflowState::Deciding;
        assert!(deciding.can_transition_to(&WorkflowState::Originating { uid: "x".to_string() }));
        assert!(deciding.can_transition_to(&WorkflowState::Failed));
        assert!(!deciding.can_transition_to(&WorkflowState::Bridging { uid: "x".to_string() }));

        let originating = WorkflowState::Originating { uid: "x".to_string() };
        assert!(originating.can_transition_to(&WorkflowState::Bridging { uid: "x".to_string() }));
        assert!(!originating.can_transition_to(&WorkflowState::Succeeded));
    }

    #[test]
    fn test_terminal_states_are_final() {
        assert!(!WorkflowState::Succeeded.can_transition_to(&WorkflowState::Failed));
        assert!(!WorkflowState::Failed.can_transition_to(&WorkflowState::Deciding));
    }

    #[test]
    fn test_pending_leg() {
        assert_eq!(WorkflowState::Bridging { uid: "leg-b".to_string() }.pending_leg(), Some("leg-b"));
        assert_eq!(WorkflowState::HangingUp.pending_leg(), None);
    }

    #[test]
    fn test_retryable_failures_are_not_replayed() {
        let mut checkpoint = Checkpoint::new(session());
        checkpoint.begin_step(StepRecord::started(step::BRIDGE, "Bridge", serde_json::Value::Null));
        assert!(!checkpoint.step(step::BRIDGE).unwrap().is_replayable());

        checkpoint.complete_step(step::BRIDGE, &Err(FlowError::Transport("connection reset".to_string())));
        assert!(!checkpoint.step(step::BRIDGE).unwrap().is_replayable());

        checkpoint.complete_step(step::BRIDGE, &Err(FlowError::MissingField("gateway".to_string())));
        assert!(checkpoint.step(step::BRIDGE).unwrap().is_replayable());
    }

    #[test]
    fn test_step_bookkeeping() {
        let mut checkpoint = Checkpoint::new(session());
        assert_eq!(checkpoint.workflow_id, "leg-a");

        checkpoint.begin_step(StepRecord::started(step::SESSION_INIT, "SessionInit", Value::Null));
        assert!(!checkpoint.step(step::SESSION_INIT).unwrap().is_completed());

        checkpoint.complete_step(step::SESSION_INIT, &Ok(WorkflowOutput::succeeded(Metadata::default())));
        let record = checkpoint.step(step::SESSION_INIT).unwrap();
        assert!(record.is_completed());
        assert!(record.output.as_ref().unwrap().success);

        // A retried start replaces the previous record
        checkpoint.begin_step(StepRecord::started(step::SESSION_INIT, "SessionInit", Value::Null));
        assert_eq!(checkpoint.steps.len(), 1);
    }

    #[test]
    fn test_finish_picks_terminal_state() {
        let mut checkpoint = Checkpoint::new(session());
        checkpoint.transition(WorkflowState::Deciding).unwrap();
        checkpoint.transition(WorkflowState::Completing).unwrap();
        checkpoint.finish(WorkflowOutput::succeeded(Metadata::default()), None).unwrap();
        assert_eq!(checkpoint.state, WorkflowState::Succeeded);

        let mut failed = Checkpoint::new(session());
        failed
            .finish(WorkflowOutput::default(), Some(FlowError::input("bad")))
            .unwrap();
        assert_eq!(failed.state, WorkflowState::Failed);
        assert!(failed.transition(WorkflowState::Deciding).is_err());
    }

    #[test]
    fn test_checkpoint_json_shape() {
        let mut checkpoint = Checkpoint::new(session());
        checkpoint.transition(WorkflowState::Deciding).unwrap();
        checkpoint
            .transition(WorkflowState::Originating { uid: "leg-b".to_string() })
            .unwrap();

        let value = serde_json::to_value(&checkpoint).unwrap();
        assert_eq!(value["state"]["state"], "originating");
        assert_eq!(value["state"]["uid"], "leg-b");
        assert_eq!(value["session"]["sessionId"], "leg-a");

        let back: Checkpoint = serde_json::from_value(value).unwrap();
        assert_eq!(back, checkpoint);
    }
}
