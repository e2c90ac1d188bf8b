//! Inbound call workflow
//!
//! Drives one call from session initialization to its terminal state:
//!
//! ```text
//! Init -> Deciding -+-> Completing ----------------------> Succeeded
//!                   +-> HangingUp -----------------------> Succeeded
//!                   +-> Originating{uid} -> Bridging{uid} -> Succeeded
//!          (any live state) ---------------------------------> Failed
//! ```
//!
//! Every transition and every activity result is written to the
//! [`CheckpointStore`] before the next step starts. A resumed workflow
//! replays completed steps from their records and only re-issues the step
//! that was in flight when the previous run stopped.
//!
//! A run that fails or is cancelled while a new leg may exist hangs that leg
//! up with `ORIGINATOR_CANCEL` before the checkpoint is released. If the
//! hangup itself fails the checkpoint is kept, and the next resume or
//! compensation only retries the hangup.

use super::options::EngineOptions;
use super::runner::ActivityRunner;
use crate::application::activities::{
    ActionDecider, Activity, BridgeActivity, BridgeInput, HangupActivity, HangupInput,
    OriginateActivity, OriginateInput, SessionInitActivity, SessionInitInput,
};
use crate::domain::call::{Action, CallDirection, CallSession};
use crate::domain::checkpoint::{step, Checkpoint, CheckpointStore, StepRecord, WorkflowState};
use crate::domain::output::{MetadataKey, WorkflowOutput};
use crate::domain::shared::{FlowError, Result};
use crate::domain::switch::SwitchClient;
use futures::future::join_all;
use metrics::{counter, gauge};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Hangup cause used when a pending leg is torn down
pub const CANCEL_HANGUP_CAUSE: &str = "ORIGINATOR_CANCEL";

/// Switch error for a leg that does not exist (never answered or already hung up)
const NO_SUCH_CHANNEL: &str = "No such channel";

type RunningMap = Arc<Mutex<HashMap<String, watch::Sender<bool>>>>;

pub struct InboundCallWorkflow {
    session_init: SessionInitActivity,
    originate: OriginateActivity,
    bridge: BridgeActivity,
    hangup: HangupActivity,
    store: Arc<dyn CheckpointStore>,
    runner: ActivityRunner,
    options: EngineOptions,
    running: RunningMap,
}

impl InboundCallWorkflow {
    pub const NAME: &'static str = "InboundCallWorkflow";

    pub fn new(
        client: Arc<dyn SwitchClient>,
        decider: Arc<dyn ActionDecider>,
        store: Arc<dyn CheckpointStore>,
        options: EngineOptions,
    ) -> Self {
        Self {
            session_init: SessionInitActivity::new(client.clone(), decider),
            originate: OriginateActivity::new(client.clone()),
            bridge: BridgeActivity::new(client.clone()),
            hangup: HangupActivity::new(client),
            store,
            runner: ActivityRunner::new(options.max_concurrent_activities),
            options,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start (or continue) the workflow for a raw session payload.
    ///
    /// The workflow id is the session id. If a checkpoint already exists
    /// for it the stored progress is continued instead of starting over.
    pub async fn start(&self, mut payload: Value) -> Result<WorkflowOutput> {
        if let Value::Object(fields) = &mut payload {
            fields
                .entry("timeoutSeconds")
                .or_insert_with(|| Value::from(self.options.default_timeout_secs));
        }

        let session = CallSession::from_payload(&payload).map_err(|e| {
            error!("Rejected workflow input: {}", e);
            e
        })?;

        let checkpoint = match self.store.load(session.session_id()).await? {
            Some(existing) => {
                info!(
                    workflow_id = %existing.workflow_id,
                    state = existing.state.as_str(),
                    "Continuing existing workflow"
                );
                existing
            }
            None => {
                let checkpoint = Checkpoint::new(session);
                self.store.save(&checkpoint).await?;
                checkpoint
            }
        };

        self.run(checkpoint).await
    }

    /// Resume a stored workflow by id
    pub async fn resume(&self, workflow_id: &str) -> Result<WorkflowOutput> {
        let checkpoint = self
            .store
            .load(workflow_id)
            .await?
            .ok_or_else(|| FlowError::Checkpoint(format!("no checkpoint for workflow {}", workflow_id)))?;

        info!(workflow_id, state = checkpoint.state.as_str(), "Resuming workflow");
        self.run(checkpoint).await
    }

    /// Resume every workflow left unfinished by a previous process
    pub async fn resume_pending(&self) -> Result<Vec<(String, Result<WorkflowOutput>)>> {
        let pending = self.store.list_pending().await?;
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        info!("Resuming {} unfinished workflows", pending.len());

        let runs = pending.into_iter().map(|checkpoint| async move {
            let id = checkpoint.workflow_id.clone();
            (id, self.run(checkpoint).await)
        });

        Ok(join_all(runs).await)
    }

    /// Current checkpoint of a workflow, if it is still stored
    pub async fn status(&self, workflow_id: &str) -> Result<Option<Checkpoint>> {
        self.store.load(workflow_id).await
    }

    pub fn is_running(&self, workflow_id: &str) -> bool {
        lock(&self.running).contains_key(workflow_id)
    }

    /// Cancel a workflow.
    ///
    /// A running workflow is interrupted and compensated by its own run; a
    /// stored one is compensated here. Returns false if nothing was found.
    pub async fn cancel(&self, workflow_id: &str) -> Result<bool> {
        if self.signal_cancel(workflow_id) {
            return Ok(true);
        }

        self.compensate(workflow_id).await
    }

    /// Ask a running workflow to stop. Returns false if it is not running.
    pub fn signal_cancel(&self, workflow_id: &str) -> bool {
        let signalled = lock(&self.running)
            .get(workflow_id)
            .map(|tx| {
                tx.send_replace(true);
            })
            .is_some();

        if signalled {
            info!(workflow_id, "Cancellation requested");
        }
        signalled
    }

    /// Tear down the pending leg of a stored, non-running workflow and mark
    /// it failed. Returns false if there was nothing to compensate.
    pub async fn compensate(&self, workflow_id: &str) -> Result<bool> {
        let Some(mut checkpoint) = self.store.load(workflow_id).await? else {
            return Ok(false);
        };

        if checkpoint.state.is_terminal() {
            self.store.delete(workflow_id).await?;
            return Ok(false);
        }

        let _guard = self.register(workflow_id)?;

        match self.compensate_in_place(&mut checkpoint, "compensated by operator").await {
            Ok(_) | Err(FlowError::Cancelled(_)) => Ok(true),
            Err(e) => Err(e),
        }
    }

    async fn run(&self, mut checkpoint: Checkpoint) -> Result<WorkflowOutput> {
        if checkpoint.state.is_terminal() {
            return self.conclude_stored(checkpoint).await;
        }

        let (_guard, mut cancel_rx) = self.register(&checkpoint.workflow_id)?;
        counter!("callflow_workflows_started_total").increment(1);

        let outcome = match checkpoint.error.take() {
            // An earlier run failed without tearing its leg down
            Some(err) => Some(Err(err)),
            None => tokio::select! {
                result = self.drive(&mut checkpoint) => Some(result),
                _ = cancelled(&mut cancel_rx) => None,
            },
        };

        match outcome {
            Some(result) => {
                let (output, error) = match result {
                    Ok(output) => (output, None),
                    Err(err) => (checkpoint.output.clone().unwrap_or_default(), Some(err)),
                };

                let failed = error.is_some() || !output.success;
                if failed && checkpoint.state.pending_leg().is_some() {
                    if let Err(e) = self.hang_up_pending_leg(&mut checkpoint).await {
                        return self.retain(&mut checkpoint, error.unwrap_or(e)).await;
                    }
                }

                self.conclude(&mut checkpoint, output, error).await
            }
            None => self.compensate_in_place(&mut checkpoint, "cancelled by caller").await,
        }
    }

    /// Advance the state machine until it produces the final output
    async fn drive(&self, checkpoint: &mut Checkpoint) -> Result<WorkflowOutput> {
        loop {
            debug!(
                workflow_id = %checkpoint.workflow_id,
                state = checkpoint.state.as_str(),
                "Driving workflow"
            );

            match checkpoint.state.clone() {
                WorkflowState::Init => {
                    checkpoint.transition(WorkflowState::Deciding)?;
                    self.store.save(checkpoint).await?;
                }
                WorkflowState::Deciding => {
                    let input = SessionInitInput::from(&checkpoint.session);
                    let output = self
                        .step(checkpoint, step::SESSION_INIT, &self.session_init, input)
                        .await?;
                    if !output.success {
                        return Ok(output);
                    }

                    let next = match output.action() {
                        Some(Action::Hangup) => WorkflowState::HangingUp,
                        Some(Action::Originate) => {
                            output.metadata.require(MetadataKey::Destination)?;
                            output.metadata.require(MetadataKey::Gateway)?;
                            WorkflowState::Originating {
                                uid: Uuid::new_v4().to_string(),
                            }
                        }
                        Some(Action::Bridge) => WorkflowState::Completing,
                        Some(Action::Unknown) | None => {
                            info!(
                                workflow_id = %checkpoint.workflow_id,
                                "No actionable decision, completing"
                            );
                            WorkflowState::Completing
                        }
                    };

                    checkpoint.transition(next)?;
                    self.store.save(checkpoint).await?;
                }
                WorkflowState::Completing => {
                    return Ok(decision(checkpoint)?.clone());
                }
                WorkflowState::HangingUp => {
                    let input = HangupInput {
                        session_id: checkpoint.session.session_id().to_string(),
                        hangup_cause: decision(checkpoint)?.metadata.hangup_cause.clone(),
                    };
                    return self.step(checkpoint, step::HANGUP, &self.hangup, input).await;
                }
                WorkflowState::Originating { uid } => {
                    let decided = decision(checkpoint)?.metadata.clone();
                    let input = OriginateInput {
                        destination: decided.require(MetadataKey::Destination)?.to_string(),
                        gateway: decided.require(MetadataKey::Gateway)?.to_string(),
                        profile: decided.profile.clone(),
                        uid: Some(uid),
                        timeout_seconds: checkpoint.session.timeout_seconds(),
                        allow_reject: true,
                        auto_answer: false,
                        direction: CallDirection::Inbound,
                    };

                    let output = self
                        .step(checkpoint, step::ORIGINATE, &self.originate, input)
                        .await?;
                    if !output.success {
                        return Ok(output);
                    }

                    let leg = output.metadata.require(MetadataKey::Uid)?.to_string();
                    checkpoint.transition(WorkflowState::Bridging { uid: leg })?;
                    self.store.save(checkpoint).await?;
                }
                WorkflowState::Bridging { uid } => {
                    let input = BridgeInput {
                        originator: checkpoint.session.session_id().to_string(),
                        originatee: uid,
                    };
                    return self.step(checkpoint, step::BRIDGE, &self.bridge, input).await;
                }
                WorkflowState::Succeeded | WorkflowState::Failed => {
                    return Err(FlowError::Checkpoint(format!(
                        "workflow {} is already {}",
                        checkpoint.workflow_id,
                        checkpoint.state.as_str()
                    )));
                }
            }
        }
    }

    /// Run one activity, or replay its recorded result.
    ///
    /// The started record is saved before the command is issued. The result
    /// stays in memory and is written with the following transition.
    async fn step<A: Activity>(
        &self,
        checkpoint: &mut Checkpoint,
        index: u32,
        activity: &A,
        input: A::Input,
    ) -> Result<WorkflowOutput> {
        if let Some(record) = checkpoint
            .step(index)
            .filter(|r| r.is_replayable() && r.activity == activity.name())
        {
            info!(
                workflow_id = %checkpoint.workflow_id,
                activity = activity.name(),
                step = index,
                "Replaying recorded activity result"
            );
            let replayed = match (&record.output, &record.error) {
                (Some(output), _) => Ok(output.clone()),
                (None, Some(err)) => Err(err.clone()),
                (None, None) => Err(FlowError::Checkpoint(format!(
                    "step {} of workflow {} has no result",
                    index, checkpoint.workflow_id
                ))),
            };
            if let Ok(output) = &replayed {
                checkpoint.output = Some(output.clone());
            }
            return replayed;
        }

        checkpoint.begin_step(StepRecord::started(index, activity.name(), serde_json::to_value(&input)?));
        self.store.save(checkpoint).await?;

        info!(
            workflow_id = %checkpoint.workflow_id,
            activity = activity.name(),
            step = index,
            "Executing activity"
        );

        let options = self.options.activity_options(checkpoint.session.timeout());
        let result = self.runner.run(activity, input, &options).await;

        checkpoint.complete_step(index, &result);
        if let Ok(output) = &result {
            checkpoint.output = Some(output.clone());
        }
        result
    }

    /// Hang up the pending leg, if any, and fail the workflow as cancelled
    async fn compensate_in_place(&self, checkpoint: &mut Checkpoint, reason: &str) -> Result<WorkflowOutput> {
        let output = checkpoint.output.clone().unwrap_or_default();

        if let Err(e) = self.hang_up_pending_leg(checkpoint).await {
            return self.retain(checkpoint, e).await;
        }

        self.conclude(checkpoint, output, Some(FlowError::Cancelled(reason.to_string())))
            .await
    }

    /// Hang up a leg that may exist on the switch without being bridged
    async fn hang_up_pending_leg(&self, checkpoint: &mut Checkpoint) -> Result<()> {
        let Some(leg) = checkpoint.state.pending_leg().map(str::to_string) else {
            return Ok(());
        };

        warn!(
            workflow_id = %checkpoint.workflow_id,
            leg = %leg,
            "Compensating: hanging up pending leg"
        );

        let input = HangupInput {
            session_id: leg.clone(),
            hangup_cause: Some(CANCEL_HANGUP_CAUSE.to_string()),
        };
        match self.step(checkpoint, step::COMPENSATION, &self.hangup, input).await {
            Ok(_) => Ok(()),
            Err(FlowError::Transport(reason)) if reason.contains(NO_SUCH_CHANNEL) => {
                info!(workflow_id = %checkpoint.workflow_id, leg = %leg, "Pending leg already gone");
                Ok(())
            }
            Err(e) => {
                error!(
                    workflow_id = %checkpoint.workflow_id,
                    leg = %leg,
                    "Compensating hangup failed: {}",
                    e
                );
                Err(e)
            }
        }
    }

    /// Keep a workflow whose leg could not be torn down. The checkpoint stays
    /// in its live state so the leg remains visible and can be compensated
    /// later.
    async fn retain(&self, checkpoint: &mut Checkpoint, error: FlowError) -> Result<WorkflowOutput> {
        checkpoint.error = Some(error.clone());
        counter!("callflow_workflows_finished_total", "outcome" => "retained").increment(1);

        if let Err(e) = self.store.save(checkpoint).await {
            error!(workflow_id = %checkpoint.workflow_id, "Failed to save retained checkpoint: {}", e);
        }

        warn!(
            workflow_id = %checkpoint.workflow_id,
            state = checkpoint.state.as_str(),
            error = %error,
            "Workflow stopped with a pending leg, checkpoint kept"
        );
        Err(error)
    }

    /// Record the terminal state, then forget the workflow
    async fn conclude(
        &self,
        checkpoint: &mut Checkpoint,
        output: WorkflowOutput,
        error: Option<FlowError>,
    ) -> Result<WorkflowOutput> {
        if let Err(e) = checkpoint.finish(output.clone(), error.clone()) {
            error!("Failed to finish workflow: {}", e);
        }

        counter!("callflow_workflows_finished_total", "outcome" => checkpoint.state.as_str()).increment(1);

        match &error {
            Some(err) => error!(
                workflow_id = %checkpoint.workflow_id,
                error = %err,
                "Workflow failed"
            ),
            None => info!(
                workflow_id = %checkpoint.workflow_id,
                state = checkpoint.state.as_str(),
                success = output.success,
                "Workflow finished"
            ),
        }

        if let Err(e) = self.release(checkpoint).await {
            error!(workflow_id = %checkpoint.workflow_id, "Failed to release checkpoint: {}", e);
            if error.is_none() {
                return Err(e);
            }
        }

        match error {
            Some(err) => Err(err),
            None => Ok(output),
        }
    }

    /// Result of a checkpoint that reached a terminal state before it was
    /// deleted
    async fn conclude_stored(&self, checkpoint: Checkpoint) -> Result<WorkflowOutput> {
        self.store.delete(&checkpoint.workflow_id).await?;

        match checkpoint.error {
            Some(err) => Err(err),
            None => Ok(checkpoint.output.unwrap_or_default()),
        }
    }

    async fn release(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.store.save(checkpoint).await?;
        self.store.delete(&checkpoint.workflow_id).await
    }

    fn register(&self, workflow_id: &str) -> Result<(RunningGuard, watch::Receiver<bool>)> {
        let mut running = lock(&self.running);
        if running.contains_key(workflow_id) {
            return Err(FlowError::AlreadyRunning(workflow_id.to_string()));
        }

        let (tx, rx) = watch::channel(false);
        running.insert(workflow_id.to_string(), tx);
        gauge!("callflow_workflows_running").set(running.len() as f64);

        Ok((
            RunningGuard {
                workflow_id: workflow_id.to_string(),
                running: self.running.clone(),
            },
            rx,
        ))
    }
}

/// Removes a workflow from the running set when its run ends, however it
/// ends
struct RunningGuard {
    workflow_id: String,
    running: RunningMap,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut running = lock(&self.running);
        running.remove(&self.workflow_id);
        gauge!("callflow_workflows_running").set(running.len() as f64);
    }
}

fn lock(running: &RunningMap) -> std::sync::MutexGuard<'_, HashMap<String, watch::Sender<bool>>> {
    running.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Output of the session initialization step
fn decision(checkpoint: &Checkpoint) -> Result<&WorkflowOutput> {
    checkpoint
        .step(step::SESSION_INIT)
        .and_then(|record| record.output.as_ref())
        .ok_or_else(|| {
            FlowError::Checkpoint(format!(
                "workflow {} has no session decision",
                checkpoint.workflow_id
            ))
        })
}

/// Resolves once cancellation is requested; never resolves otherwise
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        let requested = *rx.borrow_and_update();
        if requested {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
