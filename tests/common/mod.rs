//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use callflow::application::activities::StaticActionDecider;
use callflow::application::workflow::{EngineOptions, InboundCallWorkflow, RetryPolicy};
use callflow::domain::call::{Action, Command};
use callflow::domain::output::Metadata;
use callflow::domain::switch::SwitchClient;
use callflow::infrastructure::persistence::MemoryCheckpointStore;
use callflow::Result;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-process switch that records every command it receives.
///
/// Replies come from per-application queues; once a queue is empty the
/// default reply is used (`true` for `uuid_exists`, the requested
/// `origination_uuid` for `originate`, `+OK` otherwise). A stalled
/// application never replies.
#[derive(Default)]
pub struct ScriptedSwitch {
    commands: Mutex<Vec<Command>>,
    replies: Mutex<HashMap<String, VecDeque<Result<String>>>>,
    stalled: Mutex<HashSet<String>>,
}

impl ScriptedSwitch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, app: &str, reply: Result<String>) {
        self.replies
            .lock()
            .unwrap()
            .entry(app.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn stall(&self, app: &str) {
        self.stalled.lock().unwrap().insert(app.to_string());
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    pub fn app_names(&self) -> Vec<String> {
        self.commands().into_iter().map(|c| c.app_name).collect()
    }

    fn default_reply(command: &Command) -> String {
        match command.app_name.as_str() {
            "uuid_exists" => "true".to_string(),
            "originate" => {
                let uid = command
                    .app_args
                    .split(|c| c == '{' || c == ',' || c == '}')
                    .find_map(|var| var.strip_prefix("origination_uuid="))
                    .unwrap_or("leg-b");
                format!("+OK {}\n", uid)
            }
            _ => "+OK\n".to_string(),
        }
    }
}

#[async_trait]
impl SwitchClient for ScriptedSwitch {
    async fn api(&self, command: &Command) -> Result<String> {
        self.commands.lock().unwrap().push(command.clone());

        if self.stalled.lock().unwrap().contains(&command.app_name) {
            std::future::pending::<()>().await;
        }

        let scripted = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&command.app_name)
            .and_then(VecDeque::pop_front);

        scripted.unwrap_or_else(|| Ok(Self::default_reply(command)))
    }
}

/// Engine options with millisecond retries
pub fn engine_options() -> EngineOptions {
    EngineOptions {
        schedule_to_start: Duration::from_secs(1),
        max_concurrent_activities: 8,
        default_timeout_secs: 5,
        retry: RetryPolicy {
            max_attempts: 3,
            initial_interval: Duration::from_millis(1),
            backoff_coefficient: 2.0,
            max_interval: Duration::from_millis(5),
        },
    }
}

pub fn workflow(
    switch: Arc<ScriptedSwitch>,
    store: Arc<MemoryCheckpointStore>,
    decision: Metadata,
) -> InboundCallWorkflow {
    InboundCallWorkflow::new(
        switch,
        Arc::new(StaticActionDecider::new(decision)),
        store,
        engine_options(),
    )
}

pub fn payload(session_id: &str) -> Value {
    json!({
        "ani": "0281234567",
        "dnis": "1900",
        "domain": "pbx.example.com",
        "sessionId": session_id,
        "initializer": "inbound-ivr",
        "timeoutSeconds": 5
    })
}

pub fn hangup_decision(cause: &str) -> Metadata {
    Metadata {
        hangup_cause: Some(cause.to_string()),
        ..Metadata::with_action(Action::Hangup)
    }
}

pub fn originate_decision() -> Metadata {
    Metadata {
        destination: Some("0901234567".to_string()),
        gateway: Some("carrier-a".to_string()),
        ..Metadata::with_action(Action::Originate)
    }
}
