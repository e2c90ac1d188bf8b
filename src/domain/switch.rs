//! Switch port - the command/event surface of the media switch

use crate::domain::call::Command;
use crate::domain::shared::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Request/response access to the switch command API.
///
/// One client is shared by every running call, so implementations must be
/// safe for concurrent use and must correlate each reply with the request
/// that produced it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SwitchClient: Send + Sync {
    /// Send one command and return the raw reply body
    async fn api(&self, command: &Command) -> Result<String>;
}

/// Raw event emitted by the switch (header name to decoded value)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchEvent {
    headers: HashMap<String, String>,
}

impl SwitchEvent {
    pub fn new(headers: HashMap<String, String>) -> Self {
        Self { headers }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn event_name(&self) -> Option<&str> {
        self.header("Event-Name")
    }

    /// Leg the event belongs to
    pub fn unique_id(&self) -> Option<&str> {
        self.header("Unique-ID")
    }

    /// Key identifying this event occurrence.
    ///
    /// `Core-UUID` plus `Event-Sequence` is unique per switch instance;
    /// without them the leg id and event name are used.
    pub fn dedup_key(&self) -> Option<String> {
        match (self.header("Core-UUID"), self.header("Event-Sequence")) {
            (Some(core), Some(sequence)) => Some(format!("{}:{}", core, sequence)),
            _ => match (self.unique_id(), self.event_name()) {
                (Some(uid), Some(name)) => Some(format!("{}:{}", uid, name)),
                _ => None,
            },
        }
    }
}
