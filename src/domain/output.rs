//! Output envelope shared by every activity and the workflow

use crate::domain::call::Action;
use crate::domain::shared::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Recognized metadata keys other than `action`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKey {
    Destination,
    Gateway,
    Profile,
    Uid,
    HangupCause,
    Message,
}

impl MetadataKey {
    /// Wire name of the key
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataKey::Destination => "destination",
            MetadataKey::Gateway => "gateway",
            MetadataKey::Profile => "profile",
            MetadataKey::Uid => "uid",
            MetadataKey::HangupCause => "hangupCause",
            MetadataKey::Message => "message",
        }
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed step metadata.
///
/// Every key is optional; which ones are present depends on the action.
/// Dependent steps go through [`Metadata::require`] so an absent key
/// surfaces as [`FlowError::MissingField`] before any command is issued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hangup_cause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Metadata {
    pub fn with_action(action: Action) -> Self {
        Self {
            action: Some(action),
            ..Default::default()
        }
    }

    pub fn get(&self, key: MetadataKey) -> Option<&str> {
        let value = match key {
            MetadataKey::Destination => &self.destination,
            MetadataKey::Gateway => &self.gateway,
            MetadataKey::Profile => &self.profile,
            MetadataKey::Uid => &self.uid,
            MetadataKey::HangupCause => &self.hangup_cause,
            MetadataKey::Message => &self.message,
        };
        value.as_deref()
    }

    /// Value of a key that a dependent step cannot do without.
    ///
    /// Empty strings count as absent.
    pub fn require(&self, key: MetadataKey) -> Result<&str> {
        match self.get(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(FlowError::require_field(key.as_str())),
        }
    }
}

/// Result envelope. `success` is only set once the switch acknowledged
/// the command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowOutput {
    pub success: bool,
    #[serde(default)]
    pub metadata: Metadata,
}

impl WorkflowOutput {
    pub fn succeeded(metadata: Metadata) -> Self {
        Self {
            success: true,
            metadata,
        }
    }

    pub fn failed(metadata: Metadata) -> Self {
        Self {
            success: false,
            metadata,
        }
    }

    pub fn action(&self) -> Option<Action> {
        self.metadata.action
    }
}
