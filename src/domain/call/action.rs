//! Next-step action selected for a freshly initialized session

use serde::{Deserialize, Serialize};
use std::fmt;

/// Action chosen by session initialization.
///
/// Anything the decision logic returns that is not one of the known
/// literals deserializes to [`Action::Unknown`] and is treated as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Bridge,
    Hangup,
    Originate,
    #[serde(other)]
    Unknown,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Bridge => "bridge",
            Action::Hangup => "hangup",
            Action::Originate => "originate",
            Action::Unknown => "unknown",
        }
    }

    /// Parse an action key, `None` for anything unrecognized
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "bridge" => Some(Action::Bridge),
            "hangup" => Some(Action::Hangup),
            "originate" => Some(Action::Originate),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
