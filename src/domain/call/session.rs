//! Call session - identity of the inbound call a workflow drives

use crate::domain::shared::{FlowError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Execution timeout applied when the caller does not supply one
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// One inbound call.
///
/// Built once from the workflow input and never mutated afterwards; the
/// workflow owns it and hands copies to activities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSession {
    #[serde(default)]
    ani: String,
    #[serde(default)]
    dnis: String,
    #[serde(default)]
    domain: String,
    session_id: String,
    #[serde(default)]
    initializer: String,
    #[serde(default = "default_timeout_secs")]
    timeout_seconds: u64,
}

impl CallSession {
    pub fn new(
        ani: impl Into<String>,
        dnis: impl Into<String>,
        domain: impl Into<String>,
        session_id: impl Into<String>,
        initializer: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let session = Self {
            ani: ani.into(),
            dnis: dnis.into(),
            domain: domain.into(),
            session_id: session_id.into(),
            initializer: initializer.into(),
            timeout_seconds: timeout.as_secs(),
        };
        session.validate()?;
        Ok(session)
    }

    /// Convert a generic workflow payload into a validated session
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let session: CallSession = serde_json::from_value(payload.clone())
            .map_err(|e| FlowError::input(format!("cannot convert payload to CallSession: {}", e)))?;
        session.validate()?;
        Ok(session)
    }

    fn validate(&self) -> Result<()> {
        if self.session_id.trim().is_empty() {
            return Err(FlowError::input("sessionId must not be empty"));
        }
        if self.timeout_seconds == 0 {
            return Err(FlowError::input("timeoutSeconds must be greater than zero"));
        }
        Ok(())
    }

    // Getters
    pub fn ani(&self) -> &str {
        &self.ani
    }

    pub fn dnis(&self) -> &str {
        &self.dnis
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn initializer(&self) -> &str {
        &self.initializer
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}
