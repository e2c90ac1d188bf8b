//! Configuration management
//!
//! Sources, later ones winning: built-in defaults, an optional TOML file,
//! then `CALLFLOW__<SECTION>__<KEY>` environment variables.

use crate::application::workflow::{EngineOptions, RetryPolicy};
use crate::domain::call::Action;
use crate::domain::output::Metadata;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub switch: SwitchConfig,
    pub engine: EngineConfig,
    pub storage: StorageConfig,
    pub routing: RoutingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Event socket connection to the switch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub connect_timeout_secs: u64,
    /// Event names passed to `event plain`
    pub subscriptions: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub schedule_to_start_ms: u64,
    pub max_concurrent_activities: usize,
    pub default_timeout_secs: u64,
    pub event_ledger_capacity: usize,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_interval_ms: u64,
    pub backoff_coefficient: f64,
    pub max_interval_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub url: String,
    pub max_connections: u32,
}

/// Decision returned for every inbound session by the built-in decider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub action: Option<String>,
    pub destination: Option<String>,
    pub gateway: Option<String>,
    pub profile: Option<String>,
    pub hangup_cause: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8021,
            password: "ClueCon".to_string(),
            connect_timeout_secs: 5,
            subscriptions: "CHANNEL_PARK CHANNEL_ANSWER CHANNEL_HANGUP_COMPLETE CUSTOM".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schedule_to_start_ms: 1000,
            max_concurrent_activities: 64,
            default_timeout_secs: 30,
            event_ledger_capacity: 4096,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval_ms: 200,
            backoff_coefficient: 2.0,
            max_interval_ms: 5000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            url: "postgres://postgres@localhost/callflow".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CALLFLOW")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

impl SwitchConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl EngineConfig {
    pub fn options(&self) -> EngineOptions {
        EngineOptions {
            schedule_to_start: Duration::from_millis(self.schedule_to_start_ms),
            max_concurrent_activities: self.max_concurrent_activities,
            default_timeout_secs: self.default_timeout_secs,
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts.max(1),
                initial_interval: Duration::from_millis(self.retry.initial_interval_ms),
                backoff_coefficient: self.retry.backoff_coefficient,
                max_interval: Duration::from_millis(self.retry.max_interval_ms),
            },
        }
    }
}

impl RoutingConfig {
    /// Metadata handed out by the static decider
    pub fn metadata(&self) -> Metadata {
        Metadata {
            action: self
                .action
                .as_deref()
                .map(|key| Action::from_key(key).unwrap_or(Action::Unknown)),
            destination: self.destination.clone(),
            gateway: self.gateway.clone(),
            profile: self.profile.clone(),
            hangup_cause: self.hangup_cause.clone(),
            ..Default::default()
        }
    }
}
