//! Durable workflow engine

pub mod inbound;
pub mod options;
pub mod runner;

pub use inbound::{InboundCallWorkflow, CANCEL_HANGUP_CAUSE};
pub use options::{ActivityOptions, EngineOptions, RetryPolicy};
pub use runner::ActivityRunner;
