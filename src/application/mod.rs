//! Application layer - activities, the workflow engine and the reflex path

pub mod activities;
pub mod processors;
pub mod workflow;

pub use activities::{ActionDecider, Activity, StaticActionDecider};
pub use processors::{ActivityProcessor, ActivityProcessorFactory, EventLedger, ReflexDispatcher};
pub use workflow::{EngineOptions, InboundCallWorkflow, RetryPolicy};
