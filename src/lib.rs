//! Callflow - durable call-control orchestration over a media switch
//!
//! Inbound calls run through a checkpointed workflow (session init, then
//! hangup, or originate and bridge) whose steps are switch commands sent
//! over the event socket. A separate reflex path reacts to raw switch
//! events with one-off commands.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;

// Re-export commonly used types
pub use domain::shared::error::FlowError;
pub use domain::shared::result::Result;
