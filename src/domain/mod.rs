//! Domain layer - Call-flow model and the ports it depends on
//!
//! This layer contains:
//! - The call session and the commands issued for it
//! - The output envelope shared by activities and workflows
//! - Durable workflow progress (checkpoints)
//! - Ports: the switch client and the checkpoint store

pub mod call;
pub mod checkpoint;
pub mod output;
pub mod shared;
pub mod switch;

// Re-export commonly used types
pub use shared::{FlowError, Result};
