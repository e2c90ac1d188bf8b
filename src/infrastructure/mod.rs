//! Infrastructure layer - Technical implementations
//!
//! This layer contains:
//! - The event socket client for the switch
//! - Checkpoint store implementations

pub mod esl;
pub mod persistence;
