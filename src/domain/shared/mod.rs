//! Shared kernel - error taxonomy used by every layer

pub mod error;
pub mod result;

pub use error::FlowError;
pub use result::Result;
