//! Call bounded context - the inbound call and the commands issued for it

pub mod action;
pub mod command;
pub mod session;
pub mod value_object;

pub use action::Action;
pub use command::Command;
pub use session::{CallSession, DEFAULT_TIMEOUT_SECS};
pub use value_object::CallDirection;
