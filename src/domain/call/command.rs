//! Switch command

use serde::{Deserialize, Serialize};
use std::fmt;

/// One command sent verbatim to the switch API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub app_name: String,
    pub app_args: String,
}

impl Command {
    pub fn new(app_name: impl Into<String>, app_args: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            app_args: app_args.into(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.app_args.is_empty() {
            write!(f, "{}", self.app_name)
        } else {
            write!(f, "{} {}", self.app_name, self.app_args)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        let command = Command::new("uuid_bridge", "A B");
        assert_eq!(command.to_string(), "uuid_bridge A B");
        assert_eq!(Command::new("status", "").to_string(), "status");
    }
}
