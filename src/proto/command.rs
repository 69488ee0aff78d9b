// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Supervisor command tags and reply helpers.
//
// Request:  [String tag] [String name]?
// Reply:    [Bool ok] [String reason | payload ...]

use std::fmt;
use std::str::FromStr;

use super::message::WireMessage;
use crate::error::{CommandError, WireError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Command {
    Start,
    Stop,
    Restart,
    Status,
    Show,
    List,
}

impl Command {
    pub const ALL: [Command; 6] = [
        Command::Start,
        Command::Stop,
        Command::Restart,
        Command::Status,
        Command::Show,
        Command::List,
    ];

    /// Tag string carried as the first element of a request.
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Start => "START",
            Command::Stop => "STOP",
            Command::Restart => "RESTART",
            Command::Status => "STATUS",
            Command::Show => "SHOW",
            Command::List => "LIST",
        }
    }

    /// Whether the command carries a service name argument.
    pub fn takes_name(self) -> bool {
        !matches!(self, Command::List)
    }

    /// Encode a request for this command.
    pub fn request(self, name: Option<&str>) -> Result<WireMessage, WireError> {
        let mut msg = WireMessage::new();
        msg.put_str(self.as_str())?;
        if let Some(name) = name {
            msg.put_str(name)?;
        }
        Ok(msg)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or(CommandError::UnknownCommand)
    }
}

/// A reply that starts with `true`.
pub fn success() -> WireMessage {
    let mut msg = WireMessage::new();
    msg.put_bool(true);
    msg
}

/// A reply that starts with `false` followed by the reason text.
pub fn failure(reason: &CommandError) -> WireMessage {
    let mut msg = WireMessage::new();
    msg.put_bool(false);
    // Reason strings are short constants, well under the element limit.
    let _ = msg.put_str(&reason.to_string());
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for c in Command::ALL {
            assert_eq!(c.as_str().parse::<Command>().unwrap(), c);
        }
        assert_eq!("start".parse::<Command>(), Err(CommandError::UnknownCommand));
    }

    #[test]
    fn failure_carries_reason() {
        let mut msg = failure(&CommandError::ConfigNotFound);
        assert!(!msg.get_bool().unwrap());
        assert_eq!(msg.get_string().unwrap(), "config file not found");
    }
}
