// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outbound commands.
//!
//! | Command Type | Purpose | Example |
//! |-------------|---------|---------|
//! | [`FanCommand`] | Switch the fan on or off | `pi/fan_state` ← `ON` |
//! | [`OutboundCommand`] | Any topic and payload | `pi/led` ← `blink` |
//!
//! Commands are only sent while the connection is `Connected`; there is no
//! queue. See [`CommandPublisher`].
//!
//! # Examples
//!
//! ```
//! use thermolink::command::{Command, FanCommand};
//! use thermolink::types::FanState;
//!
//! let cmd = FanCommand::new(FanState::On);
//! assert_eq!(cmd.topic(), "pi/fan_state");
//! assert_eq!(cmd.payload(), b"ON");
//! ```

mod fan;
mod publisher;

pub use fan::FanCommand;
pub use publisher::CommandPublisher;

use crate::error::ValueError;
use crate::types::Topic;

/// A message the client can publish.
pub trait Command {
    /// Returns the topic to publish on.
    fn topic(&self) -> &str;

    /// Returns the payload bytes.
    fn payload(&self) -> Vec<u8>;
}

/// A raw topic and payload pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCommand {
    topic: Topic,
    payload: Vec<u8>,
}

impl OutboundCommand {
    /// Creates a command.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidTopic` if the topic is empty or contains
    /// wildcards.
    pub fn new(topic: impl AsRef<str>, payload: impl Into<Vec<u8>>) -> Result<Self, ValueError> {
        Ok(Self {
            topic: Topic::new(topic)?,
            payload: payload.into(),
        })
    }
}

impl Command for OutboundCommand {
    fn topic(&self) -> &str {
        self.topic.as_str()
    }

    fn payload(&self) -> Vec<u8> {
        self.payload.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_command_accessors() {
        let cmd = OutboundCommand::new("pi/led", "blink").unwrap();
        assert_eq!(cmd.topic(), "pi/led");
        assert_eq!(cmd.payload(), b"blink");
    }

    #[test]
    fn outbound_command_rejects_wildcards() {
        assert!(matches!(
            OutboundCommand::new("pi/#", "x"),
            Err(ValueError::InvalidTopic(_))
        ));
    }
}
