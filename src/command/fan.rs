// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fan control command.

use crate::command::Command;
use crate::types::{FAN_STATE_TOPIC, FanState, Topic};

/// Command to switch the fan.
///
/// # Examples
///
/// ```
/// use thermolink::command::{Command, FanCommand};
/// use thermolink::types::{FanState, Topic};
///
/// let off = FanCommand::off();
/// assert_eq!(off.payload(), b"OFF");
///
/// let custom = FanCommand::on().with_topic(Topic::new("garage/fan").unwrap());
/// assert_eq!(custom.topic(), "garage/fan");
/// assert_eq!(custom.state(), FanState::On);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanCommand {
    topic: Topic,
    state: FanState,
}

impl FanCommand {
    /// Creates a command for the default fan topic.
    #[must_use]
    pub fn new(state: FanState) -> Self {
        Self {
            topic: Topic::from_static(FAN_STATE_TOPIC),
            state,
        }
    }

    /// Creates a command to turn the fan on.
    #[must_use]
    pub fn on() -> Self {
        Self::new(FanState::On)
    }

    /// Creates a command to turn the fan off.
    #[must_use]
    pub fn off() -> Self {
        Self::new(FanState::Off)
    }

    /// Sends the command to a different topic.
    #[must_use]
    pub fn with_topic(mut self, topic: Topic) -> Self {
        self.topic = topic;
        self
    }

    /// Returns the requested state.
    #[must_use]
    pub fn state(&self) -> FanState {
        self.state
    }
}

impl Command for FanCommand {
    fn topic(&self) -> &str {
        self.topic.as_str()
    }

    fn payload(&self) -> Vec<u8> {
        self.state.as_str().as_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_on_payload() {
        let cmd = FanCommand::on();
        assert_eq!(cmd.topic(), "pi/fan_state");
        assert_eq!(cmd.payload(), b"ON");
    }

    #[test]
    fn fan_toggled_state() {
        let cmd = FanCommand::new(FanState::On.toggled());
        assert_eq!(cmd.state(), FanState::Off);
        assert_eq!(cmd.payload(), b"OFF");
    }
}
