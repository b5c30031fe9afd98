// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fan on/off state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Requested state of the fan.
///
/// # Examples
///
/// ```
/// use thermolink::types::FanState;
///
/// assert_eq!(FanState::On.as_str(), "ON");
/// assert_eq!(FanState::Off.as_str(), "OFF");
/// assert_eq!(FanState::Off.toggled(), FanState::On);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FanState {
    /// Fan is off.
    #[default]
    Off,
    /// Fan is on.
    On,
}

impl FanState {
    /// Returns the wire representation (`ON` or `OFF`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::On => "ON",
        }
    }

    /// Returns the opposite state.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Off => Self::On,
            Self::On => Self::Off,
        }
    }

    /// Returns `true` if the fan is on.
    #[must_use]
    pub const fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }
}

impl fmt::Display for FanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FanState {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "OFF" | "0" | "FALSE" => Ok(Self::Off),
            "ON" | "1" | "TRUE" => Ok(Self::On),
            _ => Err(ValueError::InvalidFanState(s.to_string())),
        }
    }
}

impl From<bool> for FanState {
    fn from(value: bool) -> Self {
        if value { Self::On } else { Self::Off }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_state_from_str() {
        assert_eq!("ON".parse::<FanState>().unwrap(), FanState::On);
        assert_eq!("off".parse::<FanState>().unwrap(), FanState::Off);
        assert_eq!("1".parse::<FanState>().unwrap(), FanState::On);
        assert_eq!("false".parse::<FanState>().unwrap(), FanState::Off);
        assert_eq!(" on ".parse::<FanState>().unwrap(), FanState::On);
    }

    #[test]
    fn fan_state_from_str_invalid() {
        let result = "TOGGLE".parse::<FanState>();
        assert!(matches!(result, Err(ValueError::InvalidFanState(_))));
    }

    #[test]
    fn fan_state_toggle_round_trips() {
        assert_eq!(FanState::On.toggled().toggled(), FanState::On);
        assert!(FanState::from(true).is_on());
        assert!(!FanState::default().is_on());
    }

    #[test]
    fn fan_state_serde_uses_wire_form() {
        let json = serde_json::to_string(&FanState::On).unwrap();
        assert_eq!(json, "\"ON\"");
        let parsed: FanState = serde_json::from_str("\"OFF\"").unwrap();
        assert_eq!(parsed, FanState::Off);
    }
}
