// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Validated MQTT topic names.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use crate::error::ValueError;

/// Default topic carrying temperature readings.
pub const TEMPERATURE_TOPIC: &str = "pi/temperature";

/// Default topic for fan commands.
pub const FAN_STATE_TOPIC: &str = "pi/fan_state";

/// An exact MQTT topic name.
///
/// Routing in this crate matches topics exactly, so wildcard characters
/// (`+`, `#`) and empty names are rejected.
///
/// # Examples
///
/// ```
/// use thermolink::types::Topic;
///
/// let topic = Topic::new("pi/temperature").unwrap();
/// assert_eq!(topic.as_str(), "pi/temperature");
///
/// assert!(Topic::new("pi/#").is_err());
/// assert!(Topic::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(Arc<str>);

impl Topic {
    /// Validates and wraps a topic name.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidTopic` if the topic is empty or contains
    /// `+`, `#` or a NUL character.
    pub fn new(topic: impl AsRef<str>) -> Result<Self, ValueError> {
        let topic = topic.as_ref();
        if topic.is_empty() || topic.contains(['+', '#', '\0']) {
            return Err(ValueError::InvalidTopic(topic.to_string()));
        }
        Ok(Self(Arc::from(topic)))
    }

    /// Wraps a compile-time topic known to be valid.
    pub(crate) fn from_static(topic: &'static str) -> Self {
        debug_assert!(Self::new(topic).is_ok(), "invalid static topic {topic:?}");
        Self(Arc::from(topic))
    }

    /// Returns the topic as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Hash and Eq of `Arc<str>` match `str`, so maps keyed by `Topic` can be
// queried with a plain `&str`.
impl Borrow<str> for Topic {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Topic {
    type Error = ValueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for Topic {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_topics() {
        assert!(Topic::new(TEMPERATURE_TOPIC).is_ok());
        assert!(Topic::new(FAN_STATE_TOPIC).is_ok());
        assert!(Topic::new("a").is_ok());
    }

    #[test]
    fn rejects_wildcards_and_empty() {
        for bad in ["", "pi/+", "pi/#", "+", "a\0b"] {
            assert!(
                matches!(Topic::new(bad), Err(ValueError::InvalidTopic(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn ordering_follows_name() {
        let a = Topic::new("a/1").unwrap();
        let b = Topic::new("b/1").unwrap();
        assert!(a < b);
        assert_eq!(a.to_string(), "a/1");
    }
}
