// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection and client configuration.
//!
//! [`ConnectOptions`] is passed to every `connect` call and can be built in
//! code or loaded from JSON. Field names follow the camelCase form used by
//! JavaScript MQTT clients:
//!
//! ```
//! use thermolink::ConnectOptions;
//!
//! let options = ConnectOptions::from_json(
//!     r#"{ "autoReconnect": true, "backoffMs": [500, 1000, 5000] }"#,
//! ).unwrap();
//! assert!(options.reconnect().auto_reconnect());
//! ```

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::{FAN_STATE_TOPIC, TEMPERATURE_TOPIC, Topic};

/// Delay used when automatic reconnection is enabled but no schedule is given.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Default number of readings kept in history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 30;

/// Default queue length of a message stream.
pub const DEFAULT_STREAM_CAPACITY: usize = 64;

/// Default number of events buffered per event subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// MQTT delivery guarantee for outbound messages and subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "u8")]
pub enum QosLevel {
    /// QoS 0.
    AtMostOnce,
    /// QoS 1.
    #[default]
    AtLeastOnce,
    /// QoS 2.
    ExactlyOnce,
}

impl QosLevel {
    /// Returns the numeric MQTT level.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
            Self::ExactlyOnce => 2,
        }
    }
}

impl TryFrom<u8> for QosLevel {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            other => Err(ConfigError::Invalid(format!(
                "qos must be 0, 1 or 2, got {other}"
            ))),
        }
    }
}

/// Automatic reconnection behaviour after an unexpected disconnect or a
/// failed handshake.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectPolicy {
    auto_reconnect: bool,
    backoff_ms: Vec<u64>,
    max_reconnect_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            backoff_ms: vec![1000, 2000, 5000, 10_000],
            max_reconnect_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that never reconnects automatically.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            auto_reconnect: false,
            ..Self::default()
        }
    }

    /// Returns whether automatic reconnection is enabled.
    #[must_use]
    pub fn auto_reconnect(&self) -> bool {
        self.auto_reconnect
    }

    /// Returns the backoff schedule in milliseconds.
    #[must_use]
    pub fn backoff_ms(&self) -> &[u64] {
        &self.backoff_ms
    }

    /// Returns the attempt limit, if any.
    #[must_use]
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_reconnect_attempts
    }

    /// Returns the delay before reconnect attempt `attempt` (1-based), or
    /// `None` if no further attempt should be made.
    ///
    /// Attempts past the end of the schedule reuse its last entry.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if !self.auto_reconnect || attempt == 0 {
            return None;
        }
        if self.max_reconnect_attempts.is_some_and(|max| attempt > max) {
            return None;
        }
        let index = usize::try_from(attempt - 1).unwrap_or(usize::MAX);
        let delay = self
            .backoff_ms
            .get(index)
            .or_else(|| self.backoff_ms.last())
            .map_or(DEFAULT_RETRY_DELAY, |ms| Duration::from_millis(*ms));
        Some(delay)
    }
}

/// Options for a single `connect` call.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectOptions {
    client_id: Option<String>,
    username: Option<String>,
    password: Option<String>,
    keep_alive_secs: u64,
    connection_timeout_ms: Option<u64>,
    qos: QosLevel,
    #[serde(flatten)]
    reconnect: ReconnectPolicy,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            client_id: None,
            username: None,
            password: None,
            keep_alive_secs: 30,
            connection_timeout_ms: Some(10_000),
            qos: QosLevel::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("keep_alive_secs", &self.keep_alive_secs)
            .field("connection_timeout_ms", &self.connection_timeout_ms)
            .field("qos", &self.qos)
            .field("reconnect", &self.reconnect)
            .finish()
    }
}

impl ConnectOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from a JSON object. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Json` for malformed JSON or an out-of-range
    /// `qos`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the MQTT client id (default: `thermolink-<uuid>`).
    #[must_use]
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    /// Sets username/password authentication.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.keep_alive_secs = duration.as_secs();
        self
    }

    /// Sets the handshake timeout (default: 10 seconds).
    #[must_use]
    pub fn connection_timeout(mut self, duration: Duration) -> Self {
        self.connection_timeout_ms = Some(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Removes the handshake timeout. A hung handshake then stays
    /// `Connecting` until `disconnect` is called.
    #[must_use]
    pub fn without_connection_timeout(mut self) -> Self {
        self.connection_timeout_ms = None;
        self
    }

    /// Sets the delivery guarantee for publishes and subscriptions.
    #[must_use]
    pub fn qos(mut self, qos: QosLevel) -> Self {
        self.qos = qos;
        self
    }

    /// Enables or disables automatic reconnection.
    #[must_use]
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.reconnect.auto_reconnect = enabled;
        self
    }

    /// Sets the reconnect backoff schedule in milliseconds.
    #[must_use]
    pub fn backoff_ms(mut self, schedule: impl Into<Vec<u64>>) -> Self {
        self.reconnect.backoff_ms = schedule.into();
        self
    }

    /// Limits the number of consecutive reconnect attempts.
    #[must_use]
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect.max_reconnect_attempts = Some(attempts);
        self
    }

    /// Replaces the whole reconnection policy.
    #[must_use]
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Returns the configured client id, if any.
    #[must_use]
    pub fn configured_client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Returns the credentials if configured.
    #[must_use]
    pub fn credentials_pair(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    /// Returns the keep-alive interval.
    #[must_use]
    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Returns the handshake timeout, if any.
    #[must_use]
    pub fn handshake_timeout(&self) -> Option<Duration> {
        self.connection_timeout_ms.map(Duration::from_millis)
    }

    /// Returns the delivery guarantee.
    #[must_use]
    pub fn qos_level(&self) -> QosLevel {
        self.qos
    }

    /// Returns the reconnection policy.
    #[must_use]
    pub fn reconnect(&self) -> &ReconnectPolicy {
        &self.reconnect
    }
}

/// Static configuration of a [`MonitorClient`](crate::MonitorClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub(crate) temperature_topic: Topic,
    pub(crate) fan_topic: Topic,
    pub(crate) history_capacity: usize,
    pub(crate) stream_capacity: usize,
    pub(crate) event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            temperature_topic: Topic::from_static(TEMPERATURE_TOPIC),
            fan_topic: Topic::from_static(FAN_STATE_TOPIC),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Checks capacities.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if any capacity is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("history capacity", self.history_capacity),
            ("stream capacity", self.stream_capacity),
            ("event capacity", self.event_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }

    /// Returns the topic carrying temperature readings.
    #[must_use]
    pub fn temperature_topic(&self) -> &Topic {
        &self.temperature_topic
    }

    /// Returns the topic fan commands are published to.
    #[must_use]
    pub fn fan_topic(&self) -> &Topic {
        &self.fan_topic
    }

    /// Returns the reading history capacity.
    #[must_use]
    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }
}
