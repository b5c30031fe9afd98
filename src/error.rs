// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `thermolink` library.
//!
//! The top-level [`enum@Error`] carries the client-facing taxonomy:
//! connection failures, publishing while disconnected, malformed payloads
//! and unexpected socket closure. Lower layers report through
//! [`ProtocolError`], [`ConfigError`] and [`ValueError`].

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The handshake with the broker failed or timed out.
    ///
    /// Recoverable: the reconnection policy decides whether to retry.
    #[error("connect failure: {0}")]
    ConnectFailure(String),

    /// A send or publish was attempted while the connection is not
    /// `Connected`.
    #[error("client is not connected")]
    NotConnected,

    /// A payload on the temperature topic could not be parsed as a number.
    #[error("malformed payload on {topic}: {payload:?}")]
    MalformedPayload {
        /// Topic the payload arrived on.
        topic: String,
        /// Lossy text form of the payload.
        payload: String,
    },

    /// The broker connection closed unexpectedly.
    #[error("socket closed: {0}")]
    SocketClosed(String),

    /// Error raised by the transport layer.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Error occurred during value validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),
}

/// Why the connection left `Connecting` or `Connected` unexpectedly.
///
/// Carried by [`ClientEvent::StateChanged`](crate::event::ClientEvent) and
/// [`ConnectionStatus::last_error`](crate::protocol::ConnectionStatus::last_error).
/// Displays the same text as the matching [`enum@Error`] variant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionFailure {
    /// The handshake with the broker failed or timed out.
    #[error("connect failure: {0}")]
    ConnectFailure(String),

    /// An established session was closed or lost.
    #[error("socket closed: {0}")]
    SocketClosed(String),
}

impl ConnectionFailure {
    /// Returns the underlying reason text.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::ConnectFailure(reason) | Self::SocketClosed(reason) => reason,
        }
    }
}

impl From<ConnectionFailure> for Error {
    fn from(failure: ConnectionFailure) -> Self {
        match failure {
            ConnectionFailure::ConnectFailure(reason) => Self::ConnectFailure(reason),
            ConnectionFailure::SocketClosed(reason) => Self::SocketClosed(reason),
        }
    }
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A topic is empty or contains wildcard characters.
    #[error("invalid topic: {0:?}")]
    InvalidTopic(String),

    /// An invalid fan state string was provided.
    #[error("invalid fan state: {0}")]
    InvalidFanState(String),
}

/// Errors related to broker communication.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// MQTT client request failed.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// The session failed while connecting or while connected.
    #[error("connection error: {0}")]
    Connection(String),

    /// The handshake did not complete in time.
    #[error("handshake timed out after {0} ms")]
    Timeout(u64),

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// `connect` was called outside of a tokio runtime.
    #[error("no tokio runtime available")]
    NoRuntime,

    /// Internal channel was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

/// Errors related to loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A configuration value is out of its allowed range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_connected_display() {
        assert_eq!(Error::NotConnected.to_string(), "client is not connected");
    }

    #[test]
    fn malformed_payload_display() {
        let err = Error::MalformedPayload {
            topic: "pi/temperature".to_string(),
            payload: "abc".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "malformed payload on pi/temperature: \"abc\""
        );
    }

    #[test]
    fn error_from_protocol_error() {
        let err: Error = ProtocolError::Timeout(1500).into();
        assert!(matches!(err, Error::Protocol(ProtocolError::Timeout(1500))));
        assert_eq!(
            err.to_string(),
            "protocol error: handshake timed out after 1500 ms"
        );
    }

    #[test]
    fn error_from_value_error() {
        let err: Error = ValueError::InvalidTopic("a/#".to_string()).into();
        assert!(matches!(err, Error::Value(ValueError::InvalidTopic(_))));
    }

    #[test]
    fn connection_failure_matches_error_text() {
        let failure = ConnectionFailure::SocketClosed("eof".to_string());
        assert_eq!(failure.reason(), "eof");
        assert_eq!(failure.to_string(), "socket closed: eof");

        let err: Error = failure.clone().into();
        assert!(matches!(err, Error::SocketClosed(ref r) if r == "eof"));
        assert_eq!(err.to_string(), failure.to_string());
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::Invalid("history capacity must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "invalid configuration: history capacity must be at least 1"
        );
    }
}
