// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broker endpoint URIs.

use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Default port for plain MQTT over TCP.
pub const DEFAULT_TCP_PORT: u16 = 1883;

/// Default port for MQTT over WebSocket.
pub const DEFAULT_WS_PORT: u16 = 80;

/// Path used for WebSocket endpoints given without one.
pub const DEFAULT_WS_PATH: &str = "/mqtt";

/// Transport used to reach the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plain TCP (`mqtt://`, `tcp://` or no scheme).
    Tcp,
    /// WebSocket (`ws://`).
    WebSocket,
}

/// A parsed broker endpoint.
///
/// # Examples
///
/// ```
/// use thermolink::protocol::{Endpoint, Scheme};
///
/// let ep = Endpoint::parse("ws://192.168.2.16:9001").unwrap();
/// assert_eq!(ep.scheme(), Scheme::WebSocket);
/// assert_eq!(ep.port(), 9001);
/// assert_eq!(ep.to_string(), "ws://192.168.2.16:9001/mqtt");
///
/// let ep = Endpoint::parse("broker.local").unwrap();
/// assert_eq!(ep.scheme(), Scheme::Tcp);
/// assert_eq!(ep.port(), 1883);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    scheme: Scheme,
    host: String,
    port: u16,
    path: String,
}

impl Endpoint {
    /// Parses an endpoint URI.
    ///
    /// Accepts `mqtt://`, `tcp://`, `ws://` or a bare `host[:port]`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidAddress` for an unsupported scheme, an
    /// empty host or an invalid port.
    pub fn parse(uri: &str) -> Result<Self, ProtocolError> {
        let uri = uri.trim();
        let (scheme, rest) = if let Some(rest) = uri
            .strip_prefix("mqtt://")
            .or_else(|| uri.strip_prefix("tcp://"))
        {
            (Scheme::Tcp, rest)
        } else if let Some(rest) = uri.strip_prefix("ws://") {
            (Scheme::WebSocket, rest)
        } else if let Some((other, _)) = uri.split_once("://") {
            return Err(ProtocolError::InvalidAddress(format!(
                "unsupported scheme: {other}"
            )));
        } else {
            (Scheme::Tcp, uri)
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => rest.split_at(idx),
            None => (rest, ""),
        };

        let default_port = match scheme {
            Scheme::Tcp => DEFAULT_TCP_PORT,
            Scheme::WebSocket => DEFAULT_WS_PORT,
        };
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| ProtocolError::InvalidAddress(format!("invalid port: {port}")))?;
                (host, port)
            }
            None => (authority, default_port),
        };

        if host.is_empty() {
            return Err(ProtocolError::InvalidAddress(format!(
                "missing host in {uri:?}"
            )));
        }

        let path = match scheme {
            Scheme::WebSocket if path.is_empty() || path == "/" => DEFAULT_WS_PATH.to_string(),
            Scheme::WebSocket => path.to_string(),
            Scheme::Tcp => String::new(),
        };

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            path,
        })
    }

    /// Returns the transport scheme.
    #[must_use]
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Returns the broker host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the broker port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the WebSocket path (empty for TCP).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scheme {
            Scheme::Tcp => write!(f, "mqtt://{}:{}", self.host, self.port),
            Scheme::WebSocket => write!(f, "ws://{}:{}{}", self.host, self.port, self.path),
        }
    }
}

impl FromStr for Endpoint {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
