// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broker transport.
//!
//! A transport is split in three parts so the connection logic can run
//! against any wire:
//!
//! - [`Connector`]: opens a new session for an [`Endpoint`]
//! - [`Link`]: the outbound half (publish, subscribe, disconnect), cheap to
//!   clone and shared with the rest of the client
//! - [`Session`]: the inbound half, polled by the connection's session task
//!
//! Two transports are provided:
//!
//! - [`MqttConnector`]: MQTT 3.1.1 over TCP or WebSocket (feature `mqtt`)
//! - [`LoopbackBroker`]: an in-process broker for tests and demos
//!
//! [`Connection`] drives a transport: handshake, reconnection and state
//! tracking.

mod connection;
mod endpoint;
pub mod loopback;
#[cfg(feature = "mqtt")]
mod mqtt;

pub use connection::{Connection, ConnectionStatus};
pub use endpoint::{DEFAULT_TCP_PORT, DEFAULT_WS_PATH, DEFAULT_WS_PORT, Endpoint, Scheme};
pub use loopback::LoopbackBroker;
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttConnector, MqttLink, MqttSession};

use crate::config::ConnectOptions;
use crate::error::ProtocolError;
use crate::message::InboundMessage;

/// Something a [`Session`] reports while polled.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The broker accepted the handshake.
    ConnAck,
    /// A message arrived.
    Message(InboundMessage),
    /// The broker or the socket closed the session in an orderly way.
    Closed(String),
    /// Protocol traffic with nothing for the client to do (pings, acks).
    Idle,
}

/// Opens sessions to a broker.
pub trait Connector: Send + Sync + 'static {
    /// Outbound half of a session.
    type Link: Link;
    /// Inbound half of a session.
    type Session: Session;

    /// Opens a new session. The handshake completes when the session
    /// reports [`SessionEvent::ConnAck`].
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the session cannot be set up at all.
    fn open(
        &self,
        endpoint: &Endpoint,
        options: &ConnectOptions,
    ) -> Result<(Self::Link, Self::Session), ProtocolError>;
}

/// Outbound half of a broker session.
///
/// All calls are fire-and-forget: they return once the request is handed
/// to the transport, without waiting for a broker acknowledgment.
pub trait Link: Clone + Send + Sync + 'static {
    /// Subscribes to an exact topic.
    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Unsubscribes from a topic.
    fn unsubscribe(&self, topic: &str) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Publishes a payload.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Ends the session cleanly.
    fn disconnect(&self) -> impl Future<Output = Result<(), ProtocolError>> + Send;
}

/// Inbound half of a broker session.
pub trait Session: Send + 'static {
    /// Waits for the next event.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` when the session fails. The session is not
    /// polled again afterwards.
    fn poll(&mut self) -> impl Future<Output = Result<SessionEvent, ProtocolError>> + Send;
}
