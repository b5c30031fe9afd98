// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-process broker.
//!
//! [`LoopbackBroker`] implements the transport seam without any socket. It
//! records what the client publishes and subscribes to, lets the caller
//! inject messages, and can simulate refused handshakes, dropped sessions and
//! unresponsive brokers. Publishes from the client are delivered back to
//! every session subscribed to the exact topic.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use thermolink::MonitorClient;
//! use thermolink::config::ConnectOptions;
//! use thermolink::protocol::LoopbackBroker;
//! use thermolink::types::ConnectionState;
//!
//! # #[tokio::main]
//! # async fn main() -> thermolink::Result<()> {
//! let broker = LoopbackBroker::new();
//! let client = MonitorClient::new(broker.clone());
//!
//! client.connect("mqtt://loopback", ConnectOptions::default())?;
//! client
//!     .wait_for_state(ConnectionState::Connected, Duration::from_secs(1))
//!     .await?;
//! client.publish_command("pi/fan_state", "ON").await?;
//! assert_eq!(broker.published()[0].payload(), b"ON");
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::config::ConnectOptions;
use crate::error::ProtocolError;
use crate::message::InboundMessage;

use super::{Connector, Endpoint, Link, Session, SessionEvent};

#[derive(Debug)]
enum Frame {
    ConnAck,
    Message(InboundMessage),
    Close(String),
    Fail(String),
}

#[derive(Debug)]
struct SessionSlot {
    tx: mpsc::UnboundedSender<Frame>,
    subscriptions: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct BrokerState {
    next_session: u64,
    sessions: HashMap<u64, SessionSlot>,
    published: Vec<InboundMessage>,
    opened: usize,
    refuse: u32,
    unresponsive: bool,
}

impl BrokerState {
    fn deliver(&self, message: &InboundMessage) -> usize {
        self.sessions
            .values()
            .filter(|slot| slot.subscriptions.contains(message.topic()))
            .filter(|slot| slot.tx.send(Frame::Message(message.clone())).is_ok())
            .count()
    }

    fn close_all(&mut self, frame: impl Fn() -> Frame) {
        for (_, slot) in self.sessions.drain() {
            let _ = slot.tx.send(frame());
        }
    }
}

/// In-process broker for tests and demos.
///
/// Cloning yields another handle to the same broker.
#[derive(Debug, Clone, Default)]
pub struct LoopbackBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl LoopbackBroker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a message to every live session subscribed to `topic`.
    ///
    /// Returns the number of sessions reached.
    pub fn publish(&self, topic: &str, payload: impl AsRef<[u8]>) -> usize {
        let message = InboundMessage::new(topic, payload);
        self.state.lock().deliver(&message)
    }

    /// Returns every message the client published, oldest first.
    #[must_use]
    pub fn published(&self) -> Vec<InboundMessage> {
        self.state.lock().published.clone()
    }

    /// Returns the topics subscribed by live sessions.
    #[must_use]
    pub fn subscriptions(&self) -> BTreeSet<String> {
        self.state
            .lock()
            .sessions
            .values()
            .flat_map(|slot| slot.subscriptions.iter().cloned())
            .collect()
    }

    /// Closes every live session in an orderly way.
    pub fn drop_connections(&self) {
        tracing::debug!("Loopback broker closing sessions");
        self.state
            .lock()
            .close_all(|| Frame::Close("connection closed by broker".to_string()));
    }

    /// Fails every live session with a transport error.
    pub fn fail_connections(&self, reason: &str) {
        tracing::debug!(reason, "Loopback broker failing sessions");
        self.state
            .lock()
            .close_all(|| Frame::Fail(reason.to_string()));
    }

    /// Refuses the next `count` handshakes.
    pub fn refuse_next(&self, count: u32) {
        self.state.lock().refuse = count;
    }

    /// When set, new sessions never receive a handshake acknowledgment.
    pub fn set_unresponsive(&self, unresponsive: bool) {
        self.state.lock().unresponsive = unresponsive;
    }

    /// Returns how many sessions were opened in total.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.state.lock().opened
    }

    /// Returns how many sessions are currently live.
    #[must_use]
    pub fn live_sessions(&self) -> usize {
        self.state.lock().sessions.len()
    }
}

impl Connector for LoopbackBroker {
    type Link = LoopbackLink;
    type Session = LoopbackSession;

    fn open(
        &self,
        endpoint: &Endpoint,
        _options: &ConnectOptions,
    ) -> Result<(LoopbackLink, LoopbackSession), ProtocolError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        state.opened += 1;
        state.next_session += 1;
        let id = state.next_session;

        if state.refuse > 0 {
            state.refuse -= 1;
            let _ = tx.send(Frame::Fail("connection refused".to_string()));
        } else if !state.unresponsive {
            let _ = tx.send(Frame::ConnAck);
        }
        state.sessions.insert(
            id,
            SessionSlot {
                tx,
                subscriptions: BTreeSet::new(),
            },
        );
        tracing::debug!(endpoint = %endpoint, session = id, "Loopback session opened");

        let link = LoopbackLink {
            id,
            state: Arc::clone(&self.state),
        };
        let session = LoopbackSession {
            id,
            rx,
            state: Arc::clone(&self.state),
        };
        Ok((link, session))
    }
}

/// Outbound half of a loopback session.
#[derive(Debug, Clone)]
pub struct LoopbackLink {
    id: u64,
    state: Arc<Mutex<BrokerState>>,
}

impl LoopbackLink {
    fn with_slot<T>(&self, f: impl FnOnce(&mut SessionSlot) -> T) -> Result<T, ProtocolError> {
        self.state
            .lock()
            .sessions
            .get_mut(&self.id)
            .map(f)
            .ok_or_else(|| ProtocolError::ChannelClosed("loopback session".to_string()))
    }
}

impl Link for LoopbackLink {
    async fn subscribe(&self, topic: &str) -> Result<(), ProtocolError> {
        self.with_slot(|slot| {
            slot.subscriptions.insert(topic.to_string());
        })
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), ProtocolError> {
        self.with_slot(|slot| {
            slot.subscriptions.remove(topic);
        })
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), ProtocolError> {
        let mut state = self.state.lock();
        if !state.sessions.contains_key(&self.id) {
            return Err(ProtocolError::ChannelClosed("loopback session".to_string()));
        }
        let message = InboundMessage::new(topic, payload);
        state.deliver(&message);
        state.published.push(message);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ProtocolError> {
        let slot = self
            .state
            .lock()
            .sessions
            .remove(&self.id)
            .ok_or_else(|| ProtocolError::ChannelClosed("loopback session".to_string()))?;
        let _ = slot.tx.send(Frame::Close("client disconnect".to_string()));
        Ok(())
    }
}

/// Inbound half of a loopback session.
#[derive(Debug)]
pub struct LoopbackSession {
    id: u64,
    rx: mpsc::UnboundedReceiver<Frame>,
    state: Arc<Mutex<BrokerState>>,
}

impl Session for LoopbackSession {
    async fn poll(&mut self) -> Result<SessionEvent, ProtocolError> {
        match self.rx.recv().await {
            Some(Frame::ConnAck) => Ok(SessionEvent::ConnAck),
            Some(Frame::Message(message)) => Ok(SessionEvent::Message(message)),
            Some(Frame::Close(reason)) => Ok(SessionEvent::Closed(reason)),
            Some(Frame::Fail(reason)) => Err(ProtocolError::Connection(reason)),
            None => Ok(SessionEvent::Closed("loopback broker dropped".to_string())),
        }
    }
}

impl Drop for LoopbackSession {
    fn drop(&mut self) {
        self.state.lock().sessions.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(broker: &LoopbackBroker) -> (LoopbackLink, LoopbackSession) {
        let endpoint = Endpoint::parse("mqtt://loopback").unwrap();
        broker.open(&endpoint, &ConnectOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn session_starts_with_connack() {
        let broker = LoopbackBroker::new();
        let (_link, mut session) = open(&broker);
        assert_eq!(session.poll().await.unwrap(), SessionEvent::ConnAck);
        assert_eq!(broker.connection_count(), 1);
    }

    #[tokio::test]
    async fn refused_handshake_fails() {
        let broker = LoopbackBroker::new();
        broker.refuse_next(1);
        let (_link, mut session) = open(&broker);
        assert!(matches!(
            session.poll().await,
            Err(ProtocolError::Connection(_))
        ));

        let (_link, mut session) = open(&broker);
        assert_eq!(session.poll().await.unwrap(), SessionEvent::ConnAck);
    }

    #[tokio::test]
    async fn delivers_to_subscribed_sessions_only() {
        let broker = LoopbackBroker::new();
        let (link, mut session) = open(&broker);
        session.poll().await.unwrap();

        assert_eq!(broker.publish("pi/temperature", "20"), 0);
        link.subscribe("pi/temperature").await.unwrap();
        assert_eq!(broker.publish("pi/temperature", "21"), 1);

        let SessionEvent::Message(msg) = session.poll().await.unwrap() else {
            panic!("expected a message");
        };
        assert_eq!(msg.payload(), b"21");
        assert_eq!(broker.subscriptions().len(), 1);

        link.unsubscribe("pi/temperature").await.unwrap();
        assert!(broker.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn publish_is_recorded_and_looped_back() {
        let broker = LoopbackBroker::new();
        let (link, mut session) = open(&broker);
        session.poll().await.unwrap();
        link.subscribe("pi/fan_state").await.unwrap();

        link.publish("pi/fan_state", b"ON".to_vec()).await.unwrap();

        assert_eq!(broker.published()[0].topic(), "pi/fan_state");
        assert!(matches!(
            session.poll().await.unwrap(),
            SessionEvent::Message(_)
        ));
    }

    #[tokio::test]
    async fn disconnect_closes_session() {
        let broker = LoopbackBroker::new();
        let (link, mut session) = open(&broker);
        session.poll().await.unwrap();

        link.disconnect().await.unwrap();
        assert!(matches!(
            session.poll().await.unwrap(),
            SessionEvent::Closed(_)
        ));
        assert!(link.publish("t", vec![]).await.is_err());
        assert_eq!(broker.live_sessions(), 0);
    }

    #[tokio::test]
    async fn dropped_session_is_forgotten() {
        let broker = LoopbackBroker::new();
        let (link, session) = open(&broker);
        link.subscribe("a").await.unwrap();
        drop(session);
        assert!(broker.subscriptions().is_empty());
        assert!(link.subscribe("a").await.is_err());
    }
}
