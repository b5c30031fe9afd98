// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection-gated command publishing.

use std::sync::Arc;

use crate::command::{Command, FanCommand};
use crate::error::{Error, Result};
use crate::protocol::{Connection, Connector};
use crate::types::{ConnectionState, FanState, Topic};

/// Publishes commands through a [`Connection`].
///
/// Every call checks the connection state first: while not `Connected` it
/// fails with [`Error::NotConnected`] and nothing reaches the transport.
pub struct CommandPublisher<C: Connector> {
    connection: Arc<Connection<C>>,
    fan_topic: Topic,
}

impl<C: Connector> CommandPublisher<C> {
    /// Creates a publisher sending fan commands to `fan_topic`.
    pub fn new(connection: Arc<Connection<C>>, fan_topic: Topic) -> Self {
        Self {
            connection,
            fan_topic,
        }
    }

    /// Publishes a raw payload.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConnected` unless connected, `Error::Value` for an
    /// invalid topic and `Error::Protocol` if the transport rejects the
    /// request.
    pub async fn publish_command(&self, topic: &str, payload: impl Into<Vec<u8>>) -> Result<()> {
        if self.connection.state() != ConnectionState::Connected {
            tracing::debug!(topic = %topic, "Command rejected while not connected");
            return Err(Error::NotConnected);
        }
        let topic = Topic::new(topic)?;
        self.connection.send(topic.as_str(), payload.into()).await
    }

    /// Publishes a typed command.
    ///
    /// # Errors
    ///
    /// Same as [`publish_command`](Self::publish_command).
    pub async fn send_command<T: Command + ?Sized>(&self, command: &T) -> Result<()> {
        self.publish_command(command.topic(), command.payload()).await
    }

    /// Switches the fan.
    ///
    /// # Errors
    ///
    /// Same as [`publish_command`](Self::publish_command).
    pub async fn set_fan(&self, state: FanState) -> Result<()> {
        let command = FanCommand::new(state).with_topic(self.fan_topic.clone());
        self.send_command(&command).await?;
        tracing::info!(state = %state.as_str(), topic = %self.fan_topic, "Fan command sent");
        Ok(())
    }
}

impl<C: Connector> std::fmt::Debug for CommandPublisher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandPublisher")
            .field("fan_topic", &self.fan_topic)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::ConnectOptions;
    use crate::event::EventBus;
    use crate::protocol::LoopbackBroker;
    use crate::subscription::{MessageRouter, SubscriptionRegistry};

    fn publisher(
        broker: &LoopbackBroker,
    ) -> (
        CommandPublisher<LoopbackBroker>,
        Arc<Connection<LoopbackBroker>>,
    ) {
        let events = EventBus::new();
        let connection = Arc::new(Connection::new(
            broker.clone(),
            Arc::new(MessageRouter::new(events.clone())),
            Arc::new(SubscriptionRegistry::new()),
            events,
        ));
        let publisher = CommandPublisher::new(
            Arc::clone(&connection),
            Topic::new("pi/fan_state").unwrap(),
        );
        (publisher, connection)
    }

    #[tokio::test]
    async fn rejects_while_disconnected() {
        let broker = LoopbackBroker::new();
        let (publisher, _connection) = publisher(&broker);

        let err = publisher.publish_command("pi/fan_state", "ON").await;
        assert!(matches!(err, Err(Error::NotConnected)));
        // Even an invalid topic reports the connection state first.
        let err = publisher.publish_command("", "ON").await;
        assert!(matches!(err, Err(Error::NotConnected)));
        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn set_fan_publishes_wire_form() {
        let broker = LoopbackBroker::new();
        let (publisher, connection) = publisher(&broker);
        connection
            .connect("mqtt://loopback", ConnectOptions::default())
            .unwrap();
        connection
            .wait_for_state(ConnectionState::Connected, Duration::from_secs(1))
            .await
            .unwrap();

        publisher.set_fan(FanState::On).await.unwrap();
        publisher.set_fan(FanState::Off).await.unwrap();

        let sent: Vec<_> = broker
            .published()
            .iter()
            .map(|m| (m.topic().to_string(), m.payload_lossy().into_owned()))
            .collect();
        assert_eq!(
            sent,
            vec![
                ("pi/fan_state".to_string(), "ON".to_string()),
                ("pi/fan_state".to_string(), "OFF".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn rejects_invalid_topic_when_connected() {
        let broker = LoopbackBroker::new();
        let (publisher, connection) = publisher(&broker);
        connection
            .connect("mqtt://loopback", ConnectOptions::default())
            .unwrap();
        connection
            .wait_for_state(ConnectionState::Connected, Duration::from_secs(1))
            .await
            .unwrap();

        let err = publisher.publish_command("pi/+", "x").await;
        assert!(matches!(err, Err(Error::Value(_))));
    }
}
