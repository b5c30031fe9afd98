// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The monitoring client.
//!
//! [`MonitorClient`] owns one broker connection and ties together the
//! subscription registry, the message router, the reading history and the
//! command publisher. It is an ordinary value: create as many as needed and
//! share one behind an `Arc`.
//!
//! ```text
//!   broker ──▶ Connection ──▶ MessageRouter ──▶ TemperatureRecorder ──▶ ReadingHistory
//!     ▲            │                 │
//!     │            │                 └──────────▶ callbacks / streams / tasks
//!     │            └── on Connected ──▶ SubscriptionRegistry::reconcile
//!     └──────────── CommandPublisher
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::command::{Command, CommandPublisher};
use crate::config::{ClientConfig, ConnectOptions};
use crate::error::Result;
use crate::event::{ClientEvent, EventBus};
use crate::history::{HistorySnapshot, Reading, ReadingHistory};
use crate::message::InboundMessage;
use crate::protocol::{Connection, ConnectionStatus, Connector};
use crate::subscription::{
    MessageRouter, MessageStream, ObserverId, Subscription, SubscriptionRegistry,
};
use crate::telemetry::TemperatureRecorder;
use crate::types::{ConnectionState, FanState, Topic};

#[cfg(feature = "mqtt")]
use crate::protocol::MqttConnector;

/// A client talking MQTT over TCP or WebSocket.
#[cfg(feature = "mqtt")]
pub type MqttMonitorClient = MonitorClient<MqttConnector>;

/// Builder for [`MonitorClient`].
///
/// # Examples
///
/// ```
/// use thermolink::MonitorClientBuilder;
/// use thermolink::protocol::LoopbackBroker;
///
/// let client = MonitorClientBuilder::new()
///     .temperature_topic("greenhouse/temperature")
///     .fan_topic("greenhouse/fan")
///     .history_capacity(60)
///     .build_with(LoopbackBroker::new())
///     .unwrap();
///
/// assert_eq!(client.config().history_capacity(), 60);
/// ```
#[derive(Debug, Clone)]
pub struct MonitorClientBuilder {
    config: ClientConfig,
    temperature_topic: Option<String>,
    fan_topic: Option<String>,
    auto_subscribe_temperature: bool,
}

impl Default for MonitorClientBuilder {
    fn default() -> Self {
        Self {
            config: ClientConfig::default(),
            temperature_topic: None,
            fan_topic: None,
            auto_subscribe_temperature: true,
        }
    }
}

impl MonitorClientBuilder {
    /// Creates a builder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the topic carrying temperature readings.
    #[must_use]
    pub fn temperature_topic(mut self, topic: impl Into<String>) -> Self {
        self.temperature_topic = Some(topic.into());
        self
    }

    /// Sets the topic fan commands are published to.
    #[must_use]
    pub fn fan_topic(mut self, topic: impl Into<String>) -> Self {
        self.fan_topic = Some(topic.into());
        self
    }

    /// Sets how many readings the history keeps.
    #[must_use]
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.config.history_capacity = capacity;
        self
    }

    /// Sets the queue depth of each [`MessageStream`].
    #[must_use]
    pub fn stream_capacity(mut self, capacity: usize) -> Self {
        self.config.stream_capacity = capacity;
        self
    }

    /// Sets the buffer size of the event and message broadcast channels.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Controls whether the temperature topic is subscribed automatically.
    ///
    /// Enabled by default. When disabled, readings are only recorded after
    /// an explicit `subscribe` to the temperature topic.
    #[must_use]
    pub fn auto_subscribe_temperature(mut self, enabled: bool) -> Self {
        self.auto_subscribe_temperature = enabled;
        self
    }

    /// Builds an MQTT client.
    ///
    /// # Errors
    ///
    /// Returns `Error::Value` for an invalid topic and `Error::Config` for a
    /// zero capacity.
    #[cfg(feature = "mqtt")]
    pub fn build(self) -> Result<MqttMonitorClient> {
        self.build_with(MqttConnector::new())
    }

    /// Builds a client on top of any transport.
    ///
    /// # Errors
    ///
    /// Returns `Error::Value` for an invalid topic and `Error::Config` for a
    /// zero capacity.
    pub fn build_with<C: Connector>(self, connector: C) -> Result<MonitorClient<C>> {
        let mut config = self.config;
        if let Some(topic) = self.temperature_topic {
            config.temperature_topic = Topic::new(topic)?;
        }
        if let Some(topic) = self.fan_topic {
            config.fan_topic = Topic::new(topic)?;
        }
        config.validate()?;
        Ok(MonitorClient::from_parts(
            connector,
            config,
            self.auto_subscribe_temperature,
        ))
    }
}

/// A resilient monitoring client.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use thermolink::MonitorClient;
/// use thermolink::config::ConnectOptions;
/// use thermolink::protocol::LoopbackBroker;
/// use thermolink::types::{ConnectionState, FanState};
///
/// # #[tokio::main]
/// # async fn main() -> thermolink::Result<()> {
/// let broker = LoopbackBroker::new();
/// let client = MonitorClient::new(broker.clone());
///
/// client.connect("ws://192.168.2.16:9001", ConnectOptions::default())?;
/// client
///     .wait_for_state(ConnectionState::Connected, Duration::from_secs(1))
///     .await?;
///
/// client.set_fan(FanState::On).await?;
/// client.disconnect().await;
/// # Ok(())
/// # }
/// ```
pub struct MonitorClient<C: Connector> {
    config: ClientConfig,
    events: EventBus,
    history: Arc<ReadingHistory>,
    router: Arc<MessageRouter>,
    registry: Arc<SubscriptionRegistry>,
    connection: Arc<Connection<C>>,
    publisher: CommandPublisher<C>,
    recorder: ObserverId,
}

impl<C: Connector> MonitorClient<C> {
    /// Creates a client with the default configuration.
    pub fn new(connector: C) -> Self {
        Self::from_parts(connector, ClientConfig::default(), true)
    }

    fn from_parts(connector: C, config: ClientConfig, auto_subscribe_temperature: bool) -> Self {
        let events = EventBus::with_capacity(config.event_capacity);
        let history = Arc::new(ReadingHistory::with_capacity(config.history_capacity));
        let router = Arc::new(MessageRouter::with_firehose_capacity(
            events.clone(),
            config.event_capacity,
        ));
        let registry = Arc::new(SubscriptionRegistry::new());
        let connection = Arc::new(Connection::new(
            connector,
            Arc::clone(&router),
            Arc::clone(&registry),
            events.clone(),
        ));
        let publisher = CommandPublisher::new(Arc::clone(&connection), config.fan_topic.clone());

        // Registered before any consumer observer, so readings are recorded
        // before consumers see the message.
        let recorder = TemperatureRecorder::new(Arc::clone(&history), events.clone());
        let recorder = router.on_message(&config.temperature_topic, move |message| {
            recorder.handle(message);
        });
        if auto_subscribe_temperature {
            registry.insert(config.temperature_topic.clone());
        }

        Self {
            config,
            events,
            history,
            router,
            registry,
            connection,
            publisher,
            recorder,
        }
    }

    /// Starts connecting to the broker at `endpoint` and returns
    /// immediately.
    ///
    /// Watch [`state`](Self::state), [`events`](Self::events) or use
    /// [`wait_for_state`](Self::wait_for_state) to follow progress. A no-op
    /// while already connecting or connected.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` for an invalid endpoint or when called
    /// outside a tokio runtime.
    pub fn connect(&self, endpoint: &str, options: ConnectOptions) -> Result<()> {
        self.connection.connect(endpoint, options)
    }

    /// Closes the connection and cancels any pending reconnect. Idempotent.
    ///
    /// Subscriptions and observers are kept and replayed on the next
    /// `connect`.
    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
    }

    async fn ensure_subscribed(&self, topic: &Topic) {
        if self.registry.insert(topic.clone()) {
            tracing::debug!(topic = %topic, "Subscription added");
        }
        if let Some(link) = self.connection.live_link() {
            self.registry.issue_subscribe(&link, topic).await;
        }
    }

    /// Subscribes to `topic` and returns a stream of its messages.
    ///
    /// The broker subscription is issued now when connected, or on the next
    /// successful connection otherwise. Subscribing to an already active
    /// topic only adds another stream.
    ///
    /// # Errors
    ///
    /// Returns `Error::Value` if the topic is empty or contains wildcards.
    pub async fn subscribe(&self, topic: &str) -> Result<MessageStream> {
        let topic = Topic::new(topic)?;
        let stream = self.router.stream(&topic, self.config.stream_capacity);
        self.ensure_subscribed(&topic).await;
        Ok(stream)
    }

    /// Removes `topic` from the subscription set and unsubscribes on the
    /// broker when connected.
    ///
    /// Observers registered for the topic stay in place and receive messages
    /// again after a new `subscribe`. Returns `false` if the topic was not
    /// subscribed.
    pub async fn unsubscribe(&self, topic: &str) -> bool {
        if !self.registry.remove(topic) {
            return false;
        }
        tracing::debug!(topic = %topic, "Subscription removed");
        if let Some(link) = self.connection.live_link() {
            self.registry.issue_unsubscribe(&link, topic).await;
        }
        true
    }

    /// Calls `callback` for each message on `topic`, on the receive path.
    ///
    /// The callback must return quickly. Subscribes to the topic if needed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Value` if the topic is empty or contains wildcards.
    pub async fn on_message<F>(&self, topic: &str, callback: F) -> Result<ObserverId>
    where
        F: Fn(&InboundMessage) + Send + Sync + 'static,
    {
        let topic = Topic::new(topic)?;
        let id = self.router.on_message(&topic, callback);
        self.ensure_subscribed(&topic).await;
        Ok(id)
    }

    /// Runs `handler` on its own task for each message on `topic`.
    ///
    /// Subscribes to the topic if needed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Value` if the topic is empty or contains wildcards.
    pub async fn on_message_task<F, Fut>(&self, topic: &str, handler: F) -> Result<ObserverId>
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let topic = Topic::new(topic)?;
        let id = self.router.on_message_task(&topic, handler);
        self.ensure_subscribed(&topic).await;
        Ok(id)
    }

    /// Removes an observer. Returns `false` for an unknown ID.
    ///
    /// The built-in temperature recorder cannot be removed.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        if id == self.recorder {
            return false;
        }
        self.router.remove(id)
    }

    /// Publishes a raw command.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConnected` unless connected. Nothing is queued.
    pub async fn publish_command(&self, topic: &str, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.publisher.publish_command(topic, payload).await
    }

    /// Publishes a typed command.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConnected` unless connected.
    pub async fn send_command<T: Command + ?Sized>(&self, command: &T) -> Result<()> {
        self.publisher.send_command(command).await
    }

    /// Switches the fan through the configured fan topic.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConnected` unless connected.
    pub async fn set_fan(&self, state: FanState) -> Result<()> {
        self.publisher.set_fan(state).await
    }

    /// Returns the recorded readings, oldest first.
    #[must_use]
    pub fn latest_readings(&self) -> HistorySnapshot {
        self.history.snapshot()
    }

    /// Returns the most recent reading.
    #[must_use]
    pub fn latest_reading(&self) -> Option<Reading> {
        self.history.latest()
    }

    /// Returns a read-only view of the reading history.
    ///
    /// Readings are appended only when a temperature message is routed.
    #[must_use]
    pub fn history(&self) -> &ReadingHistory {
        &self.history
    }

    /// Returns the connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Returns the connection status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    /// Subscribes to client events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Subscribes to every inbound message, whatever its topic.
    #[must_use]
    pub fn messages(&self) -> broadcast::Receiver<InboundMessage> {
        self.router.messages()
    }

    /// Waits until the connection reaches `state`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Timeout` if the state is not reached in time.
    pub async fn wait_for_state(&self, state: ConnectionState, timeout: Duration) -> Result<()> {
        self.connection.wait_for_state(state, timeout).await
    }

    /// Returns the desired subscriptions, ordered by topic.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.registry.subscriptions()
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns how many messages arrived on topics without observers.
    #[must_use]
    pub fn unrouted_count(&self) -> u64 {
        self.router.unrouted_count()
    }

    /// Returns how many messages were dropped because a stream was full.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.router.dropped_count()
    }
}

impl<C: Connector> std::fmt::Debug for MonitorClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorClient")
            .field("config", &self.config)
            .field("status", &self.connection.status())
            .field("readings", &self.history.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::protocol::LoopbackBroker;

    #[test]
    fn builder_rejects_invalid_topic() {
        let err = MonitorClientBuilder::new()
            .temperature_topic("pi/+")
            .build_with(LoopbackBroker::new())
            .unwrap_err();
        assert!(matches!(err, Error::Value(_)));
    }

    #[test]
    fn builder_rejects_zero_capacity() {
        let err = MonitorClientBuilder::new()
            .history_capacity(0)
            .build_with(LoopbackBroker::new())
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn temperature_topic_subscribed_by_default() {
        let client = MonitorClient::new(LoopbackBroker::new());
        let topics: Vec<_> = client
            .subscriptions()
            .iter()
            .map(|s| s.topic().to_string())
            .collect();
        assert_eq!(topics, vec!["pi/temperature"]);
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn auto_subscribe_can_be_disabled() {
        let client = MonitorClientBuilder::new()
            .auto_subscribe_temperature(false)
            .build_with(LoopbackBroker::new())
            .unwrap();
        assert!(client.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn subscribe_while_disconnected_is_queued() {
        let client = MonitorClient::new(LoopbackBroker::new());
        let _stream = client.subscribe("pi/humidity").await.unwrap();

        let pending: Vec<_> = client
            .subscriptions()
            .into_iter()
            .filter(|s| !s.is_issued())
            .map(|s| s.topic().to_string())
            .collect();
        assert_eq!(pending, vec!["pi/humidity", "pi/temperature"]);
    }

    #[tokio::test]
    async fn unsubscribe_unknown_topic() {
        let client = MonitorClient::new(LoopbackBroker::new());
        assert!(!client.unsubscribe("pi/humidity").await);
        assert!(client.unsubscribe("pi/temperature").await);
    }

    #[tokio::test]
    async fn recorder_cannot_be_removed() {
        let client = MonitorClient::new(LoopbackBroker::new());
        assert!(!client.remove_observer(client.recorder));
        let id = client.on_message("pi/temperature", |_| {}).await.unwrap();
        assert!(client.remove_observer(id));
    }

    #[tokio::test]
    async fn history_grows_only_from_routed_temperatures() {
        let broker = LoopbackBroker::new();
        let client = MonitorClient::new(broker.clone());
        client
            .connect("mqtt://loopback", ConnectOptions::default())
            .unwrap();
        client
            .wait_for_state(ConnectionState::Connected, Duration::from_secs(5))
            .await
            .unwrap();
        let mut messages = client.messages();
        while !broker.subscriptions().contains("pi/temperature") {
            tokio::task::yield_now().await;
        }

        assert!(client.history().is_empty());
        broker.publish("pi/temperature", "19.0");
        messages.recv().await.unwrap();
        client.router.dispatch(&InboundMessage::new("pi/humidity", "40"));

        let history = client.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history.capacity(), 30);
        assert_eq!(history.latest().map(|r| r.value()), Some(19.0));
        assert_eq!(history.snapshot(), client.latest_readings());
    }

    #[tokio::test]
    async fn invalid_subscribe_topic() {
        let client = MonitorClient::new(LoopbackBroker::new());
        assert!(matches!(
            client.subscribe("pi/#").await,
            Err(Error::Value(_))
        ));
    }
}
