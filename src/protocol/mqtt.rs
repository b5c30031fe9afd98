// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT 3.1.1 transport over TCP or WebSocket, backed by `rumqttc`.

use std::io::ErrorKind;

use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS, Transport};

use crate::config::{ConnectOptions, QosLevel};
use crate::error::ProtocolError;
use crate::message::InboundMessage;

use super::{Connector, Endpoint, Link, Scheme, Session, SessionEvent};

/// Capacity of the request channel between an `AsyncClient` and its
/// event loop.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Opens rumqttc sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct MqttConnector;

impl MqttConnector {
    /// Creates a connector.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn generated_client_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("thermolink-{}", &id[..12])
}

fn qos(level: QosLevel) -> QoS {
    match level {
        QosLevel::AtMostOnce => QoS::AtMostOnce,
        QosLevel::AtLeastOnce => QoS::AtLeastOnce,
        QosLevel::ExactlyOnce => QoS::ExactlyOnce,
    }
}

fn mqtt_options(endpoint: &Endpoint, options: &ConnectOptions) -> MqttOptions {
    let client_id = options
        .configured_client_id()
        .map_or_else(generated_client_id, ToString::to_string);

    let mut mqtt_options = match endpoint.scheme() {
        Scheme::Tcp => MqttOptions::new(&client_id, endpoint.host(), endpoint.port()),
        Scheme::WebSocket => {
            let mut ws = MqttOptions::new(&client_id, endpoint.to_string(), endpoint.port());
            ws.set_transport(Transport::Ws);
            ws
        }
    };
    mqtt_options.set_keep_alive(options.keep_alive_interval());
    mqtt_options.set_clean_session(true);
    if let Some((username, password)) = options.credentials_pair() {
        mqtt_options.set_credentials(username, password);
    }
    mqtt_options
}

impl Connector for MqttConnector {
    type Link = MqttLink;
    type Session = MqttSession;

    fn open(
        &self,
        endpoint: &Endpoint,
        options: &ConnectOptions,
    ) -> Result<(MqttLink, MqttSession), ProtocolError> {
        let mqtt_options = mqtt_options(endpoint, options);
        tracing::debug!(
            endpoint = %endpoint,
            client_id = %mqtt_options.client_id(),
            "Opening MQTT session"
        );
        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);
        Ok((
            MqttLink {
                client,
                qos: qos(options.qos_level()),
            },
            MqttSession { event_loop },
        ))
    }
}

/// Outbound half of a rumqttc session.
#[derive(Debug, Clone)]
pub struct MqttLink {
    client: AsyncClient,
    qos: QoS,
}

impl Link for MqttLink {
    async fn subscribe(&self, topic: &str) -> Result<(), ProtocolError> {
        self.client.subscribe(topic, self.qos).await?;
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), ProtocolError> {
        self.client.unsubscribe(topic).await?;
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), ProtocolError> {
        self.client.publish(topic, self.qos, false, payload).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ProtocolError> {
        self.client.disconnect().await?;
        Ok(())
    }
}

/// Inbound half of a rumqttc session.
pub struct MqttSession {
    event_loop: EventLoop,
}

impl std::fmt::Debug for MqttSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttSession").finish_non_exhaustive()
    }
}

impl Session for MqttSession {
    async fn poll(&mut self) -> Result<SessionEvent, ProtocolError> {
        match self.event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT broker connected");
                Ok(SessionEvent::ConnAck)
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
                Ok(SessionEvent::Idle)
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                tracing::trace!(
                    topic = %publish.topic,
                    bytes = publish.payload.len(),
                    "MQTT message received"
                );
                Ok(SessionEvent::Message(InboundMessage::new(
                    &publish.topic,
                    &publish.payload,
                )))
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                Ok(SessionEvent::Closed("broker sent DISCONNECT".to_string()))
            }
            Ok(_) => Ok(SessionEvent::Idle),
            Err(ConnectionError::Io(e)) if is_orderly_close(e.kind()) => {
                Ok(SessionEvent::Closed(e.to_string()))
            }
            Err(ConnectionError::RequestsDone) => {
                Ok(SessionEvent::Closed("client requests done".to_string()))
            }
            Err(e) => Err(ProtocolError::Connection(e.to_string())),
        }
    }
}

fn is_orderly_close(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
    )
}
