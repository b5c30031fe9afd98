// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Thermolink - a resilient MQTT client core for temperature monitoring and
//! fan control.
//!
//! The crate keeps one broker connection alive, replays subscriptions after
//! every reconnect, routes inbound messages to observers by exact topic,
//! records temperature readings in a bounded history and publishes fan
//! commands only while connected.
//!
//! # Supported Features
//!
//! - **Connection lifecycle**: `Disconnected`, `Connecting`, `Connected`,
//!   `Error`, with configurable reconnect backoff
//! - **Transports**: MQTT 3.1.1 over TCP or WebSocket, plus an in-process
//!   loopback broker
//! - **Routing**: callbacks, bounded streams and async tasks per topic
//! - **History**: the last 30 readings with `HH:MM:SS` labels
//! - **Commands**: `ON`/`OFF` fan control and raw topic/payload commands
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use thermolink::{ConnectOptions, ConnectionState, FanState, MonitorClientBuilder};
//!
//! #[tokio::main]
//! async fn main() -> thermolink::Result<()> {
//!     let client = MonitorClientBuilder::new().build()?;
//!
//!     client.connect("ws://192.168.2.16:9001", ConnectOptions::default())?;
//!     client
//!         .wait_for_state(ConnectionState::Connected, Duration::from_secs(10))
//!         .await?;
//!
//!     let mut temperatures = client.subscribe("pi/temperature").await?;
//!     if let Some(message) = temperatures.recv().await {
//!         println!("{} °C", message.payload_lossy());
//!     }
//!
//!     for reading in client.latest_readings().iter() {
//!         println!("{} {}", reading.label(), reading.value());
//!     }
//!
//!     client.set_fan(FanState::On).await?;
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Events
//!
//! Transport failures never surface as errors from a call; they arrive as
//! [`ClientEvent`]s:
//!
//! ```no_run
//! use thermolink::{ClientEvent, MonitorClientBuilder};
//!
//! # async fn example() -> thermolink::Result<()> {
//! let client = MonitorClientBuilder::new().build()?;
//! let mut events = client.events();
//!
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         ClientEvent::StateChanged { to, error, .. } => println!("{to} {error:?}"),
//!         ClientEvent::ReconnectScheduled { attempt, delay } => {
//!             println!("retry #{attempt} in {delay:?}");
//!         }
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod history;
pub mod message;
pub mod protocol;
pub mod subscription;
pub mod telemetry;
pub mod types;

#[cfg(feature = "mqtt")]
pub use client::MqttMonitorClient;
pub use client::{MonitorClient, MonitorClientBuilder};
pub use command::{Command, CommandPublisher, FanCommand, OutboundCommand};
pub use config::{ClientConfig, ConnectOptions, QosLevel, ReconnectPolicy};
pub use error::{ConfigError, ConnectionFailure, Error, ProtocolError, Result, ValueError};
pub use event::{ClientEvent, EventBus};
pub use history::{HistorySnapshot, Reading, ReadingHistory};
pub use message::InboundMessage;
pub use protocol::{ConnectionStatus, Endpoint, LoopbackBroker};
pub use subscription::{MessageStream, ObserverId};
pub use types::{ConnectionState, FanState, Topic};
