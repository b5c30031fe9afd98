// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event stream of a client.
//!
//! The [`EventBus`] uses tokio's broadcast channel so any number of
//! consumers can follow connection state changes, reconnect scheduling,
//! dropped payloads and recorded readings.
//!
//! # Examples
//!
//! ```
//! use thermolink::event::{ClientEvent, EventBus};
//! use thermolink::types::ConnectionState;
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(ClientEvent::StateChanged {
//!     from: ConnectionState::Disconnected,
//!     to: ConnectionState::Connecting,
//!     error: None,
//! });
//! assert!(rx.try_recv().is_ok());
//! ```

mod client_event;
mod event_bus;

pub use client_event::ClientEvent;
pub use event_bus::EventBus;
