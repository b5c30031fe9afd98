// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic subscriptions and message delivery.
//!
//! Two separate concerns live here:
//!
//! - [`SubscriptionRegistry`] - which topics the client wants from the
//!   broker, replayed on every new session
//! - [`MessageRouter`] - who receives a message once it arrives
//!
//! Observers come in three forms, all keyed by exact topic:
//!
//! - [`MessageCallback`] - called inline on the receive path
//! - [`MessageStream`] - a bounded channel consumed at the caller's pace
//! - [`MessageTask`] - an async handler spawned per message
//!
//! # Usage
//!
//! ```
//! use thermolink::event::EventBus;
//! use thermolink::message::InboundMessage;
//! use thermolink::subscription::MessageRouter;
//! use thermolink::types::Topic;
//!
//! let router = MessageRouter::new(EventBus::new());
//! let topic = Topic::new("pi/temperature").unwrap();
//!
//! let id = router.on_message(&topic, |msg| {
//!     println!("{} -> {}", msg.topic(), msg.payload_lossy());
//! });
//!
//! assert_eq!(router.dispatch(&InboundMessage::new("pi/temperature", "23.5")), 1);
//! assert!(router.remove(id));
//! ```

mod observer;
mod registry;
mod router;
mod stream;

pub use observer::{BoxFuture, MessageCallback, MessageTask, ObserverId};
pub use registry::{Subscription, SubscriptionRegistry};
pub use router::MessageRouter;
pub use stream::MessageStream;
