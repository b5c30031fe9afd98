// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-topic stream of inbound messages.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::message::InboundMessage;
use crate::types::Topic;

use super::ObserverId;

/// Messages routed to one topic, in arrival order.
///
/// The stream is backed by a bounded queue. When the consumer falls behind
/// and the queue is full, new messages for this stream are dropped (the
/// receive path is never blocked) and a `MessageDropped` event is emitted.
///
/// Dropping the stream removes its observer on the next dispatch. The topic
/// itself stays subscribed until `unsubscribe` is called.
#[derive(Debug)]
pub struct MessageStream {
    topic: Topic,
    id: ObserverId,
    rx: mpsc::Receiver<InboundMessage>,
}

impl MessageStream {
    pub(crate) fn new(topic: Topic, id: ObserverId, rx: mpsc::Receiver<InboundMessage>) -> Self {
        Self { topic, id, rx }
    }

    /// Waits for the next message.
    ///
    /// Returns `None` once the observer has been removed and the queue is
    /// drained.
    pub async fn recv(&mut self) -> Option<InboundMessage> {
        self.rx.recv().await
    }

    /// Returns the next queued message without waiting.
    #[must_use]
    pub fn try_recv(&mut self) -> Option<InboundMessage> {
        match self.rx.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Returns the topic this stream follows.
    #[must_use]
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Returns the observer ID backing this stream.
    #[must_use]
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Returns the number of queued messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns `true` if no message is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
