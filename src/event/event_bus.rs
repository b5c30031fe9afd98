// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broadcast fan-out of client events.

use tokio::sync::broadcast;

use crate::config::DEFAULT_EVENT_CAPACITY;

use super::ClientEvent;

/// Shared sender half of a client's event stream.
///
/// Every clone publishes into the same channel. A subscriber that falls more
/// than `capacity` events behind skips the oldest ones and sees
/// `RecvError::Lagged` once; publishers never wait.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use thermolink::event::{ClientEvent, EventBus};
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
///
/// bus.publish(ClientEvent::ReconnectScheduled {
///     attempt: 1,
///     delay: Duration::from_millis(100),
/// });
/// assert!(matches!(
///     rx.try_recv(),
///     Ok(ClientEvent::ReconnectScheduled { attempt: 1, .. })
/// ));
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    /// Creates a bus buffering [`DEFAULT_EVENT_CAPACITY`] events.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Creates a bus buffering `capacity` events per subscriber (at least 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns a receiver for events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of live receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Sends `event` to every live receiver. Without receivers the event is
    /// discarded.
    pub fn publish(&self, event: ClientEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("No event subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::types::ConnectionState;

    fn connecting() -> ClientEvent {
        ClientEvent::StateChanged {
            from: ConnectionState::Disconnected,
            to: ConnectionState::Connecting,
            error: None,
        }
    }

    #[test]
    fn receivers_are_counted() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);

        let rx = bus.subscribe();
        let _other = bus.clone().subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(rx);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn every_receiver_gets_each_event() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(connecting());

        assert_eq!(first.recv().await.unwrap(), connecting());
        assert_eq!(second.recv().await.unwrap(), connecting());
    }

    #[test]
    fn events_before_subscribe_are_not_replayed() {
        let bus = EventBus::new();
        bus.publish(connecting());

        let mut rx = bus.subscribe();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn slow_subscriber_lags() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe();
        for attempt in 1..=5 {
            bus.publish(ClientEvent::ReconnectScheduled {
                attempt,
                delay: Duration::from_millis(100),
            });
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert!(matches!(
            rx.recv().await,
            Ok(ClientEvent::ReconnectScheduled { attempt: 4, .. })
        ));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let bus = EventBus::with_capacity(0);
        let mut rx = bus.subscribe();
        bus.publish(connecting());
        assert!(rx.try_recv().is_ok());
    }
}
