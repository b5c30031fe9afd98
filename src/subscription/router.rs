// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic routing for inbound messages.
//!
//! The [`MessageRouter`] decouples the transport from consumers: the
//! session task hands every inbound message to [`MessageRouter::dispatch`],
//! which fans it out to the observers registered for that exact topic.
//!
//! # Architecture
//!
//! ```text
//! MQTT Message: pi/temperature → "23.5"
//!                     ↓
//!          MessageRouter.dispatch()
//!                     ↓
//!     Lookup "pi/temperature" in observers
//!                     ↓
//!   for each observer, in registration order:
//!       callback  → called inline
//!       channel   → try_send (dropped if full)
//!       task      → spawned
//!                     ↓
//!        firehose broadcast (every message)
//! ```
//!
//! Dispatch never awaits, so a slow consumer cannot stall ingestion of the
//! next message.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};

use crate::event::{ClientEvent, EventBus};
use crate::message::InboundMessage;
use crate::types::Topic;

use super::observer::{BoxFuture, MessageCallback, MessageTask, Observer};
use super::{MessageStream, ObserverId};

/// Default capacity of the all-messages broadcast channel.
const DEFAULT_FIREHOSE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct Entry {
    id: ObserverId,
    observer: Observer,
}

/// Routes inbound messages to observers by exact topic.
#[derive(Debug)]
pub struct MessageRouter {
    next_id: AtomicU64,
    /// Observers per topic, in registration order.
    observers: RwLock<HashMap<Topic, Vec<Entry>>>,
    firehose: broadcast::Sender<InboundMessage>,
    events: EventBus,
    unrouted: AtomicU64,
    dropped: AtomicU64,
}

impl MessageRouter {
    /// Creates a router reporting dropped messages on `events`.
    #[must_use]
    pub fn new(events: EventBus) -> Self {
        Self::with_firehose_capacity(events, DEFAULT_FIREHOSE_CAPACITY)
    }

    /// Creates a router with a custom capacity for [`messages`](Self::messages).
    #[must_use]
    pub fn with_firehose_capacity(events: EventBus, capacity: usize) -> Self {
        let (firehose, _) = broadcast::channel(capacity.max(1));
        Self {
            next_id: AtomicU64::new(1),
            observers: RwLock::new(HashMap::new()),
            firehose,
            events,
            unrouted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> ObserverId {
        ObserverId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn insert(&self, topic: &Topic, observer: Observer) -> ObserverId {
        let id = self.next_id();
        tracing::debug!(topic = %topic, %id, kind = observer.kind(), "Registering observer");
        self.observers
            .write()
            .entry(topic.clone())
            .or_default()
            .push(Entry { id, observer });
        id
    }

    /// Registers a synchronous callback for `topic`.
    ///
    /// The callback runs on the receive path; it must return quickly.
    pub fn on_message<F>(&self, topic: &Topic, callback: F) -> ObserverId
    where
        F: Fn(&InboundMessage) + Send + Sync + 'static,
    {
        let callback: MessageCallback = Arc::new(callback);
        self.insert(topic, Observer::Callback(callback))
    }

    /// Registers an async handler for `topic`. Every message is handled on
    /// its own tokio task.
    pub fn on_message_task<F, Fut>(&self, topic: &Topic, handler: F) -> ObserverId
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task: MessageTask =
            Arc::new(move |message| -> BoxFuture { Box::pin(handler(message)) });
        self.insert(topic, Observer::Task(task))
    }

    /// Registers a bounded stream for `topic`.
    #[must_use]
    pub fn stream(&self, topic: &Topic, capacity: usize) -> MessageStream {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = self.insert(topic, Observer::Channel(tx));
        MessageStream::new(topic.clone(), id, rx)
    }

    /// Removes an observer.
    ///
    /// Returns `true` if the observer was registered.
    pub fn remove(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let mut removed = false;
        observers.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|entry| entry.id != id);
            removed |= entries.len() != before;
            !entries.is_empty()
        });
        if removed {
            tracing::debug!(%id, "Removed observer");
        }
        removed
    }

    /// Dispatches a message to every observer of its topic, then to the
    /// firehose.
    ///
    /// A panicking callback is logged and skipped. Returns the number of
    /// topic observers that accepted the message.
    pub fn dispatch(&self, message: &InboundMessage) -> usize {
        // Cloned so observers can (un)register from inside a callback.
        let entries = self
            .observers
            .read()
            .get(message.topic())
            .cloned()
            .unwrap_or_default();

        if entries.is_empty() {
            self.unrouted.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(topic = %message.topic(), "No observer for topic");
        }

        let mut delivered = 0;
        let mut closed = Vec::new();
        for entry in &entries {
            match &entry.observer {
                Observer::Callback(callback) => {
                    // A panicking callback must not take the session task down.
                    if panic::catch_unwind(AssertUnwindSafe(|| callback(message))).is_ok() {
                        delivered += 1;
                    } else {
                        tracing::error!(
                            topic = %message.topic(),
                            id = %entry.id,
                            "Message callback panicked"
                        );
                    }
                }
                Observer::Channel(tx) => match tx.try_send(message.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            topic = %message.topic(),
                            id = %entry.id,
                            "Message stream full, dropping message"
                        );
                        self.events.publish(ClientEvent::MessageDropped {
                            topic: message.topic().to_string(),
                        });
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => closed.push(entry.id),
                },
                Observer::Task(task) => match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(task(message.clone()));
                        delivered += 1;
                    }
                    Err(_) => {
                        tracing::warn!(
                            topic = %message.topic(),
                            id = %entry.id,
                            "No runtime for async observer, skipping"
                        );
                    }
                },
            }
        }

        for id in closed {
            tracing::debug!(%id, "Pruning closed message stream");
            self.remove(id);
        }

        // No receivers is fine.
        let _ = self.firehose.send(message.clone());
        delivered
    }

    /// Subscribes to every inbound message regardless of topic.
    #[must_use]
    pub fn messages(&self) -> broadcast::Receiver<InboundMessage> {
        self.firehose.subscribe()
    }

    /// Returns the number of observers registered for `topic`.
    #[must_use]
    pub fn observer_count(&self, topic: &str) -> usize {
        self.observers.read().get(topic).map_or(0, Vec::len)
    }

    /// Returns how many messages arrived on a topic with no observer.
    #[must_use]
    pub fn unrouted_count(&self) -> u64 {
        self.unrouted.load(Ordering::Relaxed)
    }

    /// Returns how many messages were dropped because a stream was full.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use parking_lot::Mutex;

    use super::*;

    fn topic(name: &str) -> Topic {
        Topic::new(name).unwrap()
    }

    fn router() -> MessageRouter {
        MessageRouter::new(EventBus::new())
    }

    #[test]
    fn dispatch_exact_topic_only() {
        let router = router();
        let counter = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&counter);
        router.on_message(&topic("pi/temperature"), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(router.dispatch(&InboundMessage::new("pi/temperature", "1")), 1);
        assert_eq!(router.dispatch(&InboundMessage::new("pi/temperature/x", "1")), 0);
        assert_eq!(router.dispatch(&InboundMessage::new("pi", "1")), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unmatched_topics_are_counted_not_errors() {
        let router = router();
        assert_eq!(router.dispatch(&InboundMessage::new("unknown", "x")), 0);
        assert_eq!(router.unrouted_count(), 1);
    }

    #[test]
    fn observers_run_in_registration_order() {
        let router = router();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..4 {
            let order = Arc::clone(&order);
            router.on_message(&topic("t"), move |_| order.lock().push(n));
        }

        router.dispatch(&InboundMessage::new("t", "x"));
        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn remove_observer() {
        let router = router();
        let counter = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&counter);
        let id = router.on_message(&topic("t"), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(router.remove(id));
        assert!(!router.remove(id));
        assert_eq!(router.observer_count("t"), 0);
        router.dispatch(&InboundMessage::new("t", "x"));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn callback_may_register_during_dispatch() {
        let router = Arc::new(router());
        let inner = Arc::clone(&router);
        router.on_message(&topic("t"), move |_| {
            inner.on_message(&Topic::new("t").unwrap(), |_| {});
        });

        router.dispatch(&InboundMessage::new("t", "x"));
        assert_eq!(router.observer_count("t"), 2);
    }

    #[test]
    fn panicking_callback_does_not_stop_dispatch() {
        let router = router();
        let counter = Arc::new(AtomicU32::new(0));
        router.on_message(&topic("t"), |_| panic!("observer failure"));
        let c = Arc::clone(&counter);
        router.on_message(&topic("t"), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(router.dispatch(&InboundMessage::new("t", "1")), 1);
        assert_eq!(router.dispatch(&InboundMessage::new("t", "2")), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(router.observer_count("t"), 2);
    }

    #[tokio::test]
    async fn stream_receives_in_order() {
        let router = router();
        let mut stream = router.stream(&topic("t"), 8);

        for payload in ["a", "b", "c"] {
            router.dispatch(&InboundMessage::new("t", payload));
        }

        for expected in ["a", "b", "c"] {
            let message = stream.recv().await.unwrap();
            assert_eq!(message.payload_str(), Some(expected));
        }
    }

    #[tokio::test]
    async fn full_stream_drops_without_blocking() {
        let events = EventBus::new();
        let mut event_rx = events.subscribe();
        let router = MessageRouter::new(events);
        let mut stream = router.stream(&topic("t"), 1);

        router.dispatch(&InboundMessage::new("t", "first"));
        router.dispatch(&InboundMessage::new("t", "second"));

        assert_eq!(router.dropped_count(), 1);
        assert_eq!(stream.recv().await.unwrap().payload_str(), Some("first"));
        assert!(stream.try_recv().is_none());
        assert_eq!(
            event_rx.recv().await.unwrap(),
            ClientEvent::MessageDropped {
                topic: "t".to_string()
            }
        );
    }

    #[test]
    fn dropped_stream_is_pruned() {
        let router = router();
        let stream = router.stream(&topic("t"), 4);
        assert_eq!(router.observer_count("t"), 1);

        drop(stream);
        router.dispatch(&InboundMessage::new("t", "x"));
        assert_eq!(router.observer_count("t"), 0);
    }

    #[tokio::test]
    async fn task_observer_runs_independently() {
        let router = router();
        let (tx, mut rx) = mpsc::unbounded_channel();
        router.on_message_task(&topic("t"), move |message| {
            let tx = tx.clone();
            async move {
                tokio::task::yield_now().await;
                let _ = tx.send(message.payload().to_vec());
            }
        });

        assert_eq!(router.dispatch(&InboundMessage::new("t", "x")), 1);
        assert_eq!(rx.recv().await.unwrap(), b"x".to_vec());
    }

    #[tokio::test]
    async fn slow_task_does_not_delay_later_observers() {
        let router = router();
        let gate = Arc::new(tokio::sync::Notify::new());
        let g = Arc::clone(&gate);
        router.on_message_task(&topic("t"), move |_| {
            let g = Arc::clone(&g);
            async move { g.notified().await }
        });
        let counter = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&counter);
        router.on_message(&topic("t"), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        router.dispatch(&InboundMessage::new("t", "1"));
        router.dispatch(&InboundMessage::new("t", "2"));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        gate.notify_waiters();
    }

    #[tokio::test]
    async fn firehose_sees_every_message() {
        let router = router();
        let mut all = router.messages();
        router.on_message(&topic("a"), |_| {});

        router.dispatch(&InboundMessage::new("a", "1"));
        router.dispatch(&InboundMessage::new("b", "2"));

        assert_eq!(all.recv().await.unwrap().topic(), "a");
        assert_eq!(all.recv().await.unwrap().topic(), "b");
    }
}
