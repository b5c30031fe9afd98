// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Desired broker subscriptions.
//!
//! The registry is the source of truth for which topics the client wants.
//! It outlives any single session: when a session is established the
//! connection replays every entry through [`SubscriptionRegistry::reconcile`],
//! so the broker-side set matches the registry after each reconnect.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::protocol::Link;
use crate::types::Topic;

/// One desired subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    topic: Topic,
    issued: bool,
}

impl Subscription {
    /// Returns the subscribed topic.
    #[must_use]
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Returns `true` once the subscribe request went out on the current
    /// session. Reset whenever the session ends.
    #[must_use]
    pub fn is_issued(&self) -> bool {
        self.issued
    }
}

/// The set of topics the client wants to be subscribed to.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: RwLock<BTreeMap<Topic, Subscription>>,
    /// Serializes subscribe and unsubscribe requests so a replay and a
    /// concurrent `unsubscribe` cannot reach the broker out of order.
    gate: Mutex<()>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a topic. Returns `false` if it was already present.
    pub fn insert(&self, topic: Topic) -> bool {
        let mut entries = self.entries.write();
        if entries.contains_key(&topic) {
            return false;
        }
        entries.insert(
            topic.clone(),
            Subscription {
                topic,
                issued: false,
            },
        );
        true
    }

    /// Removes a topic. Returns `false` if it was not present.
    pub fn remove(&self, topic: &str) -> bool {
        self.entries.write().remove(topic).is_some()
    }

    /// Returns `true` if the topic is registered.
    #[must_use]
    pub fn contains(&self, topic: &str) -> bool {
        self.entries.read().contains_key(topic)
    }

    /// Sends a subscribe request for a registered topic on `link`.
    ///
    /// Does nothing if the topic was removed in the meantime or the request
    /// already went out on this session. Failures are logged and leave the
    /// topic pending for the next replay.
    pub async fn issue_subscribe<L: Link>(&self, link: &L, topic: &Topic) {
        let _guard = self.gate.lock().await;
        let pending = self
            .entries
            .read()
            .get(topic.as_str())
            .is_some_and(|entry| !entry.issued);
        if !pending {
            return;
        }

        match link.subscribe(topic.as_str()).await {
            Ok(()) => {
                tracing::debug!(topic = %topic, "Subscribe request sent");
                if let Some(entry) = self.entries.write().get_mut(topic.as_str()) {
                    entry.issued = true;
                }
            }
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "Subscribe request failed");
            }
        }
    }

    /// Sends an unsubscribe request on `link`. Failures are logged.
    pub async fn issue_unsubscribe<L: Link>(&self, link: &L, topic: &str) {
        let _guard = self.gate.lock().await;
        if self.contains(topic) {
            // Re-added while waiting for the gate.
            return;
        }
        match link.unsubscribe(topic).await {
            Ok(()) => tracing::debug!(topic = %topic, "Unsubscribe request sent"),
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "Unsubscribe request failed");
            }
        }
    }

    /// Replays every registered topic on a freshly established session.
    ///
    /// Returns the number of subscribe requests sent.
    pub async fn reconcile<L: Link>(&self, link: &L) -> usize {
        let _guard = self.gate.lock().await;
        let topics = self.topics();
        let mut sent = 0;

        for topic in topics {
            match link.subscribe(topic.as_str()).await {
                Ok(()) => {
                    if let Some(entry) = self.entries.write().get_mut(topic.as_str()) {
                        entry.issued = true;
                    }
                    sent += 1;
                }
                Err(e) => {
                    tracing::warn!(topic = %topic, error = %e, "Resubscribe failed");
                }
            }
        }

        tracing::debug!(count = sent, "Subscriptions replayed");
        sent
    }

    /// Marks every entry as not yet sent. Called when a session ends.
    pub fn mark_all_pending(&self) {
        for entry in self.entries.write().values_mut() {
            entry.issued = false;
        }
    }

    /// Returns a snapshot of all entries, ordered by topic.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.entries.read().values().cloned().collect()
    }

    /// Returns the registered topics, ordered.
    #[must_use]
    pub fn topics(&self) -> Vec<Topic> {
        self.entries.read().keys().cloned().collect()
    }

    /// Returns the number of registered topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no topic is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
