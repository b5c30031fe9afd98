// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded FIFO window of readings.

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::Reading;

/// Fixed-capacity, insertion-ordered history of the most recent readings.
///
/// Only the client appends, when a temperature message is routed to it.
/// Consumers get a read-only view: a snapshot, the latest reading and the
/// size.
///
/// Mutations take the write lock for the whole append+evict step, so
/// `len() <= capacity()` holds at every observable point. Snapshots take
/// the read lock only long enough to copy the window.
///
/// # Examples
///
/// ```no_run
/// use thermolink::MonitorClient;
/// use thermolink::protocol::LoopbackBroker;
///
/// let client = MonitorClient::new(LoopbackBroker::new());
/// let history = client.history();
/// assert!(history.len() <= history.capacity());
/// println!("{:?}", history.snapshot().values());
/// ```
///
/// There is no consumer write path:
///
/// ```compile_fail
/// use chrono::Utc;
/// use thermolink::MonitorClient;
/// use thermolink::protocol::LoopbackBroker;
///
/// let client = MonitorClient::new(LoopbackBroker::new());
/// client.history().record(99.0, Utc::now());
/// ```
#[derive(Debug)]
pub struct ReadingHistory {
    capacity: usize,
    readings: RwLock<VecDeque<Reading>>,
}

impl ReadingHistory {
    /// Creates a history with the given capacity (at least 1).
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            readings: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Appends a reading, evicting the oldest when full.
    ///
    /// Returns the recorded reading.
    pub(crate) fn record(&self, value: f64, timestamp: DateTime<Utc>) -> Reading {
        let reading = Reading::new(value, timestamp);
        let mut readings = self.readings.write();
        if readings.len() == self.capacity
            && let Some(evicted) = readings.pop_front()
        {
            tracing::trace!(value = evicted.value(), "Evicted oldest reading");
        }
        readings.push_back(reading.clone());
        reading
    }

    /// Returns an immutable copy of the current window, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> HistorySnapshot {
        let readings = self.readings.read();
        HistorySnapshot(readings.iter().cloned().collect())
    }

    /// Returns the most recent reading.
    #[must_use]
    pub fn latest(&self) -> Option<Reading> {
        self.readings.read().back().cloned()
    }

    /// Returns the number of readings held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.readings.read().len()
    }

    /// Returns `true` if no reading has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readings.read().is_empty()
    }

    /// Returns the maximum number of readings held.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Immutable, ordered copy of the history at one point in time.
///
/// Dereferences to a slice of [`Reading`]s, oldest first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistorySnapshot(Arc<[Reading]>);

impl HistorySnapshot {
    /// Returns the values in order, ready to feed a chart dataset.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.0.iter().map(Reading::value).collect()
    }

    /// Returns the labels in order, ready to feed a chart axis.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.0.iter().map(Reading::label).collect()
    }
}

impl Deref for HistorySnapshot {
    type Target = [Reading];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
