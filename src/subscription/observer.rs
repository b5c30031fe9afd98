// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Observer handles and capability types.
//!
//! - [`ObserverId`] - Unique identifier for removing an observer
//! - [`MessageCallback`] - Synchronous handler run inline on dispatch
//! - [`MessageTask`] - Async handler run on its own task per message

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::message::InboundMessage;

/// Unique identifier for a registered observer.
///
/// Returned when registering an observer and used to remove it later. IDs
/// are unique within a router's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Observer({})", self.0)
    }
}

/// Boxed future returned by async message handlers.
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Synchronous message handler. Runs on the receive path and must not block.
pub type MessageCallback = Arc<dyn Fn(&InboundMessage) + Send + Sync>;

/// Asynchronous message handler. Each message runs on a separate task.
pub type MessageTask = Arc<dyn Fn(InboundMessage) -> BoxFuture + Send + Sync>;

/// How an observer receives messages.
#[derive(Clone)]
pub(crate) enum Observer {
    Callback(MessageCallback),
    Channel(mpsc::Sender<InboundMessage>),
    Task(MessageTask),
}

impl Observer {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Callback(_) => "callback",
            Self::Channel(_) => "channel",
            Self::Task(_) => "task",
        }
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observer_id_display() {
        assert_eq!(ObserverId::new(7).to_string(), "Observer(7)");
        assert_eq!(ObserverId::new(7).value(), 7);
    }

    #[test]
    fn observer_kind_names() {
        let (tx, _rx) = mpsc::channel(1);
        let callback: MessageCallback = Arc::new(|_| {});
        assert_eq!(Observer::Channel(tx).kind(), "channel");
        assert_eq!(format!("{:?}", Observer::Callback(callback)), "callback");
    }
}
