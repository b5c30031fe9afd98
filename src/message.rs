// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inbound broker messages.

use std::borrow::Cow;
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// A message received from the broker.
///
/// Immutable and cheap to clone: topic and payload are shared buffers, so
/// fanning a message out to several observers does not copy the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    topic: Arc<str>,
    payload: Arc<[u8]>,
    received_at: DateTime<Utc>,
}

impl InboundMessage {
    /// Creates a message stamped with the current time.
    #[must_use]
    pub fn new(topic: impl AsRef<str>, payload: impl AsRef<[u8]>) -> Self {
        Self::with_timestamp(topic, payload, Utc::now())
    }

    /// Creates a message with an explicit receipt timestamp.
    #[must_use]
    pub fn with_timestamp(
        topic: impl AsRef<str>,
        payload: impl AsRef<[u8]>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            topic: Arc::from(topic.as_ref()),
            payload: Arc::from(payload.as_ref()),
            received_at,
        }
    }

    /// Returns the topic the message arrived on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the raw payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the payload as UTF-8, if valid.
    #[must_use]
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Returns the payload as text, replacing invalid UTF-8 sequences.
    #[must_use]
    pub fn payload_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Returns when the message was received.
    #[must_use]
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}
