// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Temperature payloads: ASCII decimal strings such as `"23.5"`.

use std::sync::Arc;

use crate::error::Error;
use crate::event::{ClientEvent, EventBus};
use crate::history::{Reading, ReadingHistory};
use crate::message::InboundMessage;

/// Parses a temperature payload.
///
/// Surrounding whitespace is ignored. The value must be finite.
///
/// # Errors
///
/// Returns `Error::MalformedPayload` if the payload is not UTF-8 or not a
/// finite decimal number.
pub fn parse_temperature(message: &InboundMessage) -> Result<f64, Error> {
    message
        .payload_str()
        .and_then(|text| text.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .ok_or_else(|| Error::MalformedPayload {
            topic: message.topic().to_string(),
            payload: message.payload_lossy().into_owned(),
        })
}

/// Feeds routed temperature messages into a [`ReadingHistory`].
///
/// Malformed payloads are dropped: they leave the history untouched and are
/// reported as [`ClientEvent::MalformedPayload`].
#[derive(Debug, Clone)]
pub(crate) struct TemperatureRecorder {
    history: Arc<ReadingHistory>,
    events: EventBus,
}

impl TemperatureRecorder {
    /// Creates a recorder writing into `history` and reporting on `events`.
    pub(crate) fn new(history: Arc<ReadingHistory>, events: EventBus) -> Self {
        Self { history, events }
    }

    /// Handles one message. Returns the recorded reading, if any.
    pub(crate) fn handle(&self, message: &InboundMessage) -> Option<Reading> {
        match parse_temperature(message) {
            Ok(value) => {
                let reading = self.history.record(value, message.received_at());
                tracing::debug!(
                    topic = %message.topic(),
                    value,
                    label = %reading.label(),
                    "Recorded temperature reading"
                );
                self.events
                    .publish(ClientEvent::ReadingRecorded(reading.clone()));
                Some(reading)
            }
            Err(Error::MalformedPayload { topic, payload }) => {
                tracing::warn!(
                    topic = %topic,
                    payload = %payload,
                    "Dropping malformed temperature payload"
                );
                self.events
                    .publish(ClientEvent::MalformedPayload { topic, payload });
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping temperature payload");
                None
            }
        }
    }
}
