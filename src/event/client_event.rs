// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client event types.

use std::time::Duration;

use crate::error::ConnectionFailure;
use crate::history::Reading;
use crate::types::ConnectionState;

/// Events emitted by a client.
///
/// Transport failures are reported here rather than returned from any call:
/// a dropped connection shows up as a [`ClientEvent::StateChanged`] carrying
/// a [`ConnectionFailure`].
///
/// # Examples
///
/// ```
/// use thermolink::event::ClientEvent;
/// use thermolink::types::ConnectionState;
///
/// let event = ClientEvent::StateChanged {
///     from: ConnectionState::Connecting,
///     to: ConnectionState::Connected,
///     error: None,
/// };
/// assert_eq!(event.new_state(), Some(ConnectionState::Connected));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The connection moved to a new state.
    StateChanged {
        /// Previous state.
        from: ConnectionState,
        /// New state.
        to: ConnectionState,
        /// Set when the change was caused by a failure.
        error: Option<ConnectionFailure>,
    },

    /// The session was lost and a new attempt will start after `delay`.
    ReconnectScheduled {
        /// 1-based attempt number since the last successful connection.
        attempt: u32,
        /// Wait before the attempt.
        delay: Duration,
    },

    /// A temperature payload could not be parsed and was dropped.
    MalformedPayload {
        /// Topic the payload arrived on.
        topic: String,
        /// Lossy text form of the payload.
        payload: String,
    },

    /// A reading was appended to the history.
    ReadingRecorded(Reading),

    /// A message stream was full and missed a message.
    MessageDropped {
        /// Topic of the dropped message.
        topic: String,
    },
}

impl ClientEvent {
    /// Returns the new connection state for `StateChanged` events.
    #[must_use]
    pub fn new_state(&self) -> Option<ConnectionState> {
        match self {
            Self::StateChanged { to, .. } => Some(*to),
            _ => None,
        }
    }

    /// Returns `true` if the event reports a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        match self {
            Self::StateChanged { error, .. } => error.is_some(),
            Self::MalformedPayload { .. } | Self::MessageDropped { .. } => true,
            Self::ReconnectScheduled { .. } | Self::ReadingRecorded(_) => false,
        }
    }
}
