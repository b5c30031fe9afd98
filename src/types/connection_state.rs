// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection lifecycle states.
//!
//! ```text
//!                 connect()
//!  Disconnected ────────────▶ Connecting ──CONNACK──▶ Connected
//!       ▲  ▲                    │    │                  │   │
//!       │  └────────────────────┘    │ handshake        │   │ transport
//!       │     disconnect()           ▼ failure          │   │ error
//!       │                          Error ◀──────────────┼───┘
//!       │                            │                  │
//!       └────── closed / disconnect ─┴──────────────────┘
//! ```
//!
//! There is no terminal state: `Error` and `Disconnected` can always move
//! back to `Connecting` until the client is dropped.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of the single broker connection owned by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No session. Initial state.
    #[default]
    Disconnected,
    /// Session opened, waiting for the broker handshake.
    Connecting,
    /// Handshake completed; sends are accepted.
    Connected,
    /// The last handshake or session failed.
    Error,
}

impl ConnectionState {
    /// Returns `true` if moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Disconnected | Self::Error, Self::Connecting)
                | (Self::Connecting, Self::Connected)
                | (
                    Self::Connecting | Self::Connected,
                    Self::Disconnected | Self::Error
                )
                | (Self::Error, Self::Disconnected)
        )
    }

    /// Returns `true` while a session is being established or is live.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    /// Returns a short lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionState::{Connected, Connecting, Disconnected, Error};
    use super::*;

    #[test]
    fn initial_state_is_disconnected() {
        assert_eq!(ConnectionState::default(), Disconnected);
    }

    #[test]
    fn legal_transitions() {
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connecting.can_transition_to(Disconnected));
        assert!(Connecting.can_transition_to(Error));
        assert!(Connected.can_transition_to(Disconnected));
        assert!(Connected.can_transition_to(Error));
        assert!(Error.can_transition_to(Connecting));
        assert!(Error.can_transition_to(Disconnected));
    }

    #[test]
    fn illegal_transitions() {
        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Disconnected.can_transition_to(Error));
        assert!(!Connected.can_transition_to(Connecting));
        assert!(!Error.can_transition_to(Connected));
        assert!(!Connected.can_transition_to(Connected));
    }

    #[test]
    fn active_states() {
        assert!(Connecting.is_active());
        assert!(Connected.is_active());
        assert!(!Disconnected.is_active());
        assert!(!Error.is_active());
    }
}
