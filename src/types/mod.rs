// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared across the client.
//!
//! - [`ConnectionState`] - Lifecycle state of the broker connection
//! - [`FanState`] - `ON`/`OFF` fan command value
//! - [`Topic`] - Validated exact topic name

mod connection_state;
mod fan_state;
mod topic;

pub use connection_state::ConnectionState;
pub use fan_state::FanState;
pub use topic::{FAN_STATE_TOPIC, TEMPERATURE_TOPIC, Topic};
