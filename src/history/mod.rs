// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded in-memory history of numeric readings.
//!
//! The [`ReadingHistory`] keeps the most recent readings (30 by default) in
//! arrival order. It is written only by the client when a temperature
//! message is routed to it; consumers read it through immutable
//! [`HistorySnapshot`]s.

mod buffer;
mod reading;

pub use buffer::{HistorySnapshot, ReadingHistory};
pub use reading::{LABEL_FORMAT, Reading, clock_label};
