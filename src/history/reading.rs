// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A single timestamped reading.

use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Format of reading labels: 24-hour clock, whole seconds.
pub const LABEL_FORMAT: &str = "%H:%M:%S";

/// One numeric sample with its timestamp and display label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    value: f64,
    timestamp: DateTime<Utc>,
    label: String,
}

impl Reading {
    /// Creates a reading, labelling it with the local clock time.
    #[must_use]
    pub fn new(value: f64, timestamp: DateTime<Utc>) -> Self {
        let label = clock_label(&timestamp.with_timezone(&Local));
        Self {
            value,
            timestamp,
            label,
        }
    }

    /// Creates a reading labelled in an explicit time zone.
    #[must_use]
    pub fn in_zone<Tz>(value: f64, timestamp: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        Self {
            value,
            timestamp: timestamp.with_timezone(&Utc),
            label: clock_label(timestamp),
        }
    }

    /// Returns the numeric value.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Returns the timestamp.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the `HH:MM:SS` label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Formats the clock time of `timestamp` as `HH:MM:SS` (24-hour).
#[must_use]
pub fn clock_label<Tz>(timestamp: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    timestamp.format(LABEL_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use chrono::FixedOffset;

    use super::*;

    #[test]
    fn label_is_24_hour_without_fraction() {
        let zone = FixedOffset::east_opt(3600).unwrap();
        let ts = zone
            .with_ymd_and_hms(2025, 3, 14, 21, 5, 9)
            .single()
            .unwrap()
            + chrono::Duration::milliseconds(750);
        assert_eq!(clock_label(&ts), "21:05:09");
    }

    #[test]
    fn in_zone_keeps_instant() {
        let zone = FixedOffset::west_opt(5 * 3600).unwrap();
        let ts = zone.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).single().unwrap();
        let reading = Reading::in_zone(23.5, &ts);

        assert_eq!(reading.value(), 23.5);
        assert_eq!(reading.label(), "03:04:05");
        assert_eq!(reading.timestamp(), ts.with_timezone(&Utc));
    }

    #[test]
    fn new_uses_local_clock() {
        let now = Utc::now();
        let reading = Reading::new(1.0, now);
        assert_eq!(reading.label(), clock_label(&now.with_timezone(&Local)));
        assert_eq!(reading.label().len(), 8);
    }
}
