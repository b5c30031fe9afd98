// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Follows the temperature published by a Raspberry Pi and toggles its fan.
//!
//! Usage:
//!
//! ```text
//! cargo run --example fan_monitor -- [ws://192.168.2.16:9001] [threshold]
//! ```
//!
//! The fan is switched on when a reading reaches the threshold (default
//! 50.0) and off again two degrees below it. Set `RUST_LOG=thermolink=debug`
//! for connection details.

use std::time::Duration;

use thermolink::{ClientEvent, ConnectOptions, FanState, MonitorClientBuilder};
use tracing_subscriber::EnvFilter;

const DEFAULT_ENDPOINT: &str = "ws://192.168.2.16:9001";
const HYSTERESIS: f64 = 2.0;

#[tokio::main]
async fn main() -> thermolink::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let endpoint = args.next().unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    let threshold: f64 = args
        .next()
        .and_then(|t| t.parse().ok())
        .unwrap_or(50.0);

    let client = MonitorClientBuilder::new().build()?;
    let mut events = client.events();

    let options = ConnectOptions::default()
        .connection_timeout(Duration::from_secs(5))
        .backoff_ms([1000, 2000, 5000, 10_000]);
    client.connect(&endpoint, options)?;

    let mut fan = FanState::Off;
    loop {
        tokio::select! {
            event = events.recv() => {
                let Ok(event) = event else { continue };
                match event {
                    ClientEvent::StateChanged { to, error, .. } => match error {
                        Some(error) => tracing::warn!(state = %to, %error, "Connection changed"),
                        None => tracing::info!(state = %to, "Connection changed"),
                    },
                    ClientEvent::ReconnectScheduled { attempt, delay } => {
                        tracing::info!(attempt, ?delay, "Reconnecting");
                    }
                    ClientEvent::ReadingRecorded(reading) => {
                        let snapshot = client.latest_readings();
                        println!(
                            "{} {:>6.2} °C  ({} readings, fan {})",
                            reading.label(),
                            reading.value(),
                            snapshot.len(),
                            fan.as_str()
                        );

                        let wanted = if reading.value() >= threshold {
                            FanState::On
                        } else if reading.value() <= threshold - HYSTERESIS {
                            FanState::Off
                        } else {
                            fan
                        };
                        if wanted != fan {
                            match client.set_fan(wanted).await {
                                Ok(()) => fan = wanted,
                                Err(e) => tracing::warn!(error = %e, "Fan command failed"),
                            }
                        }
                    }
                    ClientEvent::MalformedPayload { payload, .. } => {
                        tracing::warn!(%payload, "Ignoring malformed reading");
                    }
                    ClientEvent::MessageDropped { .. } => {}
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.disconnect().await;
    Ok(())
}
