// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the MQTT transport using mockforge-mqtt.

#![cfg(feature = "mqtt")]

use std::time::Duration;

use mockforge_mqtt::broker::MqttConfig;
use mockforge_mqtt::start_mqtt_server;
use thermolink::{
    ConnectOptions, ConnectionFailure, ConnectionState, Error, FanState, MonitorClientBuilder,
    MqttMonitorClient,
};
use tokio::time::sleep;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Helper to find an available port for testing.
fn get_test_port() -> u16 {
    use std::sync::atomic::{AtomicU16, Ordering};
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(18950);
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Starts a mock MQTT broker on the given port.
async fn start_mock_broker(port: u16) {
    let config = MqttConfig {
        port,
        host: "127.0.0.1".to_string(),
        ..Default::default()
    };

    tokio::spawn(async move {
        let _ = start_mqtt_server(config).await;
    });

    // Give the broker time to bind before clients connect
    sleep(Duration::from_millis(500)).await;
}

fn client() -> MqttMonitorClient {
    MonitorClientBuilder::new().build().unwrap()
}

// ============================================================================
// Connection
// ============================================================================

mod connection {
    use super::*;

    #[tokio::test]
    async fn connect_to_broker() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let client = client();
        client
            .connect(&format!("mqtt://127.0.0.1:{port}"), ConnectOptions::default())
            .unwrap();
        let result = client
            .wait_for_state(ConnectionState::Connected, TIMEOUT)
            .await;

        assert!(result.is_ok(), "Failed to connect: {:?}", client.status());
        assert_eq!(
            client.status().endpoint().map(|e| e.port()),
            Some(port)
        );
    }

    #[tokio::test]
    async fn connect_with_tcp_scheme_and_credentials() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let client = client();
        let options = ConnectOptions::default()
            .client_id("thermolink-test")
            .credentials("user", "secret");
        client
            .connect(&format!("tcp://127.0.0.1:{port}"), options)
            .unwrap();

        assert!(
            client
                .wait_for_state(ConnectionState::Connected, TIMEOUT)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn connect_without_scheme() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let client = client();
        client
            .connect(&format!("127.0.0.1:{port}"), ConnectOptions::default())
            .unwrap();

        assert!(
            client
                .wait_for_state(ConnectionState::Connected, TIMEOUT)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn unreachable_broker_reports_connect_failure() {
        // Nothing listens on this port.
        let port = get_test_port();

        let client = client();
        let options = ConnectOptions::default().auto_reconnect(false);
        client
            .connect(&format!("mqtt://127.0.0.1:{port}"), options)
            .unwrap();
        client
            .wait_for_state(ConnectionState::Error, TIMEOUT)
            .await
            .unwrap();

        let status = client.status();
        assert!(
            matches!(
                status.last_error(),
                Some(ConnectionFailure::ConnectFailure(_))
            ),
            "{status:?}"
        );
    }

    #[tokio::test]
    async fn invalid_endpoint_is_rejected() {
        let client = client();
        let result = client.connect("http://127.0.0.1:1883", ConnectOptions::default());
        assert!(matches!(result, Err(Error::Protocol(_))));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}

// ============================================================================
// Publishing
// ============================================================================

mod publishing {
    use super::*;

    #[tokio::test]
    async fn publish_fan_command_and_disconnect() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let client = client();
        client
            .connect(&format!("mqtt://127.0.0.1:{port}"), ConnectOptions::default())
            .unwrap();
        client
            .wait_for_state(ConnectionState::Connected, TIMEOUT)
            .await
            .unwrap();

        client.set_fan(FanState::On).await.unwrap();
        client.publish_command("pi/fan_state", "OFF").await.unwrap();

        client.disconnect().await;
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(matches!(
            client.set_fan(FanState::On).await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn subscribe_while_connected() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let client = client();
        client
            .connect(&format!("mqtt://127.0.0.1:{port}"), ConnectOptions::default())
            .unwrap();
        client
            .wait_for_state(ConnectionState::Connected, TIMEOUT)
            .await
            .unwrap();

        let stream = client.subscribe("pi/humidity").await.unwrap();
        assert_eq!(stream.topic().as_str(), "pi/humidity");
        assert!(
            client
                .subscriptions()
                .iter()
                .any(|s| s.topic().as_str() == "pi/humidity")
        );

        client.disconnect().await;
    }
}
