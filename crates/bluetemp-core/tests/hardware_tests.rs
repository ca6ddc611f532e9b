//! Hardware integration tests for bluetemp-core
//!
//! These tests require actual BLE hardware and should be run with:
//! ```text
//! cargo test --package bluetemp-core --test hardware_tests -- --ignored --nocapture
//! ```
//!
//! Set `BLUETEMP_DEVICE` to the id or address of the peripheral to test:
//! ```text
//! BLUETEMP_DEVICE="A4:C1:38:F0:E9:D2" cargo test --package bluetemp-core --test hardware_tests -- --ignored --nocapture
//! ```

use std::env;
use std::sync::Arc;
use std::time::Duration;

use bluetemp_core::{PlatformTransport, RadioState, Session, SessionConfig, Transport};
use tokio::time::timeout;

/// Upper bound for a full discover, connect and read cycle.
const BLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Get the peripheral identifier from the environment.
fn get_device() -> Option<String> {
    env::var("BLUETEMP_DEVICE").ok().filter(|s| !s.is_empty())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("bluetemp_core=debug")
        .with_test_writer()
        .try_init();
}

async fn session(device: &str) -> Session {
    init_tracing();
    let transport = PlatformTransport::new()
        .await
        .expect("Failed to open Bluetooth adapter");
    Session::new(Arc::new(transport), SessionConfig::new(device)).expect("Invalid configuration")
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_adapter_reports_radio_state() {
    init_tracing();
    let transport = PlatformTransport::new()
        .await
        .expect("Failed to open Bluetooth adapter");

    let mut state = transport.radio_state();
    let state = timeout(Duration::from_secs(5), state.wait_for(|s| s.is_known()))
        .await
        .expect("Radio state not reported")
        .map(|s| *s)
        .expect("Adapter closed");
    println!("Radio: {state}");
    assert_eq!(state, RadioState::PoweredOn);
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_read_climate() {
    let Some(device) = get_device() else {
        println!("BLUETEMP_DEVICE not set, skipping");
        return;
    };
    let session = session(&device).await;

    match timeout(BLE_TIMEOUT, session.read_climate()).await {
        Ok(Ok(climate)) => {
            println!(
                "Temperature: {:.2}°C, Humidity: {:.2}%",
                climate.temperature, climate.humidity
            );
            assert!((-40.0..=85.0).contains(&climate.temperature));
            assert!((0.0..=100.0).contains(&climate.humidity));
        }
        Ok(Err(e)) => panic!("Read failed: {e}"),
        Err(_) => panic!("Read timed out after {BLE_TIMEOUT:?}"),
    }
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_read_battery() {
    let Some(device) = get_device() else {
        println!("BLUETEMP_DEVICE not set, skipping");
        return;
    };
    let session = session(&device).await;

    let battery = timeout(BLE_TIMEOUT, session.read_battery())
        .await
        .expect("Read timed out")
        .expect("Read failed");
    println!("Battery: {battery:.2}%");
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_unknown_device_times_out() {
    let session = session("00:11:22:33:44:55").await;

    let err = session
        .read_temperature()
        .await
        .expect_err("Unknown device should not be found");
    println!("Error: {err}");
    assert!(err.is_timeout());
}
