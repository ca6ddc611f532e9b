//! Trait abstractions over the Bluetooth stack.
//!
//! [`Transport`] is the local radio: power state, advertisements and scan
//! control. [`Peripheral`] is one remote device. The protocol layers only
//! talk to these traits, so the btleplug implementation in
//! [`platform`](crate::platform) and the scriptable one in
//! [`mock`](crate::mock) are interchangeable.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use crate::error::TransportResult;
use crate::events::{Advertisement, RadioState};

/// A GATT service found on a peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Service {
    /// Service UUID.
    pub uuid: Uuid,
}

/// A GATT characteristic found on a peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Characteristic {
    /// Characteristic UUID.
    pub uuid: Uuid,
    /// UUID of the service that owns it.
    pub service_uuid: Uuid,
}

/// The local Bluetooth radio.
///
/// # Example
///
/// ```ignore
/// use bluetemp_core::{RadioState, Transport};
///
/// async fn wait_until_ready(transport: &dyn Transport) {
///     let mut state = transport.radio_state();
///     let _ = state.wait_for(|s| *s == RadioState::PoweredOn).await;
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Subscribe to the radio power state.
    ///
    /// The receiver holds the current state immediately and is notified on
    /// every change.
    fn radio_state(&self) -> watch::Receiver<RadioState>;

    /// Subscribe to advertisements seen while scanning.
    ///
    /// Only advertisements sent after subscribing are delivered, so subscribe
    /// before calling [`start_scan`](Self::start_scan).
    fn advertisements(&self) -> broadcast::Receiver<Advertisement>;

    /// Start scanning for peripherals advertising any of `services`.
    async fn start_scan(&self, services: &[Uuid]) -> TransportResult<()>;

    /// Stop scanning. Stopping an idle radio is not an error.
    async fn stop_scan(&self) -> TransportResult<()>;
}

/// A remote peripheral.
#[async_trait]
pub trait Peripheral: Send + Sync + fmt::Debug {
    /// Platform identifier, stable for the lifetime of the process.
    fn id(&self) -> &str;

    /// Bluetooth address.
    ///
    /// On macOS this is all zeros since CoreBluetooth hides addresses.
    fn address(&self) -> &str;

    /// Subscribe to link-loss notifications for this peripheral.
    fn disconnects(&self) -> broadcast::Receiver<()>;

    /// Establish the link.
    async fn connect(&self) -> TransportResult<()>;

    /// Tear the link down. Disconnecting an idle peripheral is not an error.
    async fn disconnect(&self) -> TransportResult<()>;

    /// Whether the transport currently reports the link as up.
    async fn is_connected(&self) -> TransportResult<bool>;

    /// Enumerate services, restricted to `filter` unless it is empty.
    async fn discover_services(&self, filter: &[Uuid]) -> TransportResult<Vec<Service>>;

    /// Enumerate the characteristics of `service`, restricted to `filter`
    /// unless it is empty.
    async fn discover_characteristics(
        &self,
        service: &Service,
        filter: &[Uuid],
    ) -> TransportResult<Vec<Characteristic>>;

    /// Read the current value of a characteristic.
    async fn read(&self, characteristic: &Characteristic) -> TransportResult<Vec<u8>>;
}
