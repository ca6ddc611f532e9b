//! Scriptable transport and peripheral for testing.
//!
//! [`MockTransport`] and [`MockPeripheral`] implement the transport traits
//! in memory, so the whole discovery, connection and read protocol can run
//! without Bluetooth hardware.
//!
//! # Features
//!
//! - **Radio control**: report any [`RadioState`] at any time
//! - **Failure injection**: fail scan start, connect or read with a message
//! - **Latency simulation**: delay connect, service discovery and reads
//! - **Link loss**: drop the link from the peripheral side mid-operation
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use bluetemp_core::{MockPeripheral, MockTransport, Session, SessionConfig};
//! use bluetemp_types::Role;
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = Arc::new(MockTransport::powered_on());
//!     transport.add_peripheral(
//!         MockPeripheral::builder()
//!             .id("sensor-1")
//!             .value(Role::Temperature, 21.5)
//!             .build(),
//!     );
//!
//!     let session = Session::new(transport, SessionConfig::new("sensor-1")).unwrap();
//!     assert_eq!(session.read_temperature().await.unwrap(), 21.5);
//! }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use bluetemp_types::{Role, codec, uuids};

use crate::error::{TransportError, TransportResult};
use crate::events::{Advertisement, RadioState};
use crate::traits::{Characteristic, Peripheral, Service, Transport};

const ADVERTISEMENT_CAPACITY: usize = 64;
const DISCONNECT_CAPACITY: usize = 16;

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

async fn simulate_latency(latency_ms: &AtomicU64) {
    let latency = latency_ms.load(Ordering::Relaxed);
    if latency > 0 {
        tokio::time::sleep(Duration::from_millis(latency)).await;
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// An in-memory radio.
pub struct MockTransport {
    radio: watch::Sender<RadioState>,
    advertisements: broadcast::Sender<Advertisement>,
    peripherals: Mutex<Vec<Arc<MockPeripheral>>>,
    scanning: Arc<AtomicBool>,
    scan_count: AtomicU32,
    stop_count: AtomicU32,
    /// Delay between scan start and advertisements (0 = immediate).
    advertise_delay_ms: AtomicU64,
    scan_failure: RwLock<Option<String>>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("radio", &*self.radio.borrow())
            .field("scanning", &self.is_scanning())
            .finish_non_exhaustive()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a transport whose radio has not reported its state yet.
    pub fn new() -> Self {
        let (advertisements, _) = broadcast::channel(ADVERTISEMENT_CAPACITY);
        Self {
            radio: watch::Sender::new(RadioState::Unknown),
            advertisements,
            peripherals: Mutex::new(Vec::new()),
            scanning: Arc::new(AtomicBool::new(false)),
            scan_count: AtomicU32::new(0),
            stop_count: AtomicU32::new(0),
            advertise_delay_ms: AtomicU64::new(0),
            scan_failure: RwLock::new(None),
        }
    }

    /// Create a transport whose radio is already powered on.
    pub fn powered_on() -> Self {
        let transport = Self::new();
        transport.set_radio_state(RadioState::PoweredOn);
        transport
    }

    /// Report a new radio state.
    pub fn set_radio_state(&self, state: RadioState) {
        self.radio.send_replace(state);
    }

    /// Register a peripheral that advertises whenever a matching scan starts.
    pub fn add_peripheral(&self, peripheral: MockPeripheral) -> Arc<MockPeripheral> {
        let peripheral = Arc::new(peripheral);
        self.peripherals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&peripheral));
        peripheral
    }

    /// Send one advertisement for `peripheral` right now.
    pub fn advertise(&self, peripheral: &Arc<MockPeripheral>) {
        // No subscribers is fine: nobody is scanning.
        let _ = self.advertisements.send(peripheral.advertisement());
    }

    /// Delay advertisements after each scan start.
    pub fn set_advertise_delay(&self, delay: Duration) {
        self.advertise_delay_ms
            .store(duration_ms(delay), Ordering::Relaxed);
    }

    /// Make `start_scan` fail with `message`, or succeed again with `None`.
    pub fn set_scan_failure(&self, message: Option<&str>) {
        *write_lock(&self.scan_failure) = message.map(str::to_string);
    }

    /// Number of successful `start_scan` calls.
    pub fn scan_count(&self) -> u32 {
        self.scan_count.load(Ordering::SeqCst)
    }

    /// Number of `stop_scan` calls.
    pub fn stop_count(&self) -> u32 {
        self.stop_count.load(Ordering::SeqCst)
    }

    /// Whether a scan is running.
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    fn advertising(&self, services: &[Uuid]) -> Vec<Arc<MockPeripheral>> {
        self.peripherals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|p| services.is_empty() || p.advertised.iter().any(|s| services.contains(s)))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn radio_state(&self) -> watch::Receiver<RadioState> {
        self.radio.subscribe()
    }

    fn advertisements(&self) -> broadcast::Receiver<Advertisement> {
        self.advertisements.subscribe()
    }

    async fn start_scan(&self, services: &[Uuid]) -> TransportResult<()> {
        if let Some(message) = read_lock(&self.scan_failure).clone() {
            return Err(TransportError::Other(message));
        }
        self.scan_count.fetch_add(1, Ordering::SeqCst);
        self.scanning.store(true, Ordering::SeqCst);

        let advertising = self.advertising(services);
        let delay = self.advertise_delay_ms.load(Ordering::Relaxed);
        if delay == 0 {
            for peripheral in &advertising {
                self.advertise(peripheral);
            }
        } else {
            let sender = self.advertisements.clone();
            let scanning = Arc::clone(&self.scanning);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                if !scanning.load(Ordering::SeqCst) {
                    return;
                }
                for peripheral in &advertising {
                    let _ = sender.send(peripheral.advertisement());
                }
            });
        }
        Ok(())
    }

    async fn stop_scan(&self) -> TransportResult<()> {
        self.stop_count.fetch_add(1, Ordering::SeqCst);
        self.scanning.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct MockService {
    uuid: Uuid,
    characteristics: Vec<Uuid>,
}

/// An in-memory peripheral.
pub struct MockPeripheral {
    id: String,
    address: String,
    local_name: Option<String>,
    rssi: Option<i16>,
    advertised: Vec<Uuid>,
    services: Vec<MockService>,
    values: RwLock<HashMap<Uuid, Vec<u8>>>,
    connected: AtomicBool,
    disconnects: broadcast::Sender<()>,
    connect_count: AtomicU32,
    disconnect_count: AtomicU32,
    read_count: AtomicU32,
    connect_failure: RwLock<Option<String>>,
    read_failure: RwLock<Option<String>>,
    /// Simulated connect latency in milliseconds (0 = no delay).
    connect_latency_ms: AtomicU64,
    /// Simulated service discovery latency in milliseconds (0 = no delay).
    discovery_latency_ms: AtomicU64,
    /// Simulated read latency in milliseconds (0 = no delay).
    read_latency_ms: AtomicU64,
}

impl std::fmt::Debug for MockPeripheral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPeripheral")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish()
    }
}

impl MockPeripheral {
    /// Start building a mock peripheral.
    pub fn builder() -> MockPeripheralBuilder {
        MockPeripheralBuilder::new()
    }

    /// Whether the link is up.
    pub fn is_connected_sync(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Number of `connect` calls.
    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::SeqCst)
    }

    /// Number of `disconnect` calls.
    pub fn disconnect_count(&self) -> u32 {
        self.disconnect_count.load(Ordering::SeqCst)
    }

    /// Number of `read` calls.
    pub fn read_count(&self) -> u32 {
        self.read_count.load(Ordering::SeqCst)
    }

    /// Make `connect` fail with `message`, or succeed again with `None`.
    pub fn set_connect_failure(&self, message: Option<&str>) {
        *write_lock(&self.connect_failure) = message.map(str::to_string);
    }

    /// Make `read` fail with `message`, or succeed again with `None`.
    pub fn set_read_failure(&self, message: Option<&str>) {
        *write_lock(&self.read_failure) = message.map(str::to_string);
    }

    /// Set the value reported for `role`.
    pub fn set_value(&self, role: Role, value: f64) {
        self.set_raw_value(role, encode(value));
    }

    /// Set the raw payload reported for `role`.
    pub fn set_raw_value(&self, role: Role, payload: Vec<u8>) {
        write_lock(&self.values).insert(role.characteristic(), payload);
    }

    /// Set the simulated connect latency.
    pub fn set_connect_latency(&self, latency: Duration) {
        self.connect_latency_ms
            .store(duration_ms(latency), Ordering::Relaxed);
    }

    /// Set the simulated read latency.
    pub fn set_read_latency(&self, latency: Duration) {
        self.read_latency_ms
            .store(duration_ms(latency), Ordering::Relaxed);
    }

    /// Drop the link from the peripheral side.
    pub fn simulate_disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.disconnects.send(());
    }

    fn advertisement(self: &Arc<Self>) -> Advertisement {
        let peripheral: Arc<dyn Peripheral> = self.clone();
        Advertisement {
            id: self.id.clone(),
            address: self.address.clone(),
            local_name: self.local_name.clone(),
            rssi: self.rssi,
            peripheral,
        }
    }

    fn ensure_connected(&self) -> TransportResult<()> {
        if self.is_connected_sync() {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }
}

#[async_trait]
impl Peripheral for MockPeripheral {
    fn id(&self) -> &str {
        &self.id
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn disconnects(&self) -> broadcast::Receiver<()> {
        self.disconnects.subscribe()
    }

    async fn connect(&self) -> TransportResult<()> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        simulate_latency(&self.connect_latency_ms).await;
        if let Some(message) = read_lock(&self.connect_failure).clone() {
            return Err(TransportError::Other(message));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> TransportResult<()> {
        self.disconnect_count.fetch_add(1, Ordering::SeqCst);
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.disconnects.send(());
        }
        Ok(())
    }

    async fn is_connected(&self) -> TransportResult<bool> {
        Ok(self.is_connected_sync())
    }

    async fn discover_services(&self, filter: &[Uuid]) -> TransportResult<Vec<Service>> {
        self.ensure_connected()?;
        simulate_latency(&self.discovery_latency_ms).await;
        self.ensure_connected()?;
        Ok(self
            .services
            .iter()
            .filter(|s| filter.is_empty() || filter.contains(&s.uuid))
            .map(|s| Service { uuid: s.uuid })
            .collect())
    }

    async fn discover_characteristics(
        &self,
        service: &Service,
        filter: &[Uuid],
    ) -> TransportResult<Vec<Characteristic>> {
        self.ensure_connected()?;
        Ok(self
            .services
            .iter()
            .filter(|s| s.uuid == service.uuid)
            .flat_map(|s| s.characteristics.iter())
            .filter(|uuid| filter.is_empty() || filter.contains(uuid))
            .map(|uuid| Characteristic {
                uuid: *uuid,
                service_uuid: service.uuid,
            })
            .collect())
    }

    async fn read(&self, characteristic: &Characteristic) -> TransportResult<Vec<u8>> {
        self.read_count.fetch_add(1, Ordering::SeqCst);
        simulate_latency(&self.read_latency_ms).await;
        self.ensure_connected()?;
        if let Some(message) = read_lock(&self.read_failure).clone() {
            return Err(TransportError::Other(message));
        }
        read_lock(&self.values)
            .get(&characteristic.uuid)
            .cloned()
            .ok_or(TransportError::UnknownCharacteristic(characteristic.uuid))
    }
}

/// Values outside the codec range are reported as an empty payload.
fn encode(value: f64) -> Vec<u8> {
    codec::encode(value).map(Vec::from).unwrap_or_default()
}

/// Builder for [`MockPeripheral`].
#[derive(Debug)]
pub struct MockPeripheralBuilder {
    id: Option<String>,
    address: Option<String>,
    local_name: Option<String>,
    rssi: Option<i16>,
    advertised: Vec<Uuid>,
    services: Vec<MockService>,
    values: HashMap<Uuid, Vec<u8>>,
    connect_latency: Duration,
    discovery_latency: Duration,
    read_latency: Duration,
}

impl Default for MockPeripheralBuilder {
    fn default() -> Self {
        let values = [
            (Role::Temperature, 22.5),
            (Role::Humidity, 45.0),
            (Role::Battery, 87.0),
        ]
        .into_iter()
        .map(|(role, value)| (role.characteristic(), encode(value)))
        .collect();

        Self {
            id: None,
            address: None,
            local_name: Some("Mock Sensor".to_string()),
            rssi: Some(-55),
            advertised: vec![uuids::ENVIRONMENTAL_SENSING_SERVICE],
            services: vec![MockService {
                uuid: uuids::ENVIRONMENTAL_SENSING_SERVICE,
                characteristics: Role::ALL.iter().map(|role| role.characteristic()).collect(),
            }],
            values,
            connect_latency: Duration::ZERO,
            discovery_latency: Duration::ZERO,
            read_latency: Duration::ZERO,
        }
    }
}

impl MockPeripheralBuilder {
    /// Create a builder with one sensing service exposing every role.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the peripheral id. Random if unset.
    #[must_use]
    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Set the peripheral address. Random if unset.
    #[must_use]
    pub fn address(mut self, address: &str) -> Self {
        self.address = Some(address.to_string());
        self
    }

    /// Set the advertised local name.
    #[must_use]
    pub fn local_name(mut self, name: &str) -> Self {
        self.local_name = Some(name.to_string());
        self
    }

    /// Set the advertised signal strength.
    #[must_use]
    pub fn rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }

    /// Set the service UUIDs carried in advertisements.
    #[must_use]
    pub fn advertised_services(mut self, services: &[Uuid]) -> Self {
        self.advertised = services.to_vec();
        self
    }

    /// Remove every GATT service.
    #[must_use]
    pub fn no_services(mut self) -> Self {
        self.services.clear();
        self
    }

    /// Add a GATT service with the given characteristics.
    #[must_use]
    pub fn service(mut self, uuid: Uuid, characteristics: &[Uuid]) -> Self {
        self.services.push(MockService {
            uuid,
            characteristics: characteristics.to_vec(),
        });
        self
    }

    /// Set the value reported for `role`.
    #[must_use]
    pub fn value(self, role: Role, value: f64) -> Self {
        self.raw_value(role, encode(value))
    }

    /// Set the raw payload reported for `role`.
    #[must_use]
    pub fn raw_value(mut self, role: Role, payload: Vec<u8>) -> Self {
        self.values.insert(role.characteristic(), payload);
        self
    }

    /// Report an empty payload for `role`.
    #[must_use]
    pub fn empty_value(self, role: Role) -> Self {
        self.raw_value(role, Vec::new())
    }

    /// Delay every connect.
    #[must_use]
    pub fn connect_latency(mut self, latency: Duration) -> Self {
        self.connect_latency = latency;
        self
    }

    /// Delay every service discovery.
    #[must_use]
    pub fn discovery_latency(mut self, latency: Duration) -> Self {
        self.discovery_latency = latency;
        self
    }

    /// Delay every read.
    #[must_use]
    pub fn read_latency(mut self, latency: Duration) -> Self {
        self.read_latency = latency;
        self
    }

    /// Build the mock peripheral.
    #[must_use]
    pub fn build(self) -> MockPeripheral {
        let seed = rand::random::<u32>();
        let [a, b, c, d] = seed.to_be_bytes();
        let (disconnects, _) = broadcast::channel(DISCONNECT_CAPACITY);

        MockPeripheral {
            id: self
                .id
                .unwrap_or_else(|| format!("MOCK-{:06X}", seed % 0xFF_FFFF)),
            address: self
                .address
                .unwrap_or_else(|| format!("02:00:{a:02X}:{b:02X}:{c:02X}:{d:02X}")),
            local_name: self.local_name,
            rssi: self.rssi,
            advertised: self.advertised,
            services: self.services,
            values: RwLock::new(self.values),
            connected: AtomicBool::new(false),
            disconnects,
            connect_count: AtomicU32::new(0),
            disconnect_count: AtomicU32::new(0),
            read_count: AtomicU32::new(0),
            connect_failure: RwLock::new(None),
            read_failure: RwLock::new(None),
            connect_latency_ms: AtomicU64::new(duration_ms(self.connect_latency)),
            discovery_latency_ms: AtomicU64::new(duration_ms(self.discovery_latency)),
            read_latency_ms: AtomicU64::new(duration_ms(self.read_latency)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let mock = MockPeripheral::builder().build();
        assert!(mock.id().starts_with("MOCK-"));
        assert_eq!(mock.address().len(), 17);
        assert!(!mock.is_connected_sync());
        assert_eq!(mock.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_operations_require_connection() {
        let mock = MockPeripheral::builder().build();
        let err = mock.discover_services(&[]).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));

        mock.connect().await.unwrap();
        let services = mock.discover_services(&[]).await.unwrap();
        assert_eq!(services.len(), 1);
    }

    #[tokio::test]
    async fn test_default_values_decode() {
        let mock = MockPeripheral::builder().build();
        mock.connect().await.unwrap();

        let characteristic = Characteristic {
            uuid: uuids::TEMPERATURE,
            service_uuid: uuids::ENVIRONMENTAL_SENSING_SERVICE,
        };
        let payload = mock.read(&characteristic).await.unwrap();
        assert_eq!(codec::decode(&payload), Some(22.5));

        mock.set_value(Role::Temperature, 30.25);
        let payload = mock.read(&characteristic).await.unwrap();
        assert_eq!(codec::decode(&payload), Some(30.25));
        assert_eq!(mock.read_count(), 2);
    }

    #[tokio::test]
    async fn test_characteristic_filter() {
        let mock = MockPeripheral::builder().build();
        mock.connect().await.unwrap();
        let service = Service {
            uuid: uuids::ENVIRONMENTAL_SENSING_SERVICE,
        };

        let all = mock.discover_characteristics(&service, &[]).await.unwrap();
        assert_eq!(all.len(), 3);

        let filtered = mock
            .discover_characteristics(&service, &[uuids::HUMIDITY])
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].uuid, uuids::HUMIDITY);
    }

    #[tokio::test]
    async fn test_disconnect_notifies_only_when_connected() {
        let mock = MockPeripheral::builder().build();
        let mut events = mock.disconnects();

        mock.disconnect().await.unwrap();
        assert!(events.try_recv().is_err());

        mock.connect().await.unwrap();
        mock.disconnect().await.unwrap();
        assert!(events.try_recv().is_ok());
        assert_eq!(mock.disconnect_count(), 2);
    }

    #[tokio::test]
    async fn test_scan_advertises_matching_peripherals() {
        let transport = MockTransport::powered_on();
        transport.add_peripheral(MockPeripheral::builder().id("sensing").build());
        transport.add_peripheral(
            MockPeripheral::builder()
                .id("other")
                .advertised_services(&[uuids::from_short(0x180F)])
                .build(),
        );

        let mut advertisements = transport.advertisements();
        transport
            .start_scan(&[uuids::ENVIRONMENTAL_SENSING_SERVICE])
            .await
            .unwrap();

        let ad = advertisements.try_recv().unwrap();
        assert_eq!(ad.id, "sensing");
        assert!(advertisements.try_recv().is_err());
        assert!(transport.is_scanning());

        transport.stop_scan().await.unwrap();
        assert!(!transport.is_scanning());
        assert_eq!(transport.scan_count(), 1);
        assert_eq!(transport.stop_count(), 1);
    }
}
