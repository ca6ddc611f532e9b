//! btleplug-backed transport.
//!
//! [`PlatformTransport`] wraps the first Bluetooth adapter of the host. A
//! background task pumps the adapter's central events into the channels the
//! [`Transport`] trait exposes: radio state updates, advertisements for
//! discovered or updated peripherals, and per-peripheral disconnects.
//!
//! | Platform | BLE Stack | Peripheral ID | Address |
//! |----------|-----------|---------------|---------|
//! | macOS | CoreBluetooth | UUID | always `00:00:00:00:00:00` |
//! | Linux | BlueZ | D-Bus path | MAC address |
//! | Windows | WinRT | MAC address | MAC address |

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CentralState, Manager as _, Peripheral as _, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral as BtlePeripheral, PeripheralId};
use futures::stream::{Stream, StreamExt};
use tokio::sync::{broadcast, watch};
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::{Error, Result, TransportError, TransportResult};
use crate::events::{Advertisement, RadioState};
use crate::traits::{Characteristic, Peripheral, Service, Transport};
use crate::util::format_peripheral_id;

const ADVERTISEMENT_CAPACITY: usize = 64;
const DISCONNECT_CAPACITY: usize = 16;

type Links = Arc<Mutex<HashMap<PeripheralId, broadcast::Sender<()>>>>;
type Events = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new()
        .await
        .map_err(|e| Error::transport("open manager", e))?;
    let adapters = manager
        .adapters()
        .await
        .map_err(|e| Error::transport("list adapters", e))?;

    adapters
        .into_iter()
        .next()
        .ok_or_else(|| Error::transport("list adapters", TransportError::NoAdapter))
}

impl From<CentralState> for RadioState {
    fn from(state: CentralState) -> Self {
        match state {
            CentralState::PoweredOn => RadioState::PoweredOn,
            CentralState::PoweredOff => RadioState::PoweredOff,
            _ => RadioState::Unknown,
        }
    }
}

/// A [`Transport`] over the host's Bluetooth adapter.
pub struct PlatformTransport {
    adapter: Adapter,
    radio: Arc<watch::Sender<RadioState>>,
    advertisements: broadcast::Sender<Advertisement>,
    _pump: AbortOnDropHandle<()>,
}

impl PlatformTransport {
    /// Open the first Bluetooth adapter.
    pub async fn new() -> Result<Self> {
        Self::with_adapter(get_adapter().await?).await
    }

    /// Wrap an adapter that is already open.
    pub async fn with_adapter(adapter: Adapter) -> Result<Self> {
        let events = adapter
            .events()
            .await
            .map_err(|e| Error::transport("subscribe to adapter events", e))?;

        // Adapters that cannot report their state are assumed to be on;
        // a scan will fail on its own if they are not.
        let state = match adapter.adapter_state().await {
            Ok(state) => RadioState::from(state),
            Err(e) => {
                debug!(error = %e, "Adapter state unavailable, assuming powered on");
                RadioState::PoweredOn
            }
        };
        debug!(%state, "Adapter opened");

        let radio = Arc::new(watch::Sender::new(state));
        let (advertisements, _) = broadcast::channel(ADVERTISEMENT_CAPACITY);
        let links: Links = Arc::new(Mutex::new(HashMap::new()));

        let pump = tokio::spawn(pump_events(
            adapter.clone(),
            events,
            Arc::clone(&radio),
            advertisements.clone(),
            links,
        ));

        Ok(Self {
            adapter,
            radio,
            advertisements,
            _pump: AbortOnDropHandle::new(pump),
        })
    }

    /// The wrapped adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }
}

impl std::fmt::Debug for PlatformTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformTransport")
            .field("radio", &*self.radio.borrow())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for PlatformTransport {
    fn radio_state(&self) -> watch::Receiver<RadioState> {
        self.radio.subscribe()
    }

    fn advertisements(&self) -> broadcast::Receiver<Advertisement> {
        self.advertisements.subscribe()
    }

    async fn start_scan(&self, services: &[Uuid]) -> TransportResult<()> {
        self.adapter
            .start_scan(ScanFilter {
                services: services.to_vec(),
            })
            .await?;
        Ok(())
    }

    async fn stop_scan(&self) -> TransportResult<()> {
        self.adapter.stop_scan().await?;
        Ok(())
    }
}

async fn pump_events(
    adapter: Adapter,
    mut events: Events,
    radio: Arc<watch::Sender<RadioState>>,
    advertisements: broadcast::Sender<Advertisement>,
    links: Links,
) {
    while let Some(event) = events.next().await {
        match event {
            CentralEvent::StateUpdate(state) => {
                let state = RadioState::from(state);
                debug!(%state, "Radio state changed");
                radio.send_replace(state);
            }
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                // Nobody is scanning.
                if advertisements.receiver_count() == 0 {
                    continue;
                }
                match advertisement(&adapter, &id, &links).await {
                    Ok(Some(advertisement)) => {
                        let _ = advertisements.send(advertisement);
                    }
                    Ok(None) => trace!(id = ?id, "Peripheral has no properties yet"),
                    Err(e) => debug!(id = ?id, error = %e, "Failed to inspect peripheral"),
                }
            }
            CentralEvent::DeviceDisconnected(id) => {
                let sender = links
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(&id)
                    .cloned();
                if let Some(sender) = sender {
                    let _ = sender.send(());
                }
            }
            _ => {}
        }
    }
    warn!("Adapter event stream ended");
}

async fn advertisement(
    adapter: &Adapter,
    id: &PeripheralId,
    links: &Links,
) -> TransportResult<Option<Advertisement>> {
    let peripheral = adapter.peripheral(id).await?;
    let Some(properties) = peripheral.properties().await? else {
        return Ok(None);
    };

    let disconnects = links
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(id.clone())
        .or_insert_with(|| broadcast::channel(DISCONNECT_CAPACITY).0)
        .clone();

    let platform = PlatformPeripheral {
        id: format_peripheral_id(id),
        address: properties.address.to_string(),
        peripheral,
        disconnects,
    };
    Ok(Some(Advertisement {
        id: platform.id.clone(),
        address: platform.address.clone(),
        local_name: properties.local_name,
        rssi: properties.rssi,
        peripheral: Arc::new(platform),
    }))
}

/// A btleplug peripheral behind the [`Peripheral`] trait.
pub struct PlatformPeripheral {
    peripheral: BtlePeripheral,
    id: String,
    address: String,
    disconnects: broadcast::Sender<()>,
}

impl std::fmt::Debug for PlatformPeripheral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformPeripheral")
            .field("id", &self.id)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Peripheral for PlatformPeripheral {
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
        self.peripheral.connect().await?;
        Ok(())
    }

    async fn disconnect(&self) -> TransportResult<()> {
        if !self.peripheral.is_connected().await? {
            return Ok(());
        }
        self.peripheral.disconnect().await?;
        Ok(())
    }

    async fn is_connected(&self) -> TransportResult<bool> {
        Ok(self.peripheral.is_connected().await?)
    }

    async fn discover_services(&self, filter: &[Uuid]) -> TransportResult<Vec<Service>> {
        self.peripheral.discover_services().await?;
        Ok(self
            .peripheral
            .services()
            .into_iter()
            .filter(|s| filter.is_empty() || filter.contains(&s.uuid))
            .map(|s| Service { uuid: s.uuid })
            .collect())
    }

    async fn discover_characteristics(
        &self,
        service: &Service,
        filter: &[Uuid],
    ) -> TransportResult<Vec<Characteristic>> {
        Ok(self
            .peripheral
            .services()
            .into_iter()
            .filter(|s| s.uuid == service.uuid)
            .flat_map(|s| s.characteristics)
            .filter(|c| filter.is_empty() || filter.contains(&c.uuid))
            .map(|c| Characteristic {
                uuid: c.uuid,
                service_uuid: c.service_uuid,
            })
            .collect())
    }

    async fn read(&self, characteristic: &Characteristic) -> TransportResult<Vec<u8>> {
        let target = self
            .peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic.uuid && c.service_uuid == characteristic.service_uuid)
            .ok_or(TransportError::UnknownCharacteristic(characteristic.uuid))?;
        Ok(self.peripheral.read(&target).await?)
    }
}
