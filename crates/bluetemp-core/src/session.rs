//! Read orchestration.
//!
//! A [`Session`] chains discovery, connection setup and characteristic
//! reads for one configured peripheral. Every read disconnects when it is
//! done, whether it succeeded or not. Reads that overlap share the link and
//! only the last one to finish tears it down.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bluetemp_core::{Session, SessionConfig};
//! use bluetemp_core::platform::PlatformTransport;
//!
//! # async fn example() -> bluetemp_core::Result<()> {
//! let transport = Arc::new(PlatformTransport::new().await?);
//! let session = Session::new(transport, SessionConfig::new("A4:C1:38:F0:E9:D2"))?;
//!
//! let climate = session.read_climate().await?;
//! println!("{:.2}°C {:.2}%", climate.temperature, climate.humidity);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use bluetemp_types::{Climate, Reading, Role};

use crate::config::SessionConfig;
use crate::connection::ConnectionSession;
use crate::error::{Error, Result};
use crate::lifecycle::Lifecycle;
use crate::peripheral::PeripheralHandle;
use crate::readings::read_all;
use crate::scan::DiscoverySession;
use crate::traits::Transport;

/// Discovery, connection and reads for one peripheral.
pub struct Session {
    config: SessionConfig,
    discovery: Arc<DiscoverySession>,
    connection: Arc<ConnectionSession>,
    holders: Arc<Mutex<usize>>,
}

impl Session {
    /// Create a session over `transport`.
    ///
    /// Nothing touches the radio until the first read.
    pub fn new(transport: Arc<dyn Transport>, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let discovery = Arc::new(DiscoverySession::new(transport, config.scan_options()));
        let connection = Arc::new(ConnectionSession::new(config.connect_options()));
        Ok(Self {
            config,
            discovery,
            connection,
            holders: Arc::new(Mutex::new(0)),
        })
    }

    /// The configuration this session was built from.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The discovery session shared by every read.
    pub fn discovery(&self) -> &Arc<DiscoverySession> {
        &self.discovery
    }

    /// A lifecycle handle for interrupt handling.
    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::new(Arc::clone(&self.discovery), Arc::clone(&self.connection))
    }

    /// Read the temperature in °C.
    pub async fn read_temperature(&self) -> Result<f64> {
        self.read_one(Role::Temperature).await
    }

    /// Read the relative humidity in %.
    pub async fn read_humidity(&self) -> Result<f64> {
        self.read_one(Role::Humidity).await
    }

    /// Read the battery level in %.
    pub async fn read_battery(&self) -> Result<f64> {
        self.read_one(Role::Battery).await
    }

    /// Read temperature and humidity together.
    pub async fn read_climate(&self) -> Result<Climate> {
        let readings = self.read_roles(&[Role::Humidity, Role::Temperature]).await?;
        Climate::from_readings(&readings).ok_or(Error::CharacteristicUnavailable {
            role: Role::Temperature,
        })
    }

    /// Read every role in `roles`, concurrently, over one connection.
    ///
    /// Readings come back in the order of `roles`.
    ///
    /// # Errors
    ///
    /// Discovery errors are returned before anything is connected. Any
    /// later failure is returned after the link has been released.
    #[tracing::instrument(skip(self), fields(peripheral = %self.config.peripheral_id))]
    pub async fn read_roles(&self, roles: &[Role]) -> Result<Vec<Reading>> {
        let peripheral = self.discovery.discover().await?;

        let lease = self.lease(peripheral.clone()).await;
        let result = self.connect_and_read(&peripheral, roles).await;
        lease.release().await;

        match &result {
            Ok(readings) => info!(count = readings.len(), "Read complete"),
            Err(e) => warn!(error = %e, "Read failed"),
        }
        result
    }

    async fn read_one(&self, role: Role) -> Result<f64> {
        let readings = self.read_roles(&[role]).await?;
        readings
            .first()
            .map(|reading| reading.value)
            .ok_or(Error::CharacteristicUnavailable { role })
    }

    async fn connect_and_read(
        &self,
        peripheral: &PeripheralHandle,
        roles: &[Role],
    ) -> Result<Vec<Reading>> {
        let mut needed = self.config.roles.clone();
        for role in roles {
            if !needed.contains(role) {
                needed.push(*role);
            }
        }

        let characteristics = self.connection.connect(peripheral, &needed).await?;
        // A joined connection may have been started for fewer roles.
        if let Some(role) = roles.iter().copied().find(|role| characteristics.get(*role).is_none()) {
            return Err(Error::CharacteristicUnavailable { role });
        }
        read_all(peripheral, &characteristics, roles).await
    }

    async fn lease(&self, peripheral: PeripheralHandle) -> Lease {
        let mut holders = self.holders.lock().await;
        *holders += 1;
        debug!(holders = *holders, "Link leased");
        Lease {
            teardown: Some(Teardown {
                peripheral,
                connection: Arc::clone(&self.connection),
                holders: Arc::clone(&self.holders),
            }),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// One read's claim on the link.
struct Lease {
    teardown: Option<Teardown>,
}

impl Lease {
    async fn release(mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown.run().await;
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        // The read was cancelled before it could release.
        if let Some(teardown) = self.teardown.take() {
            if let Ok(handle) = Handle::try_current() {
                handle.spawn(teardown.run());
            } else {
                warn!("No tokio runtime available to release the link");
            }
        }
    }
}

struct Teardown {
    peripheral: PeripheralHandle,
    connection: Arc<ConnectionSession>,
    holders: Arc<Mutex<usize>>,
}

impl Teardown {
    async fn run(self) {
        // Held across the disconnect so a new read waits for the teardown.
        let mut holders = self.holders.lock().await;
        *holders = holders.saturating_sub(1);
        if *holders > 0 {
            debug!(holders = *holders, "Link still in use");
            return;
        }

        self.connection.reset();
        debug!(peripheral = %self.peripheral.id(), "Disconnecting");
        if let Err(e) = self.peripheral.disconnect().await {
            warn!(error = %e, "Failed to disconnect");
        }
    }
}
