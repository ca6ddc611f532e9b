//! Session configuration.

use std::time::Duration;

use uuid::Uuid;

use bluetemp_types::{Role, uuids};

use crate::connection::ConnectOptions;
use crate::error::{Error, Result};
use crate::guard::{DEFAULT_CONNECTION_TIMEOUT, DEFAULT_SCAN_TIMEOUT};
use crate::scan::ScanOptions;

/// Everything a [`Session`](crate::session::Session) needs to find and
/// read one peripheral.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use bluetemp_core::SessionConfig;
///
/// let config = SessionConfig::new("A4:C1:38:F0:E9:D2")
///     .scan_timeout(Duration::from_secs(20));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Peripheral id or address.
    pub peripheral_id: String,
    /// Service UUID to scan for and enumerate.
    pub service: Uuid,
    /// Roles resolved on every connection.
    pub roles: Vec<Role>,
    /// Discovery deadline.
    pub scan_timeout: Duration,
    /// Connection setup deadline.
    pub connection_timeout: Duration,
}

impl SessionConfig {
    /// Create a configuration for `peripheral_id` with default settings.
    pub fn new(peripheral_id: impl Into<String>) -> Self {
        Self {
            peripheral_id: peripheral_id.into(),
            service: uuids::ENVIRONMENTAL_SENSING_SERVICE,
            roles: Role::ALL.to_vec(),
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }

    /// Set the service UUID.
    #[must_use]
    pub fn service(mut self, service: Uuid) -> Self {
        self.service = service;
        self
    }

    /// Set the roles resolved on every connection.
    #[must_use]
    pub fn roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    /// Set the discovery deadline.
    #[must_use]
    pub fn scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Set the connection setup deadline.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Check the configuration for values that can never work.
    pub fn validate(&self) -> Result<()> {
        if self.peripheral_id.trim().is_empty() {
            return Err(Error::invalid_config("peripheral id must not be empty"));
        }
        if self.scan_timeout.is_zero() {
            return Err(Error::invalid_config("scan timeout must be greater than zero"));
        }
        if self.connection_timeout.is_zero() {
            return Err(Error::invalid_config(
                "connection timeout must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Discovery options derived from this configuration.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions::new(self.peripheral_id.trim())
            .service(self.service)
            .timeout(self.scan_timeout)
    }

    /// Connection options derived from this configuration.
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions::new()
            .service(self.service)
            .timeout(self.connection_timeout)
    }
}
