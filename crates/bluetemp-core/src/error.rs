//! Error types for bluetemp-core.
//!
//! Every pending operation settles exactly once and hands the same outcome to
//! each of its waiters, so [`Error`] is `Clone`. Transport failures that are
//! not `Clone` themselves are shared behind an [`Arc`].
//!
//! # Failure sources
//!
//! | Error | Raised by | Retried |
//! |-------|-----------|---------|
//! | [`Error::RadioUnavailable`] | discovery | no |
//! | [`Error::ScanTimeout`] | discovery deadline | no |
//! | [`Error::ConnectionTimeout`] | connection deadline | no |
//! | [`Error::Transport`] | any transport call | no |
//! | [`Error::NoServicesFound`] | connection | no |
//! | [`Error::NoCharacteristicsFound`] | connection | no |
//! | [`Error::UnsolicitedDisconnect`] | connection, read | no |
//! | [`Error::UnreadableResponse`] | read | no |
//!
//! Nothing in this crate retries. Callers that want retries wrap the
//! session operations themselves.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use bluetemp_types::Role;

/// Errors that can occur while discovering, connecting to or reading a peripheral.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum Error {
    /// The radio reported a state other than powered on.
    #[error("Powered off")]
    RadioUnavailable,

    /// No matching advertisement arrived before the scan deadline.
    #[error("Scanning timed out after {}ms", .duration.as_millis())]
    ScanTimeout {
        /// The scan deadline.
        duration: Duration,
    },

    /// Connection setup did not complete before the connection deadline.
    #[error("Connection to peripheral {peripheral} timed out after {}ms", .duration.as_millis())]
    ConnectionTimeout {
        /// Identifier of the peripheral.
        peripheral: String,
        /// The connection deadline.
        duration: Duration,
    },

    /// A transport call failed.
    #[error("Transport error during {operation}: {source}")]
    Transport {
        /// The transport operation that failed.
        operation: &'static str,
        /// The underlying failure.
        source: Arc<TransportError>,
    },

    /// Service enumeration returned nothing.
    #[error("No services found")]
    NoServicesFound,

    /// A characteristic enumeration returned nothing.
    #[error("No characteristics found")]
    NoCharacteristicsFound,

    /// Enumeration finished without a handle for a required role.
    #[error("Characteristic for {role} not found")]
    CharacteristicUnavailable {
        /// The role with no characteristic.
        role: Role,
    },

    /// The link dropped while an operation was still in flight.
    #[error("Disconnected")]
    UnsolicitedDisconnect,

    /// A read returned an empty payload.
    #[error("Unreadable response")]
    UnreadableResponse {
        /// The role that was being read.
        role: Role,
    },

    /// The task driving an operation ended without settling it.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failures reported by a [`Transport`](crate::traits::Transport) or
/// [`Peripheral`](crate::traits::Peripheral) implementation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// No Bluetooth adapter available.
    #[error("No Bluetooth adapter available")]
    NoAdapter,

    /// The transport's event stream ended.
    #[error("Event stream closed")]
    Closed,

    /// Operation attempted while not connected.
    #[error("Not connected to peripheral")]
    NotConnected,

    /// The characteristic is not known to the peripheral.
    #[error("Characteristic not found: {0}")]
    UnknownCharacteristic(uuid::Uuid),

    /// Other transport failure.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap a transport failure with the operation that produced it.
    pub fn transport(operation: &'static str, source: impl Into<TransportError>) -> Self {
        Self::Transport {
            operation,
            source: Arc::new(source.into()),
        }
    }

    /// Create a scan timeout error.
    pub fn scan_timeout(duration: Duration) -> Self {
        Self::ScanTimeout { duration }
    }

    /// Create a connection timeout error.
    pub fn connection_timeout(peripheral: impl Into<String>, duration: Duration) -> Self {
        Self::ConnectionTimeout {
            peripheral: peripheral.into(),
            duration,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether this error came from a deadline expiring.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ScanTimeout { .. } | Self::ConnectionTimeout { .. })
    }
}

/// Result type alias using bluetemp-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for transport implementations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;
