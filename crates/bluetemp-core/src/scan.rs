//! Peripheral discovery.
//!
//! A [`DiscoverySession`] finds one peripheral by id or address. It waits
//! for the radio to report its state, scans filtered by the sensing service
//! and resolves with a [`PeripheralHandle`] the moment a matching
//! advertisement arrives.
//!
//! Concurrent callers share a single scan. A failed discovery is forgotten
//! so the next call scans again; a successful one is kept for the life of
//! the session.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bluetemp_core::platform::PlatformTransport;
//! use bluetemp_core::scan::{DiscoverySession, ScanOptions};
//!
//! # async fn example() -> bluetemp_core::Result<()> {
//! let transport = Arc::new(PlatformTransport::new().await?);
//! let discovery = DiscoverySession::new(transport, ScanOptions::new("A4:C1:38:F0:E9:D2"));
//! let peripheral = discovery.discover().await?;
//! println!("Found {}", peripheral.id());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use bluetemp_types::uuids;

use crate::error::{Error, Result, TransportError};
use crate::events::RadioState;
use crate::guard::{DEFAULT_SCAN_TIMEOUT, Deadline};
use crate::peripheral::PeripheralHandle;
use crate::pending::{Pending, PendingSlot, SlotState};
use crate::traits::Transport;

/// Options for discovering one peripheral.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Peripheral id or address to look for.
    pub target: String,
    /// Service UUID to filter the scan by.
    pub service: Uuid,
    /// How long to scan before giving up.
    pub timeout: Duration,
}

impl ScanOptions {
    /// Create scan options for `target` with default service and timeout.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            service: uuids::ENVIRONMENTAL_SENSING_SERVICE,
            timeout: DEFAULT_SCAN_TIMEOUT,
        }
    }

    /// Set the service UUID to scan for.
    #[must_use]
    pub fn service(mut self, service: Uuid) -> Self {
        self.service = service;
        self
    }

    /// Set the scan timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// De-duplicated discovery of a single peripheral.
pub struct DiscoverySession {
    transport: Arc<dyn Transport>,
    options: ScanOptions,
    slot: Arc<PendingSlot<PeripheralHandle>>,
}

impl DiscoverySession {
    /// Create a discovery session over `transport`.
    pub fn new(transport: Arc<dyn Transport>, options: ScanOptions) -> Self {
        Self {
            transport,
            options,
            slot: PendingSlot::new("discovery"),
        }
    }

    /// The options this session scans with.
    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Find the peripheral, joining a scan already in progress.
    ///
    /// # Errors
    ///
    /// - [`Error::RadioUnavailable`] if the radio is not powered on, or
    ///   leaves the powered-on state while scanning
    /// - [`Error::ScanTimeout`] if no matching advertisement arrives in time
    /// - [`Error::Transport`] if the scan cannot be started
    #[tracing::instrument(skip(self), fields(target = %self.options.target))]
    pub async fn discover(&self) -> Result<PeripheralHandle> {
        let waiter = self.slot.join_or_start(|pending| {
            tokio::spawn(run_discovery(
                Arc::clone(&self.transport),
                self.options.clone(),
                pending,
            ));
        });
        waiter.wait().await
    }

    /// Abandon a search in progress, or forget the peripheral found.
    ///
    /// Callers still waiting fail with [`Error::Cancelled`].
    pub fn cancel(&self) -> bool {
        self.slot.cancel()
    }

    /// The peripheral known to this session: resolved, still being
    /// searched for, or none.
    pub fn known(&self) -> SlotState<PeripheralHandle> {
        self.slot.state()
    }
}

async fn run_discovery(
    transport: Arc<dyn Transport>,
    options: ScanOptions,
    pending: Pending<PeripheralHandle>,
) {
    // Subscribe before scanning so no advertisement is missed.
    let mut radio = transport.radio_state();
    let mut advertisements = transport.advertisements();

    debug!("Waiting for radio");
    let state = tokio::select! {
        () = pending.settled() => {
            debug!("Discovery ended while waiting for radio");
            return;
        }
        state = radio.wait_for(|state| state.is_known()) => {
            state.map(|state| *state).unwrap_or(RadioState::Unknown)
        }
    };
    if state != RadioState::PoweredOn {
        warn!(%state, "Radio not available");
        pending.settle(Err(Error::RadioUnavailable));
        stop_scan(transport.as_ref()).await;
        return;
    }

    if let Err(e) = transport.start_scan(&[options.service]).await {
        pending.settle(Err(Error::transport("start scan", e)));
        return;
    }
    info!(
        service = %options.service,
        timeout_ms = options.timeout.as_millis() as u64,
        "Scanning"
    );

    let mut deadline = {
        let expiring = pending.clone();
        let timeout = options.timeout;
        Deadline::arm(timeout, async move {
            if expiring.settle(Err(Error::scan_timeout(timeout))) {
                warn!("Scanning timed out after {}ms", timeout.as_millis());
            }
        })
    };

    let found = loop {
        tokio::select! {
            () = pending.settled() => break None,
            changed = radio.changed() => {
                let state = match changed {
                    Ok(()) => *radio.borrow_and_update(),
                    Err(_) => RadioState::Unknown,
                };
                if state != RadioState::PoweredOn {
                    warn!(%state, "Radio lost while scanning");
                    break Some(Err(Error::RadioUnavailable));
                }
            }
            received = advertisements.recv() => match received {
                Ok(advertisement) if advertisement.matches(&options.target) => {
                    break Some(Ok(advertisement));
                }
                Ok(advertisement) => {
                    trace!(id = %advertisement.id, "Ignoring advertisement");
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Advertisement stream lagged");
                }
                Err(RecvError::Closed) => {
                    break Some(Err(Error::transport("scan", TransportError::Closed)));
                }
            },
        }
    };

    // Disarm before the next await so the deadline cannot race the outcome.
    deadline.disarm();
    stop_scan(transport.as_ref()).await;

    match found {
        Some(Ok(advertisement)) => {
            info!(
                id = %advertisement.id,
                address = %advertisement.address,
                name = ?advertisement.local_name,
                rssi = ?advertisement.rssi,
                "Peripheral found"
            );
            let handle = PeripheralHandle::new(advertisement.peripheral);
            pending.settle(Ok(handle));
        }
        Some(Err(e)) => {
            pending.settle(Err(e));
        }
        // Settled by the deadline.
        None => {}
    }
}

async fn stop_scan(transport: &dyn Transport) {
    if let Err(e) = transport.stop_scan().await {
        debug!(error = %e, "Failed to stop scanning");
    }
}
