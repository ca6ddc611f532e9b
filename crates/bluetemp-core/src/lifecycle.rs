//! Interrupt handling.
//!
//! On Ctrl-C the process should not leave a peripheral connected. A
//! [`Lifecycle`] knows which peripheral discovery found (or is still
//! looking for) and disconnects it on a best-effort basis. A connection
//! attempt still in flight is cancelled first so it cannot bring the link
//! back up afterwards.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::connection::ConnectionSession;
use crate::pending::SlotState;
use crate::scan::DiscoverySession;

/// How an interruptible operation ended.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The operation finished first.
    Completed(T),
    /// The interrupt arrived first. The peripheral has been disconnected
    /// if one was known.
    Interrupted,
}

impl<T> Outcome<T> {
    /// Whether the interrupt won.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Outcome::Interrupted)
    }
}

/// Best-effort teardown for an interrupted session.
#[derive(Clone)]
pub struct Lifecycle {
    discovery: Arc<DiscoverySession>,
    connection: Arc<ConnectionSession>,
}

impl Lifecycle {
    /// Create a lifecycle handle for a discovery and connection pair.
    pub fn new(discovery: Arc<DiscoverySession>, connection: Arc<ConnectionSession>) -> Self {
        Self {
            discovery,
            connection,
        }
    }

    /// Disconnect the known peripheral, if there is one.
    ///
    /// A discovery still in flight is waited for, at most for the scan
    /// timeout, and abandoned if it does not finish. Never fails; the
    /// return value says whether a disconnect was attempted.
    pub async fn disconnect_known(&self) -> bool {
        let limit = self.discovery.options().timeout;
        let peripheral = match self.discovery.known() {
            SlotState::Resolved(peripheral) => peripheral,
            SlotState::InFlight(waiter) => match tokio::time::timeout(limit, waiter.wait()).await {
                Ok(Ok(peripheral)) => peripheral,
                Ok(Err(e)) => {
                    info!(error = %e, "Cannot disconnect on interrupt, discovery failed");
                    return false;
                }
                Err(_) => {
                    self.discovery.cancel();
                    info!(
                        "Cannot disconnect on interrupt, discovery still running after {}ms",
                        limit.as_millis()
                    );
                    return false;
                }
            },
            SlotState::Idle => {
                info!("Cannot disconnect on interrupt, no peripheral known");
                return false;
            }
        };

        if self.connection.reset() {
            debug!("Connection attempt abandoned");
        }
        debug!(peripheral = %peripheral.id(), "Disconnecting on interrupt");
        if let Err(e) = peripheral.disconnect().await {
            warn!(error = %e, "Failed to disconnect on interrupt");
        }
        true
    }

    /// Run `operation` until it finishes or `signal` resolves.
    ///
    /// If the signal wins, the operation is dropped and the known
    /// peripheral is disconnected.
    pub async fn run_until<F, S>(&self, operation: F, signal: S) -> Outcome<F::Output>
    where
        F: Future,
        S: Future<Output = ()>,
    {
        tokio::select! {
            output = operation => Outcome::Completed(output),
            () = signal => {
                info!("Interrupted");
                self.disconnect_known().await;
                Outcome::Interrupted
            }
        }
    }

    /// Run `operation` until it finishes or Ctrl-C is pressed.
    pub async fn run_until_interrupt<F>(&self, operation: F) -> Outcome<F::Output>
    where
        F: Future,
    {
        self.run_until(operation, interrupt()).await
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("target", &self.discovery.options().target)
            .finish_non_exhaustive()
    }
}

/// Resolve when Ctrl-C is pressed.
///
/// Never resolves if the handler cannot be installed.
pub async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install interrupt handler");
        std::future::pending::<()>().await;
    }
}
