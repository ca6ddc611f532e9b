//! Handles to discovered peripherals.
//!
//! A [`PeripheralHandle`] wraps one transport peripheral and tracks its
//! [`LinkState`]. Creating the handle registers for the peripheral's
//! disconnect notifications, and every connect attempt registers afresh so
//! notifications about an earlier link are never attributed to a new one.
//! The subscription lives exactly as long as the last clone of the handle.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::events::LinkState;
use crate::traits::Peripheral;

struct Inner {
    peripheral: Arc<dyn Peripheral>,
    link: Arc<watch::Sender<LinkState>>,
    monitor: Mutex<AbortOnDropHandle<()>>,
}

/// A shared handle to a discovered peripheral.
///
/// Cloning is cheap and every clone observes the same link state.
#[derive(Clone)]
pub struct PeripheralHandle {
    inner: Arc<Inner>,
}

impl PeripheralHandle {
    /// Wrap a peripheral and start watching for link loss.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(peripheral: Arc<dyn Peripheral>) -> Self {
        let link = Arc::new(watch::Sender::new(LinkState::Discovered));
        let monitor = spawn_monitor(&peripheral, &link);

        Self {
            inner: Arc::new(Inner {
                peripheral,
                link,
                monitor: Mutex::new(monitor),
            }),
        }
    }

    /// Platform identifier of the peripheral.
    pub fn id(&self) -> &str {
        self.inner.peripheral.id()
    }

    /// Bluetooth address of the peripheral.
    pub fn address(&self) -> &str {
        self.inner.peripheral.address()
    }

    /// The underlying transport peripheral.
    pub fn peripheral(&self) -> &Arc<dyn Peripheral> {
        &self.inner.peripheral
    }

    /// Current link state.
    pub fn link_state(&self) -> LinkState {
        *self.inner.link.borrow()
    }

    /// Subscribe to link state changes.
    pub fn subscribe_link(&self) -> watch::Receiver<LinkState> {
        self.inner.link.subscribe()
    }

    /// Mark a connect attempt as started.
    ///
    /// From here on a disconnect notification fails the attempt.
    pub(crate) fn mark_connecting(&self) {
        self.inner.link.send_replace(LinkState::Connecting);
        let monitor = spawn_monitor(&self.inner.peripheral, &self.inner.link);
        // Replacing the old monitor aborts it along with its backlog.
        *self
            .inner
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = monitor;
    }

    /// Establish the link.
    pub async fn connect(&self) -> Result<()> {
        self.inner
            .peripheral
            .connect()
            .await
            .map_err(|e| Error::transport("connect", e))?;
        self.inner.link.send_if_modified(|state| {
            if matches!(state, LinkState::Connecting | LinkState::Discovered) {
                *state = LinkState::Connected;
                true
            } else {
                false
            }
        });
        Ok(())
    }

    /// Tear the link down.
    ///
    /// The handle is marked disconnected even if the transport reports an
    /// error, since the link is unusable either way.
    pub async fn disconnect(&self) -> Result<()> {
        let result = self.inner.peripheral.disconnect().await;
        self.inner.link.send_replace(LinkState::Disconnected);
        result.map_err(|e| Error::transport("disconnect", e))
    }
}

impl fmt::Debug for PeripheralHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeripheralHandle")
            .field("id", &self.id())
            .field("address", &self.address())
            .field("link", &self.link_state())
            .finish()
    }
}

/// Resolve once the link reports [`LinkState::Disconnected`].
pub(crate) async fn disconnected(link: &mut watch::Receiver<LinkState>) {
    // The sender lives in the handle the caller holds, so an error here
    // cannot happen while the handle is alive.
    let _ = link.wait_for(|state| *state == LinkState::Disconnected).await;
}

fn spawn_monitor(
    peripheral: &Arc<dyn Peripheral>,
    link: &Arc<watch::Sender<LinkState>>,
) -> AbortOnDropHandle<()> {
    // Subscribe here rather than in the task so nothing sent after this
    // call is missed.
    let events = peripheral.disconnects();
    AbortOnDropHandle::new(tokio::spawn(watch_disconnects(
        Arc::clone(peripheral),
        Arc::clone(link),
        events,
    )))
}

async fn watch_disconnects(
    peripheral: Arc<dyn Peripheral>,
    link: Arc<watch::Sender<LinkState>>,
    mut events: broadcast::Receiver<()>,
) {
    loop {
        match events.recv().await {
            Ok(()) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => break,
        }

        let state = *link.borrow();
        match state {
            LinkState::Connecting => {}
            // The transport may repeat a notification for a link that is
            // already back up.
            LinkState::Connected => {
                if peripheral.is_connected().await.unwrap_or(false) {
                    debug!(peripheral = %peripheral.id(), "Ignoring stale disconnect");
                    continue;
                }
            }
            LinkState::Discovered | LinkState::Disconnected => {
                debug!(peripheral = %peripheral.id(), "Ignoring disconnect for inactive link");
                continue;
            }
        }

        let updated = link.send_if_modified(|state| {
            if matches!(state, LinkState::Connecting | LinkState::Connected) {
                *state = LinkState::Disconnected;
                true
            } else {
                false
            }
        });
        if updated {
            info!(peripheral = %peripheral.id(), "Peripheral disconnected");
        }
    }
}
