//! One-shot deadlines bound to pending operations.
//!
//! A [`Deadline`] runs its expiry action once, after the armed duration,
//! unless it is disarmed first. Dropping a deadline disarms it, so a timer
//! never outlives the operation that armed it.
//!
//! # Example
//!
//! ```ignore
//! use bluetemp_core::guard::Deadline;
//! use bluetemp_core::Error;
//!
//! let expiring = pending.clone();
//! let mut deadline = Deadline::arm(timeout, async move {
//!     expiring.settle(Err(Error::scan_timeout(timeout)));
//! });
//!
//! // ... on success, before awaiting anything else:
//! deadline.disarm();
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Default time allowed for discovery to see the peripheral.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default time allowed for connection setup.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_millis(5_000);

/// An armed one-shot timer.
#[derive(Debug)]
pub struct Deadline {
    duration: Duration,
    fired: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl Deadline {
    /// Arm a timer that runs `on_expire` after `duration`.
    ///
    /// Must be called within a tokio runtime.
    pub fn arm<F>(duration: Duration, on_expire: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let task = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            flag.store(true, Ordering::SeqCst);
            on_expire.await;
        });

        Self {
            duration,
            fired,
            task: Some(task),
        }
    }

    /// Stop the timer.
    ///
    /// Returns `true` if this call prevented the expiry action. Calling it
    /// again, or after the timer fired, does nothing.
    pub fn disarm(&mut self) -> bool {
        match self.task.take() {
            Some(task) if !self.has_fired() => {
                task.abort();
                true
            }
            _ => false,
        }
    }

    /// Whether the expiry action has started.
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Whether the timer can still fire.
    pub fn is_armed(&self) -> bool {
        self.task.is_some() && !self.has_fired()
    }

    /// The armed duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.disarm();
    }
}
