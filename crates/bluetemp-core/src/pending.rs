//! Memoized in-flight operations.
//!
//! A [`PendingSlot`] holds at most one outstanding operation of a kind.
//! Callers that arrive while it is in flight join it instead of starting a
//! second one. The slot clears itself in the same critical section that
//! records a failure, so the next caller starts fresh. A success stays in
//! the slot until [`reset`](PendingSlot::reset) or
//! [`cancel`](PendingSlot::cancel).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::completion::{Completion, Waiter};
use crate::error::{Error, Result};

struct Entry<T> {
    generation: u64,
    completion: Completion<T>,
    waiter: Waiter<T>,
}

/// What a slot currently holds.
#[derive(Debug)]
pub enum SlotState<T> {
    /// Nothing started, or the last attempt failed.
    Idle,
    /// An operation is running.
    InFlight(Waiter<T>),
    /// The last operation succeeded.
    Resolved(T),
}

/// A memoization slot for one kind of operation.
pub struct PendingSlot<T> {
    kind: &'static str,
    entry: Mutex<Option<Entry<T>>>,
    generations: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> PendingSlot<T> {
    /// Create an empty slot. `kind` names the operation in logs.
    pub fn new(kind: &'static str) -> Arc<Self> {
        Arc::new(Self {
            kind,
            entry: Mutex::new(None),
            generations: AtomicU64::new(0),
        })
    }

    /// Join the operation in the slot, or start one with `start`.
    ///
    /// `start` runs only when the slot is empty and receives the [`Pending`]
    /// handle it must settle. It should spawn the work rather than run it,
    /// so a caller dropping the returned waiter never cancels a shared
    /// operation.
    pub fn join_or_start<F>(self: &Arc<Self>, start: F) -> Waiter<T>
    where
        F: FnOnce(Pending<T>),
    {
        let mut entry = self.lock();
        if let Some(existing) = entry.as_ref() {
            debug!(kind = self.kind, "Joining in-flight operation");
            return existing.waiter.clone();
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let completion = Completion::new();
        let waiter = completion.waiter();
        *entry = Some(Entry {
            generation,
            completion: completion.clone(),
            waiter: waiter.clone(),
        });
        drop(entry);

        debug!(kind = self.kind, generation, "Starting operation");
        start(Pending {
            inner: Arc::new(PendingInner {
                slot: Arc::clone(self),
                generation,
                completion,
            }),
        });
        waiter
    }

    /// Report what the slot holds.
    pub fn state(&self) -> SlotState<T> {
        let entry = self.lock();
        match entry.as_ref() {
            None => SlotState::Idle,
            Some(entry) => match entry.waiter.peek() {
                None => SlotState::InFlight(entry.waiter.clone()),
                Some(Ok(value)) => SlotState::Resolved(value),
                // Failures clear the slot when they are recorded.
                Some(Err(_)) => SlotState::Idle,
            },
        }
    }

    /// Forget whatever the slot holds.
    ///
    /// An operation still running keeps going and its waiters still get its
    /// outcome, but new callers start a fresh one.
    pub fn reset(&self) -> bool {
        let cleared = self.lock().take().is_some();
        if cleared {
            debug!(kind = self.kind, "Slot reset");
        }
        cleared
    }

    /// Forget whatever the slot holds and fail an operation still running.
    ///
    /// Waiters and the driver of a running operation observe
    /// [`Error::Cancelled`]; a driver that finishes afterwards cannot
    /// overwrite it. A kept success is simply dropped.
    pub fn cancel(&self) -> bool {
        let mut entry = self.lock();
        let Some(taken) = entry.take() else {
            return false;
        };
        // Settled under the lock so a concurrent settle cannot slip in.
        if taken.completion.settle(Err(Error::Cancelled)) {
            debug!(kind = self.kind, generation = taken.generation, "Operation cancelled");
        } else {
            debug!(kind = self.kind, "Slot reset");
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, Option<Entry<T>>> {
        self.entry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct PendingInner<T: Clone + Send + Sync + 'static> {
    slot: Arc<PendingSlot<T>>,
    generation: u64,
    completion: Completion<T>,
}

impl<T: Clone + Send + Sync + 'static> PendingInner<T> {
    fn settle(&self, outcome: Result<T>) -> bool {
        let mut entry = self.slot.lock();
        let failed = outcome.is_err();
        let applied = self.completion.settle(outcome);
        if applied && failed && entry.as_ref().is_some_and(|e| e.generation == self.generation) {
            *entry = None;
            debug!(kind = self.slot.kind, generation = self.generation, "Slot cleared after failure");
        }
        applied
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for PendingInner<T> {
    fn drop(&mut self) {
        // Every handle is gone: nobody is left to settle the operation.
        if !self.completion.is_settled() {
            self.settle(Err(Error::Cancelled));
        }
    }
}

/// Write side of an operation started through a [`PendingSlot`].
///
/// Cloning yields another handle to the same operation. If every handle is
/// dropped before the operation settles, it fails with [`Error::Cancelled`].
pub struct Pending<T: Clone + Send + Sync + 'static> {
    inner: Arc<PendingInner<T>>,
}

impl<T: Clone + Send + Sync + 'static> Clone for Pending<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Pending<T> {
    /// Record the outcome if none has been recorded yet.
    ///
    /// A failure also clears the slot. Returns `true` if this call decided
    /// the outcome.
    pub fn settle(&self, outcome: Result<T>) -> bool {
        self.inner.settle(outcome)
    }

    /// Whether the outcome has been recorded.
    pub fn is_settled(&self) -> bool {
        self.inner.completion.is_settled()
    }

    /// The recorded outcome, if any.
    pub fn outcome(&self) -> Option<Result<T>> {
        self.inner.completion.peek()
    }

    /// Resolve once the outcome has been recorded by anyone.
    pub async fn settled(&self) {
        self.inner.completion.settled().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;

    fn counting_start(starts: Arc<AtomicU32>, outcome: Result<u32>) -> impl FnOnce(Pending<u32>) {
        move |pending| {
            starts.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                pending.settle(outcome);
            });
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_operation() {
        let slot = PendingSlot::new("test");
        let starts = Arc::new(AtomicU32::new(0));

        let waiters: Vec<_> = (0..5)
            .map(|_| slot.join_or_start(counting_start(Arc::clone(&starts), Ok(42))))
            .collect();

        for waiter in waiters {
            assert_eq!(waiter.wait().await.unwrap(), 42);
        }
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_is_retained() {
        let slot = PendingSlot::new("test");
        let starts = Arc::new(AtomicU32::new(0));

        let first = slot.join_or_start(counting_start(Arc::clone(&starts), Ok(1)));
        assert_eq!(first.wait().await.unwrap(), 1);
        assert!(matches!(slot.state(), SlotState::Resolved(1)));

        let second = slot.join_or_start(counting_start(Arc::clone(&starts), Ok(2)));
        assert_eq!(second.wait().await.unwrap(), 1);
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_clears_slot() {
        let slot = PendingSlot::new("test");
        let starts = Arc::new(AtomicU32::new(0));

        let first = slot.join_or_start(counting_start(Arc::clone(&starts), Err(Error::RadioUnavailable)));
        assert!(matches!(first.wait().await, Err(Error::RadioUnavailable)));
        assert!(matches!(slot.state(), SlotState::Idle));

        let second = slot.join_or_start(counting_start(Arc::clone(&starts), Ok(9)));
        assert_eq!(second.wait().await.unwrap(), 9);
        assert_eq!(starts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_in_flight_state() {
        let slot: Arc<PendingSlot<u32>> = PendingSlot::new("test");
        let (tx, rx) = tokio::sync::oneshot::channel::<Pending<u32>>();
        let waiter = slot.join_or_start(move |pending| {
            let _ = tx.send(pending);
        });

        assert!(matches!(slot.state(), SlotState::InFlight(_)));
        let pending = rx.await.unwrap();
        pending.settle(Ok(3));
        assert_eq!(waiter.wait().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_reset_starts_fresh() {
        let slot = PendingSlot::new("test");
        let starts = Arc::new(AtomicU32::new(0));

        slot.join_or_start(counting_start(Arc::clone(&starts), Ok(1)))
            .wait()
            .await
            .unwrap();
        assert!(slot.reset());
        assert!(!slot.reset());

        let value = slot
            .join_or_start(counting_start(Arc::clone(&starts), Ok(2)))
            .wait()
            .await
            .unwrap();
        assert_eq!(value, 2);
        assert_eq!(starts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stale_failure_does_not_clear_newer_entry() {
        let slot: Arc<PendingSlot<u32>> = PendingSlot::new("test");
        let mut stale = None;
        let _ = slot.join_or_start(|pending| stale = Some(pending));
        slot.reset();

        let mut fresh = None;
        let _ = slot.join_or_start(|pending| fresh = Some(pending));

        stale.unwrap().settle(Err(Error::NoServicesFound));
        assert!(matches!(slot.state(), SlotState::InFlight(_)));

        fresh.unwrap().settle(Ok(5));
        assert!(matches!(slot.state(), SlotState::Resolved(5)));
    }

    #[tokio::test]
    async fn test_dropped_operation_is_cancelled_and_cleared() {
        let slot: Arc<PendingSlot<u32>> = PendingSlot::new("test");
        let waiter = slot.join_or_start(drop);

        assert!(matches!(waiter.wait().await, Err(Error::Cancelled)));
        assert!(matches!(slot.state(), SlotState::Idle));
    }

    #[tokio::test]
    async fn test_cancel_fails_running_operation() {
        let slot: Arc<PendingSlot<u32>> = PendingSlot::new("test");
        let mut driver = None;
        let waiter = slot.join_or_start(|pending| driver = Some(pending));
        let driver = driver.unwrap();

        assert!(slot.cancel());
        assert!(matches!(slot.state(), SlotState::Idle));
        assert!(matches!(waiter.wait().await, Err(Error::Cancelled)));

        // The driver sees the cancellation and cannot overwrite it.
        assert!(matches!(driver.outcome(), Some(Err(Error::Cancelled))));
        assert!(!driver.settle(Ok(7)));
    }

    #[tokio::test]
    async fn test_cancel_drops_kept_success() {
        let slot = PendingSlot::new("test");
        let starts = Arc::new(AtomicU32::new(0));

        let waiter = slot.join_or_start(counting_start(Arc::clone(&starts), Ok(1)));
        assert_eq!(waiter.wait().await.unwrap(), 1);

        assert!(slot.cancel());
        assert!(!slot.cancel());
        assert!(matches!(slot.state(), SlotState::Idle));
    }
}
