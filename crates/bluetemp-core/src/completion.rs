//! Single-assignment outcome cells.
//!
//! A [`Completion`] is written at most once: the first call to
//! [`settle`](Completion::settle) wins and every later call is ignored. Any
//! number of [`Waiter`]s observe the same outcome, including waiters created
//! after it was written.
//!
//! # Example
//!
//! ```
//! use bluetemp_core::completion::Completion;
//! use bluetemp_core::Error;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let cell = Completion::new();
//! let waiter = cell.waiter();
//!
//! assert!(cell.settle(Ok(21.5)));
//! assert!(!cell.settle(Err(Error::UnsolicitedDisconnect)));
//! assert_eq!(waiter.wait().await.unwrap(), 21.5);
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{Error, Result};

type Outcome<T> = Option<Result<T>>;

/// A first-writer-wins outcome cell.
///
/// Cloning yields another handle to the same cell.
pub struct Completion<T> {
    tx: Arc<watch::Sender<Outcome<T>>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Completion<T> {
    /// Create an unsettled cell.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Write the outcome if none has been written yet.
    ///
    /// Returns `true` if this call decided the outcome.
    pub fn settle(&self, outcome: Result<T>) -> bool {
        let mut outcome = Some(outcome);
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = outcome.take();
            true
        })
    }

    /// Whether an outcome has been written.
    pub fn is_settled(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Create a waiter for this cell.
    pub fn waiter(&self) -> Waiter<T> {
        Waiter {
            rx: self.tx.subscribe(),
        }
    }

    /// Resolve once an outcome has been written, whichever it is.
    pub async fn settled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot close early.
        let _ = rx.wait_for(Option::is_some).await;
    }
}

impl<T: Clone> Completion<T> {
    /// The outcome, if written.
    pub fn peek(&self) -> Option<Result<T>> {
        self.tx.borrow().clone()
    }
}

/// Read side of a [`Completion`].
pub struct Waiter<T> {
    rx: watch::Receiver<Outcome<T>>,
}

impl<T> Clone for Waiter<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<T: Clone> Waiter<T> {
    /// Wait for the outcome.
    ///
    /// Resolves to [`Error::Cancelled`] if every writer is dropped without
    /// settling the cell.
    pub async fn wait(mut self) -> Result<T> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone().unwrap_or(Err(Error::Cancelled)),
            Err(_) => Err(Error::Cancelled),
        }
    }

    /// The outcome, if written.
    pub fn peek(&self) -> Option<Result<T>> {
        self.rx.borrow().clone()
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("settled", &self.is_settled())
            .finish()
    }
}

impl<T> std::fmt::Debug for Waiter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter")
            .field("settled", &self.rx.borrow().is_some())
            .finish()
    }
}
