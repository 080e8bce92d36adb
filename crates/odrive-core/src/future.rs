//! Transfer futures
//!
//! A [`TransferFuture`] is the completion handle callers receive for every
//! asynchronous operation in the SDK. It is an explicit state + listener-list
//! type guarded by one mutex, deliberately not a wrapper around any runtime's
//! future type, so the settlement contract does not depend on a particular
//! executor.
//!
//! Contract:
//! - a future settles exactly once; a second settlement attempt is rejected
//!   and observable via the `bool` return of the promise methods
//! - listeners attached before settlement run in attachment order, exactly
//!   once, on the thread performing the settlement
//! - listeners attached after settlement run immediately on the attaching
//!   thread
//! - [`TransferFuture::wait`] blocks the calling thread and must not be
//!   called from a runtime worker; async callers use
//!   [`TransferFuture::awaited`]
//! - cancellation is cooperative: it settles the future with
//!   [`ApiError::Cancelled`] but does not abort in-flight I/O

use std::sync::{Arc, Condvar, Mutex};

use tokio::sync::Notify;

use crate::domain::errors::ApiError;

/// Shared view of a settled outcome.
///
/// Results are stored behind `Arc` so that every listener and every waiter
/// can read the same value without cloning the payload.
pub type TransferResult<T> = Result<Arc<T>, Arc<ApiError>>;

type Listener<T> = Box<dyn FnOnce(&TransferResult<T>) + Send>;

enum Slot<T> {
    Pending { listeners: Vec<Listener<T>> },
    Settled(TransferResult<T>),
}

struct Inner<T> {
    slot: Mutex<Slot<T>>,
    cvar: Condvar,
    notify: Notify,
}

impl<T> Inner<T> {
    fn settle(&self, result: Result<T, ApiError>) -> bool {
        let shared: TransferResult<T> = match result {
            Ok(value) => Ok(Arc::new(value)),
            Err(err) => Err(Arc::new(err)),
        };

        let listeners = {
            let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
            match &mut *slot {
                Slot::Settled(_) => return false,
                Slot::Pending { listeners } => {
                    let listeners = std::mem::take(listeners);
                    *slot = Slot::Settled(shared.clone());
                    listeners
                }
            }
        };

        self.cvar.notify_all();
        self.notify.notify_waiters();

        // Listeners run outside the lock, in attachment order, on the
        // settling thread.
        for listener in listeners {
            listener(&shared);
        }

        true
    }

    fn peek(&self) -> Option<TransferResult<T>> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        match &*slot {
            Slot::Settled(result) => Some(result.clone()),
            Slot::Pending { .. } => None,
        }
    }
}

// ============================================================================
// TransferFuture
// ============================================================================

/// Consumer handle for the eventual result of an asynchronous operation.
///
/// Cloning yields another handle to the same settlement; all clones observe
/// the same outcome.
pub struct TransferFuture<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for TransferFuture<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> TransferFuture<T> {
    /// Creates a pending future together with its settling side.
    pub fn pending() -> (TransferPromise<T>, TransferFuture<T>) {
        let inner = Arc::new(Inner {
            slot: Mutex::new(Slot::Pending {
                listeners: Vec::new(),
            }),
            cvar: Condvar::new(),
            notify: Notify::new(),
        });
        (
            TransferPromise {
                inner: Arc::clone(&inner),
            },
            TransferFuture { inner },
        )
    }

    /// Creates an already-settled future (used for failures detected before
    /// any work is scheduled, e.g. invalid configuration).
    pub fn settled(result: Result<T, ApiError>) -> TransferFuture<T> {
        let (promise, future) = Self::pending();
        promise.settle(result);
        future
    }

    /// Whether the future has settled.
    pub fn is_done(&self) -> bool {
        self.inner.peek().is_some()
    }

    /// Returns the outcome if settled, without blocking.
    pub fn now(&self) -> Option<TransferResult<T>> {
        self.inner.peek()
    }

    /// Registers a completion listener.
    ///
    /// If the future is already settled the listener runs immediately on the
    /// calling thread; otherwise it runs on the settling thread. Listener
    /// code must not assume a particular thread identity.
    pub fn attach_listener<F>(&self, listener: F)
    where
        F: FnOnce(&TransferResult<T>) + Send + 'static,
    {
        let immediate = {
            let mut slot = self.inner.slot.lock().unwrap_or_else(|e| e.into_inner());
            match &mut *slot {
                Slot::Pending { listeners } => {
                    listeners.push(Box::new(listener));
                    None
                }
                Slot::Settled(result) => Some((listener, result.clone())),
            }
        };
        if let Some((listener, result)) = immediate {
            listener(&result);
        }
    }

    /// Blocks the calling thread until the future settles.
    ///
    /// Must not be called on a runtime worker thread; doing so can deadlock
    /// the event loop that would perform the settlement.
    pub fn wait(&self) -> TransferResult<T> {
        let mut slot = self.inner.slot.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            match &*slot {
                Slot::Settled(result) => return result.clone(),
                Slot::Pending { .. } => {
                    slot = self
                        .inner
                        .cvar
                        .wait(slot)
                        .unwrap_or_else(|e| e.into_inner());
                }
            }
        }
    }

    /// Suspends the current task until the future settles.
    pub async fn awaited(&self) -> TransferResult<T> {
        loop {
            // Register for notification before checking state so a
            // settlement between the check and the await is not lost.
            let notified = self.inner.notify.notified();
            if let Some(result) = self.inner.peek() {
                return result;
            }
            notified.await;
        }
    }

    /// Requests cooperative cancellation.
    ///
    /// Settles the future with [`ApiError::Cancelled`] if still pending. An
    /// in-flight request is not aborted at the transport level; the owning
    /// manager observes the settled state and stops scheduling further work.
    /// Cancelling an already-settled future is a no-op.
    pub fn cancel(&self) -> bool {
        self.inner.settle(Err(ApiError::Cancelled))
    }
}

// ============================================================================
// TransferPromise
// ============================================================================

/// Settling side of a [`TransferFuture`].
///
/// Owned by the task driving the operation. Each settlement method reports
/// whether this call performed the settlement; `false` means the future was
/// already settled (e.g. by cancellation) and the result was discarded.
pub struct TransferPromise<T> {
    inner: Arc<Inner<T>>,
}

impl<T> TransferPromise<T> {
    /// Settles with the given result. Returns `false` if already settled.
    pub fn settle(&self, result: Result<T, ApiError>) -> bool {
        self.inner.settle(result)
    }

    /// Settles successfully. Returns `false` if already settled.
    pub fn try_succeed(&self, value: T) -> bool {
        self.inner.settle(Ok(value))
    }

    /// Settles with a failure. Returns `false` if already settled.
    pub fn try_fail(&self, error: ApiError) -> bool {
        self.inner.settle(Err(error))
    }

    /// Whether the paired future has been cancelled (or otherwise settled).
    ///
    /// Drivers poll this between suspension points to stop scheduling
    /// further work after cooperative cancellation.
    pub fn is_settled(&self) -> bool {
        self.inner.peek().is_some()
    }
}

impl<T> Drop for TransferPromise<T> {
    fn drop(&mut self) {
        // A promise dropped without settling would leave waiters blocked
        // forever; surface it as a protocol-level defect instead.
        self.inner.settle(Err(ApiError::Protocol(
            "operation dropped its result without settling".to_string(),
        )));
    }
}
