//! Deferred Value Module
//!
//! A settable, inspectable future. The tri-state tag is readable at any
//! time without awaiting, settles exactly once, and waiters are woken by the
//! settling write rather than by polling.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{CacheError, Result};

// == Status ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pending,
    Fulfilled,
    Rejected,
}

/// Current state of a deferred value.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement<T> {
    Pending,
    Fulfilled(T),
    Rejected(CacheError),
}

impl<T: Clone> Settlement<T> {
    pub fn status(&self) -> Status {
        match self {
            Settlement::Pending => Status::Pending,
            Settlement::Fulfilled(_) => Status::Fulfilled,
            Settlement::Rejected(_) => Status::Rejected,
        }
    }

    /// The settled outcome, or `None` while pending.
    pub fn outcome(&self) -> Option<Result<T>> {
        match self {
            Settlement::Pending => None,
            Settlement::Fulfilled(value) => Some(Ok(value.clone())),
            Settlement::Rejected(err) => Some(Err(err.clone())),
        }
    }
}

// == Deferred ==
/// Single-assignment future with an observable status.
///
/// Owned by the call site that created it. Dropping a value that is still
/// pending cancels it and aborts the wrapped operation.
#[derive(Debug)]
pub struct Deferred<T> {
    state: Arc<watch::Sender<Settlement<T>>>,
    task: Option<JoinHandle<()>>,
}

impl<T> Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// A pending value settled only through [`try_settle`](Self::try_settle).
    pub fn pending() -> Self {
        let (state, _) = watch::channel(Settlement::Pending);
        Self {
            state: Arc::new(state),
            task: None,
        }
    }

    /// Runs `operation` on the runtime and settles with its outcome, unless
    /// the value was settled some other way first.
    pub fn wrap<F>(operation: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let mut deferred = Self::pending();
        let state = Arc::clone(&deferred.state);
        deferred.task = Some(tokio::spawn(async move {
            let outcome = operation.await;
            if !settle(&state, outcome) {
                debug!("Wrapped operation finished after the value was already settled");
            }
        }));
        deferred
    }

    /// Settles a pending value. Returns `false`, leaving the value untouched,
    /// if it was already settled.
    pub fn try_settle(&self, outcome: Result<T>) -> bool {
        settle(&self.state, outcome)
    }

    pub fn status(&self) -> Status {
        self.state.borrow().status()
    }

    /// The settled outcome without waiting, or `None` while pending.
    pub fn try_value(&self) -> Option<Result<T>> {
        self.state.borrow().outcome()
    }

    /// Waits until the value settles, then yields the value or re-raises the
    /// error. Any number of waiters see the same outcome.
    pub async fn value(&self) -> Result<T> {
        let mut settled = self.state.subscribe();
        let outcome = {
            let current = settled
                .wait_for(|state| state.status() != Status::Pending)
                .await
                .map_err(|_| CacheError::Internal("deferred value dropped".to_string()))?;
            current.outcome()
        };
        outcome.unwrap_or_else(|| Err(CacheError::Internal("settled without outcome".to_string())))
    }

    /// Rejects a pending value with [`CacheError::Cancelled`] and aborts the
    /// wrapped operation. No-op once settled.
    pub fn cancel(&self, reason: &str) -> bool {
        let cancelled = self.try_settle(Err(CacheError::Cancelled(reason.to_string())));
        if cancelled {
            if let Some(task) = &self.task {
                task.abort();
            }
        }
        cancelled
    }
}

impl<T> Drop for Deferred<T> {
    fn drop(&mut self) {
        let cancelled = self.state.send_if_modified(|state| {
            if matches!(state, Settlement::Pending) {
                *state = Settlement::Rejected(CacheError::Cancelled("dropped while pending".to_string()));
                true
            } else {
                false
            }
        });
        if cancelled {
            if let Some(task) = self.task.take() {
                task.abort();
            }
        }
    }
}

fn settle<T>(state: &watch::Sender<Settlement<T>>, outcome: Result<T>) -> bool {
    state.send_if_modified(move |current| {
        if !matches!(current, Settlement::Pending) {
            return false;
        }
        *current = match outcome {
            Ok(value) => Settlement::Fulfilled(value),
            Err(err) => Settlement::Rejected(err),
        };
        true
    })
}
