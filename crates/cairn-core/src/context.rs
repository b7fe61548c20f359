//! Cancellation and deadline context for store operations.
//!
//! Every store operation runs inside [`Context::run`], which races the
//! operation against the caller's cancellation signal and deadline. Losing
//! the race drops the operation future, and with it any in-flight store call.

use std::future::{Future, pending};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::DomainError;

/// Per-call cancellation and deadline scope.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancelled: Option<watch::Receiver<bool>>,
}

/// Cancels every [`Context`] cloned from the one it was created with.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    /// Signals cancellation.
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

impl Context {
    /// A context that never cancels and has no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Returns a copy with a deadline `timeout` from now. An earlier existing
    /// deadline is kept.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns a copy with the given deadline. An earlier existing deadline is
    /// kept.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(self.deadline.map_or(deadline, |d| d.min(deadline)));
        self
    }

    /// Returns a cancellable copy and the handle that cancels it.
    #[must_use]
    pub fn with_cancellation(mut self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        self.cancelled = Some(rx);
        (self, CancelHandle(tx))
    }

    /// The deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once the cancel handle has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Runs `operation` unless the context is cancelled or its deadline passes
    /// first.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Cancelled` or `DomainError::DeadlineExceeded`
    /// when the operation loses the race, otherwise the operation's own result.
    pub async fn run<F, T>(&self, operation: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        if self.is_cancelled() {
            return Err(DomainError::Cancelled);
        }

        tokio::select! {
            biased;
            () = wait_cancelled(self.cancelled.clone()) => Err(DomainError::Cancelled),
            () = wait_deadline(self.deadline) => Err(DomainError::DeadlineExceeded),
            result = operation => result,
        }
    }
}

async fn wait_cancelled(cancelled: Option<watch::Receiver<bool>>) {
    match cancelled {
        // A dropped handle can never cancel.
        Some(mut rx) => {
            if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                pending::<()>().await;
            }
        }
        None => pending().await,
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => pending().await,
    }
}
