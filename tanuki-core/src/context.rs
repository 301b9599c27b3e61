//! Context - Request-scoped cancellation for provider operations
//!
//! Every handler receives an `OperationContext`. It carries an optional
//! deadline and an explicit cancel signal; long waits (HTTP calls, lock
//! acquisition, retry back-off) race against `cancelled()`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Why an operation stopped waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Cancellation {
    #[error("operation was cancelled")]
    Cancelled,
    #[error("operation deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Clone)]
pub struct OperationContext {
    deadline: Option<Instant>,
    cancel: Arc<watch::Sender<bool>>,
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationContext {
    /// A context without deadline
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            deadline: None,
            cancel: Arc::new(tx),
        }
    }

    /// Derive a context whose deadline is at most `timeout` from now
    ///
    /// The derived context shares the cancel signal with its parent.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            deadline: Some(deadline),
            cancel: Arc::clone(&self.cancel),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Returns the reason if this context is already done
    pub fn check(&self) -> Result<(), Cancellation> {
        if *self.cancel.borrow() {
            Err(Cancellation::Cancelled)
        } else if self.deadline_passed() {
            Err(Cancellation::DeadlineExceeded)
        } else {
            Ok(())
        }
    }

    /// Resolves once the context is cancelled or its deadline passes
    pub async fn cancelled(&self) -> Cancellation {
        let mut rx = self.cancel.subscribe();
        let explicit = async move {
            if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = explicit => Cancellation::Cancelled,
                _ = tokio::time::sleep_until(deadline) => Cancellation::DeadlineExceeded,
            },
            None => {
                explicit.await;
                Cancellation::Cancelled
            }
        }
    }

    /// Run `fut` unless the context finishes first
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Cancellation> {
        self.check()?;
        tokio::select! {
            out = fut => Ok(out),
            reason = self.cancelled() => Err(reason),
        }
    }
}
