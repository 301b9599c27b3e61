//! Advisory lock serializing calls against an API that rejects concurrent writers
//!
//! A single-permit semaphore. Acquisition races the caller's context so a
//! cancelled waiter returns promptly without ever holding the lock.

use tokio::sync::{Semaphore, SemaphorePermit};

use crate::context::{Cancellation, OperationContext};

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("failed to acquire lock: {0}")]
    Cancelled(#[from] Cancellation),
    #[error("lock was closed")]
    Closed,
}

#[derive(Debug)]
pub struct ApiLock {
    permits: Semaphore,
}

/// Held while the protected section runs; releases on drop
#[derive(Debug)]
pub struct ApiLockGuard<'a> {
    _permit: SemaphorePermit<'a>,
}

impl Default for ApiLock {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiLock {
    pub fn new() -> Self {
        Self {
            permits: Semaphore::new(1),
        }
    }

    pub async fn acquire(&self, ctx: &OperationContext) -> Result<ApiLockGuard<'_>, LockError> {
        ctx.check()?;
        tokio::select! {
            biased;
            reason = ctx.cancelled() => Err(LockError::Cancelled(reason)),
            permit = self.permits.acquire() => {
                let permit = permit.map_err(|_| LockError::Closed)?;
                Ok(ApiLockGuard { _permit: permit })
            }
        }
    }

    pub fn is_held(&self) -> bool {
        self.permits.available_permits() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn guard_releases_on_drop() {
        let lock = ApiLock::new();
        let ctx = OperationContext::new();

        let guard = lock.acquire(&ctx).await.unwrap();
        assert!(lock.is_held());
        drop(guard);
        assert!(!lock.is_held());
    }

    #[tokio::test]
    async fn second_caller_waits_for_first() {
        let lock = Arc::new(ApiLock::new());
        let ctx = OperationContext::new();
        let guard = lock.acquire(&ctx).await.unwrap();

        let waiter = {
            let lock = Arc::clone(&lock);
            let ctx = ctx.clone();
            tokio::spawn(async move { lock.acquire(&ctx).await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn cancelled_waiter_returns_without_holding() {
        let lock = Arc::new(ApiLock::new());
        let holder_ctx = OperationContext::new();
        let guard = lock.acquire(&holder_ctx).await.unwrap();

        let waiter_ctx = OperationContext::new();
        let waiter = {
            let lock = Arc::clone(&lock);
            let ctx = waiter_ctx.clone();
            tokio::spawn(async move { lock.acquire(&ctx).await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        waiter_ctx.cancel();
        let result = waiter.await.unwrap();
        assert!(matches!(
            result,
            Err(LockError::Cancelled(Cancellation::Cancelled))
        ));

        // The holder is unaffected, and the lock is free again once it drops.
        assert!(lock.is_held());
        drop(guard);
        assert!(!lock.is_held());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_bounds_acquisition() {
        let lock = ApiLock::new();
        let _guard = lock.acquire(&OperationContext::new()).await.unwrap();

        let ctx = OperationContext::new().with_timeout(Duration::from_secs(60));
        let result = lock.acquire(&ctx).await;
        assert!(matches!(
            result,
            Err(LockError::Cancelled(Cancellation::DeadlineExceeded))
        ));
    }
}
