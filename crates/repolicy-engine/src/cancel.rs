//! Cooperative cancellation with an optional deadline

use repolicy_core::RemoteError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Cancellation token shared by every wait in a run
///
/// Cancelled either explicitly via `cancel` or implicitly once its
/// deadline passes. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: Arc::new(Inner {
                deadline: Some(deadline),
                ..Default::default()
            }),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
            || self
                .inner
                .deadline
                .map_or(false, |deadline| Instant::now() >= deadline)
    }

    /// `Err(Cancelled)` if the token has fired
    pub fn check(&self) -> Result<(), RemoteError> {
        if self.is_cancelled() {
            Err(RemoteError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves once the token is cancelled or its deadline passes
    pub async fn cancelled(&self) {
        // Registered before the flag check so a concurrent cancel is seen
        let notified = self.inner.notify.notified();
        if self.is_cancelled() {
            return;
        }
        match self.inner.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = notified => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => notified.await,
        }
    }

    /// Sleep for `duration` unless cancelled first
    pub async fn sleep(&self, duration: Duration) -> Result<(), RemoteError> {
        self.check()?;
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancelled() => Err(RemoteError::Cancelled),
        }
    }

    /// Race a remote call against cancellation
    pub async fn guard<T, F>(&self, call: F) -> Result<T, RemoteError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        self.check()?;
        tokio::select! {
            result = call => result,
            _ = self.cancelled() => Err(RemoteError::Cancelled),
        }
    }
}
