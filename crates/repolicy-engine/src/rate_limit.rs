//! Rate-limiting retry decorator for any `RepositoryClient`
//!
//! Every call first waits out an exhausted primary quota, then runs the
//! inner call. Transient failures (`RateLimited`, `ServerError`) are retried
//! up to `max_retries` times: a `Retry-After` hint is honoured as given,
//! otherwise the delay is capped exponential backoff with optional jitter.
//! All waits observe the caller's `CancelToken`.

use crate::cancel::CancelToken;
use crate::client::{QuotaSnapshot, RepositoryClient};
use async_trait::async_trait;
use rand::Rng;
use repolicy_core::config::RetryConfig;
use repolicy_core::model::{BranchProtectionRule, RepositoryState};
use repolicy_core::{BranchProtectionPatch, RemoteError, RepositoryPatch};
use std::future::Future;
use std::time::Duration;

pub struct RateLimitedClient<C> {
    inner: C,
    retry: RetryConfig,
}

impl<C: RepositoryClient> RateLimitedClient<C> {
    pub fn new(inner: C, retry: RetryConfig) -> Self {
        Self { inner, retry }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    async fn call<T, F, Fut>(
        &self,
        op: &'static str,
        repo: &str,
        cancel: &CancelToken,
        f: F,
    ) -> Result<T, RemoteError>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, RemoteError>> + Send,
        T: Send,
    {
        let mut attempt: u32 = 0;
        loop {
            self.wait_for_quota(op, repo, cancel).await?;

            match cancel.guard(f()).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.retry.max_retries => {
                    let delay = retry_delay(&self.retry, attempt, &err);
                    attempt += 1;
                    tracing::warn!(
                        op,
                        repo,
                        attempt,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient remote error, retrying"
                    );
                    cancel.sleep(delay).await?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn wait_for_quota(
        &self,
        op: &'static str,
        repo: &str,
        cancel: &CancelToken,
    ) -> Result<(), RemoteError> {
        match self.inner.quota() {
            Some(QuotaSnapshot {
                remaining: 0,
                reset_in,
            }) if !reset_in.is_zero() => {
                tracing::warn!(
                    op,
                    repo,
                    delay_ms = reset_in.as_millis() as u64,
                    "primary quota exhausted, waiting for reset"
                );
                cancel.sleep(reset_in).await
            }
            _ => cancel.check(),
        }
    }
}

/// Delay before retry number `attempt + 1`
pub fn retry_delay(config: &RetryConfig, attempt: u32, err: &RemoteError) -> Duration {
    if let RemoteError::RateLimited {
        retry_after_secs: Some(secs),
    } = err
    {
        return Duration::from_secs(*secs);
    }
    let exp = config
        .base_delay_ms
        .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
    let capped = exp.min(config.max_delay_ms);
    let millis = if config.jitter && capped > 1 {
        // Equal jitter: half fixed, half random
        rand::thread_rng().gen_range(capped / 2..=capped)
    } else {
        capped
    };
    Duration::from_millis(millis)
}

#[async_trait]
impl<C: RepositoryClient> RepositoryClient for RateLimitedClient<C> {
    async fn get_repository(
        &self,
        repo: &str,
        cancel: &CancelToken,
    ) -> Result<RepositoryState, RemoteError> {
        self.call("get_repository", repo, cancel, move || {
            self.inner.get_repository(repo, cancel)
        })
        .await
    }

    async fn get_branch_protection(
        &self,
        repo: &str,
        branch: &str,
        cancel: &CancelToken,
    ) -> Result<Option<BranchProtectionRule>, RemoteError> {
        self.call("get_branch_protection", repo, cancel, move || {
            self.inner.get_branch_protection(repo, branch, cancel)
        })
        .await
    }

    async fn list_files(
        &self,
        repo: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<String>, RemoteError> {
        self.call("list_files", repo, cancel, move || self.inner.list_files(repo, cancel))
            .await
    }

    async fn patch_repository(
        &self,
        repo: &str,
        patch: &RepositoryPatch,
        cancel: &CancelToken,
    ) -> Result<(), RemoteError> {
        self.call("patch_repository", repo, cancel, move || {
            self.inner.patch_repository(repo, patch, cancel)
        })
        .await
    }

    async fn patch_branch_protection(
        &self,
        repo: &str,
        patch: &BranchProtectionPatch,
        cancel: &CancelToken,
    ) -> Result<(), RemoteError> {
        self.call("patch_branch_protection", repo, cancel, move || {
            self.inner.patch_branch_protection(repo, patch, cancel)
        })
        .await
    }

    fn quota(&self) -> Option<QuotaSnapshot> {
        self.inner.quota()
    }
}
