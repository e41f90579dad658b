//! Remote repository settings API as consumed by the engine

use crate::cancel::CancelToken;
use async_trait::async_trait;
use repolicy_core::model::{BranchProtectionRule, RepositoryState};
use repolicy_core::{BranchProtectionPatch, RemoteError, RepositoryPatch};
use std::sync::Arc;
use std::time::Duration;

/// Primary quota as last reported by the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSnapshot {
    pub remaining: u32,
    /// Time until the quota window resets
    pub reset_in: Duration,
}

/// Settings API for one organisation
///
/// Writes take partial payloads: only the fields present in the patch are
/// sent, never a whole-object overwrite. Implementations report failures as
/// `RemoteError` and must not retry on their own when wrapped in
/// `RateLimitedClient`.
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Repository settings, security toggles, permissions and webhooks
    ///
    /// Branch protection is read separately per branch.
    async fn get_repository(
        &self,
        repo: &str,
        cancel: &CancelToken,
    ) -> Result<RepositoryState, RemoteError>;

    /// `None` when the branch is not protected
    async fn get_branch_protection(
        &self,
        repo: &str,
        branch: &str,
        cancel: &CancelToken,
    ) -> Result<Option<BranchProtectionRule>, RemoteError>;

    /// Repository-relative paths on the default branch
    async fn list_files(&self, repo: &str, cancel: &CancelToken)
        -> Result<Vec<String>, RemoteError>;

    async fn patch_repository(
        &self,
        repo: &str,
        patch: &RepositoryPatch,
        cancel: &CancelToken,
    ) -> Result<(), RemoteError>;

    async fn patch_branch_protection(
        &self,
        repo: &str,
        patch: &BranchProtectionPatch,
        cancel: &CancelToken,
    ) -> Result<(), RemoteError>;

    /// Latest quota snapshot, if the transport tracks one
    fn quota(&self) -> Option<QuotaSnapshot> {
        None
    }
}

#[async_trait]
impl<C: RepositoryClient + ?Sized> RepositoryClient for Arc<C> {
    async fn get_repository(
        &self,
        repo: &str,
        cancel: &CancelToken,
    ) -> Result<RepositoryState, RemoteError> {
        (**self).get_repository(repo, cancel).await
    }

    async fn get_branch_protection(
        &self,
        repo: &str,
        branch: &str,
        cancel: &CancelToken,
    ) -> Result<Option<BranchProtectionRule>, RemoteError> {
        (**self).get_branch_protection(repo, branch, cancel).await
    }

    async fn list_files(
        &self,
        repo: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<String>, RemoteError> {
        (**self).list_files(repo, cancel).await
    }

    async fn patch_repository(
        &self,
        repo: &str,
        patch: &RepositoryPatch,
        cancel: &CancelToken,
    ) -> Result<(), RemoteError> {
        (**self).patch_repository(repo, patch, cancel).await
    }

    async fn patch_branch_protection(
        &self,
        repo: &str,
        patch: &BranchProtectionPatch,
        cancel: &CancelToken,
    ) -> Result<(), RemoteError> {
        (**self).patch_branch_protection(repo, patch, cancel).await
    }

    fn quota(&self) -> Option<QuotaSnapshot> {
        (**self).quota()
    }
}
