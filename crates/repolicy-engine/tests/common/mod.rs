use async_trait::async_trait;
use repolicy_core::model::{BranchProtectionRule, RepositoryState, SpecDocument};
use repolicy_core::patch::{apply_branch_patch, apply_repository_patch};
use repolicy_core::{BranchProtectionPatch, RemoteError, RepositoryPatch};
use repolicy_engine::{CancelToken, QuotaSnapshot, RepositoryClient};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[allow(dead_code)]
pub fn repos(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Live state from a JSON literal shaped like `RepositoryState`
#[allow(dead_code)]
pub fn state(name: &str, value: Value) -> RepositoryState {
    let mut state: RepositoryState = serde_json::from_value(value).unwrap();
    state.name = name.to_string();
    state
}

/// A `*-api` repository that matches `backend` in every declared field
#[allow(dead_code)]
pub fn compliant_state(name: &str) -> RepositoryState {
    state(
        name,
        json!({
            "settings": {"has_issues": true, "has_wiki": false},
            "security": {
                "vulnerability_alerts": true,
                "branch_protection": {"main": {"required_reviews": 2, "enforce_admins": true}}
            }
        }),
    )
}

/// - `base` turns issues on and the wiki off
/// - `backend` extends `base` with vulnerability alerts and `main` protection
/// - `*-api` repositories get `backend` and both policies; others get `base`
#[allow(dead_code)]
pub fn org_spec() -> SpecDocument {
    serde_json::from_value(json!({
        "version": "1",
        "organization": "acme",
        "templates": {
            "base": {
                "settings": {"has_issues": true, "has_wiki": false}
            },
            "backend": {
                "base": "base",
                "security": {
                    "vulnerability_alerts": true,
                    "branch_protection": {
                        "main": {"required_reviews": 2, "enforce_admins": true}
                    }
                }
            }
        },
        "policies": {
            "security-baseline": {
                "rules": [
                    {
                        "id": "vulnerability_alerts",
                        "type": "security_feature",
                        "expected_value": true,
                        "enforcement": "required"
                    }
                ]
            },
            "code-review": {
                "rules": [
                    {
                        "id": "codeowners",
                        "type": "file_exists",
                        "expected_value": ".github/CODEOWNERS",
                        "enforcement": "required"
                    }
                ]
            }
        },
        "repositories": {
            "patterns": [
                {
                    "match": "*-api",
                    "template": "backend",
                    "policies": ["security-baseline", "code-review"]
                }
            ],
            "default": {"template": "base", "policies": []}
        }
    }))
    .unwrap()
}

/// In-memory settings API
///
/// Writes are applied to the stored state so a second diff sees them.
#[derive(Default)]
pub struct FakeClient {
    states: Mutex<BTreeMap<String, RepositoryState>>,
    files: Mutex<BTreeMap<String, Vec<String>>>,
    /// Every call for the repository fails
    repo_failures: Mutex<BTreeMap<String, RemoteError>>,
    /// Only repository-level writes fail
    repository_write_failures: Mutex<BTreeMap<String, RemoteError>>,
    /// Only branch protection writes fail
    branch_write_failures: Mutex<BTreeMap<String, RemoteError>>,
    /// Errors returned by the next calls, in order, before anything else
    transient: Mutex<Vec<RemoteError>>,
    quota: Mutex<Option<QuotaSnapshot>>,
    delay: Duration,
    calls: AtomicUsize,
    writes: AtomicUsize,
    listings: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[allow(dead_code)]
impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(self, state: RepositoryState) -> Self {
        self.states
            .lock()
            .unwrap()
            .insert(state.name.clone(), state);
        self
    }

    pub fn with_files(self, repo: &str, files: &[&str]) -> Self {
        self.files.lock().unwrap().insert(
            repo.to_string(),
            files.iter().map(|f| f.to_string()).collect(),
        );
        self
    }

    pub fn with_repo_failure(self, repo: &str, err: RemoteError) -> Self {
        self.repo_failures
            .lock()
            .unwrap()
            .insert(repo.to_string(), err);
        self
    }

    pub fn with_repository_write_failure(self, repo: &str, err: RemoteError) -> Self {
        self.repository_write_failures
            .lock()
            .unwrap()
            .insert(repo.to_string(), err);
        self
    }

    pub fn with_branch_write_failure(self, repo: &str, err: RemoteError) -> Self {
        self.branch_write_failures
            .lock()
            .unwrap()
            .insert(repo.to_string(), err);
        self
    }

    pub fn with_transient_errors(self, errors: Vec<RemoteError>) -> Self {
        *self.transient.lock().unwrap() = errors;
        self
    }

    /// Reported once, then the quota reads as unknown
    pub fn with_quota(self, quota: QuotaSnapshot) -> Self {
        *self.quota.lock().unwrap() = Some(quota);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn stored(&self, repo: &str) -> RepositoryState {
        self.states.lock().unwrap()[repo].clone()
    }

    /// Every call that reached the fake, retries included
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed in flight at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn enter(&self, repo: &str) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        {
            let mut transient = self.transient.lock().unwrap();
            if !transient.is_empty() {
                return Err(transient.remove(0));
            }
        }
        match self.repo_failures.lock().unwrap().get(repo) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn not_found(repo: &str) -> RemoteError {
        RemoteError::NotFound {
            resource: repo.to_string(),
        }
    }
}

#[async_trait]
impl RepositoryClient for FakeClient {
    async fn get_repository(
        &self,
        repo: &str,
        _cancel: &CancelToken,
    ) -> Result<RepositoryState, RemoteError> {
        self.enter(repo).await?;
        let mut state = self
            .states
            .lock()
            .unwrap()
            .get(repo)
            .cloned()
            .ok_or_else(|| Self::not_found(repo))?;
        // Protection comes from the per-branch endpoint
        state.security.branch_protection.clear();
        Ok(state)
    }

    async fn get_branch_protection(
        &self,
        repo: &str,
        branch: &str,
        _cancel: &CancelToken,
    ) -> Result<Option<BranchProtectionRule>, RemoteError> {
        self.enter(repo).await?;
        let states = self.states.lock().unwrap();
        let state = states.get(repo).ok_or_else(|| Self::not_found(repo))?;
        Ok(state.security.branch_protection.get(branch).cloned())
    }

    async fn list_files(
        &self,
        repo: &str,
        _cancel: &CancelToken,
    ) -> Result<Vec<String>, RemoteError> {
        self.enter(repo).await?;
        self.listings.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .files
            .lock()
            .unwrap()
            .get(repo)
            .cloned()
            .unwrap_or_default())
    }

    async fn patch_repository(
        &self,
        repo: &str,
        patch: &RepositoryPatch,
        _cancel: &CancelToken,
    ) -> Result<(), RemoteError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.enter(repo).await?;
        if let Some(err) = self.repository_write_failures.lock().unwrap().get(repo) {
            return Err(err.clone());
        }
        let mut states = self.states.lock().unwrap();
        let state = states.get_mut(repo).ok_or_else(|| Self::not_found(repo))?;
        apply_repository_patch(state, patch);
        Ok(())
    }

    async fn patch_branch_protection(
        &self,
        repo: &str,
        patch: &BranchProtectionPatch,
        _cancel: &CancelToken,
    ) -> Result<(), RemoteError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.enter(repo).await?;
        if let Some(err) = self.branch_write_failures.lock().unwrap().get(repo) {
            return Err(err.clone());
        }
        let mut states = self.states.lock().unwrap();
        let state = states.get_mut(repo).ok_or_else(|| Self::not_found(repo))?;
        apply_branch_patch(state, patch);
        Ok(())
    }

    fn quota(&self) -> Option<QuotaSnapshot> {
        self.quota.lock().unwrap().take()
    }
}
