//! Engine facade: resolve, evaluate, diff and apply over a remote client
//!
//! Each operation fans out one job per repository through the worker pool.
//! Jobs share nothing mutable; their results are merged once at the end.
//! Remote failures stay scoped to their repository.

#![allow(clippy::result_large_err)]

use crate::cancel::CancelToken;
use crate::client::RepositoryClient;
use crate::pool::WorkerPool;
use crate::rate_limit::RateLimitedClient;
use async_trait::async_trait;
use repolicy_core::model::{
    ApplyMode, ApplyOutcome, ApplyResult, AuditResult, DiffEntry, FieldOutcome, FieldStatus,
    RepositoryAssignment, RepositoryState, SpecDocument,
};
use repolicy_core::patch::REPOSITORY_GROUP;
use repolicy_core::{
    log_op_end, log_op_error, log_op_start, ApplyError, AuditReport, BranchProtectionPatch,
    EngineConfig, ExError, FileLister, PatchPlan, RemoteError, RepositoryPatch,
    ResolvedAssignments,
};
use repolicy_core_types::{RequestContext, RunId};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Decides whether an interactive apply may write one repository
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, plan: &PatchPlan) -> bool;
}

/// Output of `Engine::evaluate`
#[derive(Debug, Clone)]
pub struct EvaluationRun {
    /// One result per resolved repository, in input order
    pub results: Vec<AuditResult>,
    pub report: AuditReport,
}

/// Output of `Engine::diff`
#[derive(Debug, Clone, Default)]
pub struct DiffRun {
    /// High impact first
    pub entries: Vec<DiffEntry>,
    /// Repositories whose live state could not be read
    pub failures: Vec<(String, RemoteError)>,
}

impl DiffRun {
    pub fn is_clean(&self) -> bool {
        self.entries.is_empty() && self.failures.is_empty()
    }
}

/// Live state and, when a rule needs it, the file listing of one repository
struct Fetched {
    repo: String,
    state: Result<RepositoryState, RemoteError>,
    files: Option<Result<Vec<String>, RemoteError>>,
}

/// File listings fetched ahead of evaluation
struct FetchedFiles(BTreeMap<String, Result<Vec<String>, RemoteError>>);

impl FileLister for FetchedFiles {
    fn list_files(&self, repo: &str) -> Result<Vec<String>, RemoteError> {
        self.0.get(repo).cloned().unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// One write call within a repository's plan
enum WriteGroup<'p> {
    Repository(&'p RepositoryPatch),
    Branch(&'p BranchProtectionPatch),
}

impl WriteGroup<'_> {
    fn name(&self) -> String {
        match self {
            WriteGroup::Repository(_) => REPOSITORY_GROUP.to_string(),
            WriteGroup::Branch(patch) => patch.group(),
        }
    }

    fn setting_paths(&self) -> &[String] {
        match self {
            WriteGroup::Repository(patch) => &patch.setting_paths,
            WriteGroup::Branch(patch) => &patch.setting_paths,
        }
    }
}

pub struct Engine {
    client: Arc<dyn RepositoryClient>,
    config: EngineConfig,
    confirmer: Option<Arc<dyn Confirmer>>,
    pool: WorkerPool,
    context: RequestContext,
}

impl Engine {
    /// Engine over a client that handles its own rate limiting
    pub fn new(client: Arc<dyn RepositoryClient>, config: EngineConfig) -> Self {
        let pool = WorkerPool::new(config.worker_count());
        Self {
            client,
            config,
            confirmer: None,
            pool,
            context: RequestContext::new(),
        }
    }

    /// Engine over a raw client, wrapped in `RateLimitedClient` using `config.retry`
    pub fn with_rate_limit<C>(client: C, config: EngineConfig) -> Self
    where
        C: RepositoryClient + 'static,
    {
        let limited = RateLimitedClient::new(client, config.retry.clone());
        Self::new(Arc::new(limited), config)
    }

    pub fn with_confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = Some(confirmer);
        self
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.context = RequestContext::with_run_id(run_id);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn run_id(&self) -> &RunId {
        &self.context.run_id
    }

    /// Resolve the organisation document for `repositories` before any remote call
    ///
    /// # Errors
    ///
    /// Any `ConfigError`; nothing has been read or written yet.
    pub fn resolve(
        &self,
        spec: &SpecDocument,
        repositories: &[String],
    ) -> repolicy_core::Result<ResolvedAssignments> {
        repolicy_core::resolve(spec, repositories, &self.config)
    }

    /// Fetch live state for every repository and audit it
    pub async fn evaluate(
        &self,
        resolved: &ResolvedAssignments,
        cancel: &CancelToken,
    ) -> EvaluationRun {
        let start = Instant::now();
        let run_id = self.context.run_id.as_str();
        log_op_start!(
            "evaluate",
            run_id = run_id,
            repo_count = resolved.assignments.len()
        );

        let jobs = resolved.assignments.iter().map(move |assignment| {
            let with_files =
                resolved.needs_file_listing(assignment, &self.config.default_branch);
            self.fetch(resolved, assignment, with_files, cancel)
        });
        let fetched = self.pool.run_all(jobs).await;

        let mut states = BTreeMap::new();
        let mut listings = BTreeMap::new();
        for item in fetched {
            if let Some(files) = item.files {
                listings.insert(item.repo.clone(), files);
            }
            states.insert(item.repo, item.state);
        }

        let now = chrono::Utc::now();
        let results = repolicy_core::evaluate(
            resolved,
            &states,
            &FetchedFiles(listings),
            &self.config,
            now,
        );
        let report = AuditReport::build(&resolved.organization, &results, &self.config.scoring, now);

        log_op_end!(
            "evaluate",
            duration_ms = start.elapsed().as_millis() as u64,
            run_id = run_id,
            failed = report.failed,
            non_compliant = report.non_compliant
        );
        EvaluationRun { results, report }
    }

    /// Fetch live state for every templated repository and diff it
    ///
    /// Repositories without a resolved template have nothing to converge
    /// toward and are not fetched.
    pub async fn diff(&self, resolved: &ResolvedAssignments, cancel: &CancelToken) -> DiffRun {
        let start = Instant::now();
        let run_id = self.context.run_id.as_str();
        log_op_start!("diff", run_id = run_id);

        let jobs = resolved
            .assignments
            .iter()
            .filter(|assignment| resolved.template_for(assignment).is_some())
            .map(move |assignment| self.fetch(resolved, assignment, false, cancel));
        let states: BTreeMap<String, Result<RepositoryState, RemoteError>> = self
            .pool
            .run_all(jobs)
            .await
            .into_iter()
            .map(|item| (item.repo, item.state))
            .collect();

        let (entries, failures) = repolicy_core::diff(resolved, &states);

        log_op_end!(
            "diff",
            duration_ms = start.elapsed().as_millis() as u64,
            run_id = run_id,
            diff_count = entries.len(),
            failed = failures.len()
        );
        DiffRun { entries, failures }
    }

    /// Apply diff entries, one plan per repository
    ///
    /// Webhook secrets for hooks being created come from each repository's
    /// resolved template.
    pub async fn apply(
        &self,
        resolved: &ResolvedAssignments,
        entries: &[DiffEntry],
        mode: ApplyMode,
        cancel: &CancelToken,
    ) -> Vec<ApplyResult> {
        let plans = PatchPlan::plan_all(entries, |repo| {
            resolved
                .assignment(repo)
                .and_then(|assignment| resolved.template_for(assignment))
        });
        self.apply_plans(plans, mode, cancel).await
    }

    /// Apply pre-built plans; results come back in plan order
    pub async fn apply_plans(
        &self,
        plans: Vec<PatchPlan>,
        mode: ApplyMode,
        cancel: &CancelToken,
    ) -> Vec<ApplyResult> {
        let start = Instant::now();
        let run_id = self.context.run_id.as_str();
        log_op_start!(
            "apply",
            run_id = run_id,
            mode = ?mode,
            repo_count = plans.len()
        );

        let jobs = plans
            .into_iter()
            .map(move |plan| self.apply_plan(plan, mode, cancel));
        let results = self.pool.run_all(jobs).await;

        let failed = results
            .iter()
            .filter(|r| matches!(r.outcome, ApplyOutcome::Failed { .. }))
            .count();
        log_op_end!(
            "apply",
            duration_ms = start.elapsed().as_millis() as u64,
            run_id = run_id,
            failed = failed,
            write_calls = results.iter().map(|r| r.write_calls).sum::<usize>()
        );
        results
    }

    async fn fetch(
        &self,
        resolved: &ResolvedAssignments,
        assignment: &RepositoryAssignment,
        with_files: bool,
        cancel: &CancelToken,
    ) -> Fetched {
        let repo = assignment.repo_name.as_str();
        let state = self.fetch_state(resolved, assignment, cancel).await;
        // No listing when the repository itself could not be read
        let files = match (&state, with_files) {
            (Ok(_), true) => Some(cancel.guard(self.client.list_files(repo, cancel)).await),
            _ => None,
        };
        Fetched {
            repo: repo.to_string(),
            state,
            files,
        }
    }

    async fn fetch_state(
        &self,
        resolved: &ResolvedAssignments,
        assignment: &RepositoryAssignment,
        cancel: &CancelToken,
    ) -> Result<RepositoryState, RemoteError> {
        let repo = assignment.repo_name.as_str();
        let mut state = cancel.guard(self.client.get_repository(repo, cancel)).await?;

        for branch in resolved.branches_of_interest(assignment, &self.config.default_branch) {
            let rule = cancel
                .guard(self.client.get_branch_protection(repo, &branch, cancel))
                .await?;
            match rule {
                Some(rule) => {
                    state.security.branch_protection.insert(branch, rule);
                }
                None => {
                    state.security.branch_protection.remove(&branch);
                }
            }
        }
        Ok(state)
    }

    async fn apply_plan(&self, plan: PatchPlan, mode: ApplyMode, cancel: &CancelToken) -> ApplyResult {
        let repo = plan.repo.clone();

        if mode == ApplyMode::DryRun {
            return ApplyResult::skipped(repo, "dry run", plan.entries);
        }
        if plan.is_empty() {
            return ApplyResult::skipped(repo, "no changes", plan.entries);
        }
        if cancel.is_cancelled() {
            return cancelled_before_write(plan);
        }
        if mode == ApplyMode::Interactive {
            let confirmed = match &self.confirmer {
                Some(confirmer) => confirmer.confirm(&plan).await,
                None => false,
            };
            if !confirmed {
                return ApplyResult::skipped(repo, "declined", plan.entries);
            }
        }

        let start = Instant::now();
        let ctx = self.context.for_request();
        let request_id = ctx
            .request_id
            .as_ref()
            .map(|id| id.as_str().to_string())
            .unwrap_or_default();
        log_op_start!(
            "apply_repository",
            repo = repo.as_str(),
            run_id = ctx.run_id.as_str(),
            request_id = request_id.as_str(),
            groups = plan.write_groups()
        );

        let mut groups = Vec::with_capacity(plan.write_groups());
        if let Some(patch) = &plan.repository {
            groups.push(WriteGroup::Repository(patch));
        }
        groups.extend(plan.branches.iter().map(WriteGroup::Branch));

        let mut fields = Vec::new();
        let mut write_calls = 0;
        let mut cancelled = false;
        let mut failures: Vec<ApplyError> = Vec::new();

        for group in &groups {
            if cancelled || cancel.is_cancelled() {
                cancelled = true;
                mark(&mut fields, group.setting_paths(), FieldStatus::NotAttempted);
                continue;
            }

            write_calls += 1;
            let result = match group {
                WriteGroup::Repository(patch) => {
                    cancel
                        .guard(self.client.patch_repository(&repo, patch, cancel))
                        .await
                }
                WriteGroup::Branch(patch) => {
                    cancel
                        .guard(self.client.patch_branch_protection(&repo, patch, cancel))
                        .await
                }
            };

            match result {
                Ok(()) => mark(&mut fields, group.setting_paths(), FieldStatus::Applied),
                Err(err) => {
                    // The write may or may not have landed before cancellation
                    let status = FieldStatus::Failed {
                        reason: err.to_string(),
                    };
                    mark(&mut fields, group.setting_paths(), status);
                    if err.is_cancelled() {
                        cancelled = true;
                    } else {
                        failures.push(ApplyError {
                            repo: repo.clone(),
                            group: group.name(),
                            setting_paths: group.setting_paths().to_vec(),
                            source: err,
                            run_id: Some(ctx.run_id.clone()),
                            request_id: ctx.request_id.clone(),
                        });
                    }
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let outcome = if cancelled {
            let mut err = ExError::from(RemoteError::Cancelled).with_run_id(ctx.run_id.clone());
            if let Some(request_id) = ctx.request_id.clone() {
                err = err.with_request_id(request_id);
            }
            log_op_error!(
                "apply_repository",
                err,
                duration_ms = duration_ms,
                repo = repo.as_str(),
                write_calls = write_calls
            );
            ApplyOutcome::Cancelled
        } else if !failures.is_empty() {
            for failure in &failures {
                log_op_error!(
                    "apply_repository",
                    failure.clone(),
                    duration_ms = duration_ms,
                    repo = repo.as_str(),
                    group = failure.group.as_str()
                );
            }
            let reason = failures
                .iter()
                .map(|f| f.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            ApplyOutcome::Failed { reason }
        } else {
            log_op_end!(
                "apply_repository",
                duration_ms = duration_ms,
                repo = repo.as_str(),
                write_calls = write_calls
            );
            ApplyOutcome::Applied
        };

        ApplyResult {
            repo,
            outcome,
            entries: plan.entries,
            fields,
            write_calls,
        }
    }
}

fn mark(fields: &mut Vec<FieldOutcome>, paths: &[String], status: FieldStatus) {
    fields.extend(paths.iter().map(|path| FieldOutcome {
        setting_path: path.clone(),
        status: status.clone(),
    }));
}

fn cancelled_before_write(plan: PatchPlan) -> ApplyResult {
    let mut fields = Vec::new();
    if let Some(patch) = &plan.repository {
        mark(&mut fields, &patch.setting_paths, FieldStatus::NotAttempted);
    }
    for patch in &plan.branches {
        mark(&mut fields, &patch.setting_paths, FieldStatus::NotAttempted);
    }
    ApplyResult {
        repo: plan.repo,
        outcome: ApplyOutcome::Cancelled,
        entries: plan.entries,
        fields,
        write_calls: 0,
    }
}
