//! Policy rule evaluation and the per-repository audit pipeline
//!
//! `audit_repository` runs evaluate -> exception filter -> score for one
//! repository and never fails: rule or remote errors are recorded on the
//! returned `AuditResult` so the run can continue.

#![allow(clippy::result_large_err)]

pub mod files;
pub mod rules;

pub use files::{FileLister, FileListing, StaticFiles};
pub use rules::{RuleCheck, RuleKind};

use crate::config::EngineConfig;
use crate::errors::{ConfigError, ExError, RemoteError};
use crate::exceptions::ExceptionLedger;
use crate::model::{
    AuditResult, FailureRecord, Grade, RepositoryAssignment, RepositoryState, Violation,
};
use crate::resolve::ResolvedAssignments;
use crate::scoring::score;
use crate::{log_op_end, log_op_error, log_op_start};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Instant;
use thiserror::Error;

/// Why one repository's evaluation stopped
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl From<EvaluationError> for ExError {
    fn from(err: EvaluationError) -> Self {
        match err {
            EvaluationError::Config(e) => e.into(),
            EvaluationError::Remote(e) => e.into(),
        }
    }
}

/// Check every rule of every assigned policy against live state
///
/// The first unknown rule type or remote failure aborts this repository
/// only. Returned violations are not yet exception-filtered.
pub fn evaluate_repository(
    resolved: &ResolvedAssignments,
    assignment: &RepositoryAssignment,
    state: &RepositoryState,
    files: &dyn FileLister,
    config: &EngineConfig,
) -> Result<Vec<Violation>, EvaluationError> {
    let repo = assignment.repo_name.as_str();
    let mut listing = FileListing::new(repo, files);
    let mut violations = Vec::new();

    for (policy_id, policy) in resolved.policies_for(assignment) {
        for rule in &policy.rules {
            let kind = RuleKind::parse(policy_id, rule, &config.default_branch)?;
            let check = kind.check(state, &mut listing)?;
            if check.passed {
                continue;
            }
            violations.push(Violation {
                repo: repo.to_string(),
                policy_id: policy_id.to_string(),
                rule_id: rule.id.clone(),
                rule_type: rule.rule_type.clone(),
                enforcement: rule.enforcement,
                severity: rule.severity(),
                message: rule
                    .message
                    .clone()
                    .unwrap_or_else(|| kind.describe_failure()),
                expected: check.expected,
                actual: check.actual,
                remediation: rule.remediation.clone(),
                suppressed_by_exception: false,
                exception_expired: false,
                exception_note: None,
            });
        }
    }

    Ok(violations)
}

/// Evaluate, filter and score one repository
pub fn audit_repository(
    resolved: &ResolvedAssignments,
    ledger: &ExceptionLedger,
    assignment: &RepositoryAssignment,
    state: Result<&RepositoryState, &RemoteError>,
    files: &dyn FileLister,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> AuditResult {
    let start = Instant::now();
    let repo = assignment.repo_name.as_str();
    log_op_start!("evaluate_repository", repo = repo);

    let outcome = match state {
        Ok(state) => evaluate_repository(resolved, assignment, state, files, config),
        Err(err) => Err(EvaluationError::Remote(err.clone())),
    };

    let mut result = AuditResult {
        repo: repo.to_string(),
        template_id: assignment.resolved_template_id.clone(),
        violations: Vec::new(),
        compliance_score: 0,
        grade: Grade::F,
        applied_policies: assignment.policy_ids.clone(),
        checked_at: now,
        error: None,
    };

    match outcome {
        Ok(mut violations) => {
            ledger.apply(&mut violations, now);
            result.compliance_score = score(&violations, &config.scoring.weights);
            result.grade = Grade::from_score(f64::from(result.compliance_score));
            result.violations = violations;
            log_op_end!(
                "evaluate_repository",
                duration_ms = start.elapsed().as_millis() as u64,
                repo = repo,
                violation_count = result.violations.len(),
                score = result.compliance_score
            );
        }
        Err(err) => {
            log_op_error!(
                "evaluate_repository",
                err.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                repo = repo
            );
            result.error = Some(FailureRecord::from_error(err));
        }
    }
    result
}

/// Audit every resolved repository against pre-fetched live states
///
/// A repository with no entry in `live_states` is recorded as not found.
pub fn evaluate(
    resolved: &ResolvedAssignments,
    live_states: &BTreeMap<String, Result<RepositoryState, RemoteError>>,
    files: &dyn FileLister,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Vec<AuditResult> {
    let ledger = ExceptionLedger::new(&resolved.exceptions);
    resolved
        .assignments
        .iter()
        .map(|assignment| {
            let missing;
            let state = match live_states.get(&assignment.repo_name) {
                Some(Ok(state)) => Ok(state),
                Some(Err(err)) => Err(err),
                None => {
                    missing = RemoteError::NotFound {
                        resource: assignment.repo_name.clone(),
                    };
                    Err(&missing)
                }
            };
            audit_repository(resolved, &ledger, assignment, state, files, config, now)
        })
        .collect()
}
