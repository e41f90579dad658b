//! Resolution: spec document + repository names -> per-repository targets
//!
//! Everything here runs before any remote call. Any failure aborts the run.

#![allow(clippy::result_large_err)]

pub mod assignment;
pub mod pattern;
pub mod templates;

pub use assignment::AssignmentResolver;
pub use pattern::RepoPattern;
pub use templates::resolve_templates;

use crate::config::EngineConfig;
use crate::errors::{ConfigError, Result};
use crate::evaluate::RuleKind;
use crate::model::{Exception, Policy, RepositoryAssignment, ResolvedTemplate, SpecDocument};
use crate::{log_op_end, log_op_error, log_op_start};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// Output of `resolve`: everything evaluation, diffing and apply need
#[derive(Debug, Clone)]
pub struct ResolvedAssignments {
    pub organization: String,
    pub templates: BTreeMap<String, ResolvedTemplate>,
    pub policies: BTreeMap<String, Policy>,
    /// One entry per input repository, in input order
    pub assignments: Vec<RepositoryAssignment>,
    pub exceptions: Vec<Exception>,
}

impl ResolvedAssignments {
    pub fn assignment(&self, repo: &str) -> Option<&RepositoryAssignment> {
        self.assignments.iter().find(|a| a.repo_name == repo)
    }

    pub fn template_for(&self, assignment: &RepositoryAssignment) -> Option<&ResolvedTemplate> {
        assignment
            .resolved_template_id
            .as_deref()
            .and_then(|id| self.templates.get(id))
    }

    pub fn policies_for<'s>(
        &'s self,
        assignment: &'s RepositoryAssignment,
    ) -> impl Iterator<Item = (&'s str, &'s Policy)> + 's {
        assignment
            .policy_ids
            .iter()
            .filter_map(move |id| self.policies.get(id).map(|p| (id.as_str(), p)))
    }

    /// Branches whose protection must be fetched for this repository
    ///
    /// The union of branches the template protects and branches that branch
    /// rules in assigned policies target.
    pub fn branches_of_interest(
        &self,
        assignment: &RepositoryAssignment,
        default_branch: &str,
    ) -> BTreeSet<String> {
        let mut branches: BTreeSet<String> = self
            .template_for(assignment)
            .map(|t| t.security.branch_protection.keys().cloned().collect())
            .unwrap_or_default();
        for (policy_id, policy) in self.policies_for(assignment) {
            for rule in &policy.rules {
                if let Ok(kind) = RuleKind::parse(policy_id, rule, default_branch) {
                    if let Some(branch) = kind.branch() {
                        branches.insert(branch.to_string());
                    }
                }
            }
        }
        branches
    }

    /// Whether any assigned rule needs the repository's file listing
    pub fn needs_file_listing(&self, assignment: &RepositoryAssignment, default_branch: &str) -> bool {
        self.policies_for(assignment).any(|(policy_id, policy)| {
            policy.rules.iter().any(|rule| {
                RuleKind::parse(policy_id, rule, default_branch)
                    .map(|kind| kind.needs_files())
                    .unwrap_or(false)
            })
        })
    }
}

/// Resolve templates, assignments and (optionally) rule types
///
/// Repository names are de-duplicated, keeping first occurrence.
pub fn resolve(
    spec: &SpecDocument,
    repositories: &[String],
    config: &EngineConfig,
) -> Result<ResolvedAssignments> {
    let start = Instant::now();
    log_op_start!("resolve", repo_count = repositories.len());

    match resolve_inner(spec, repositories, config) {
        Ok(resolved) => {
            log_op_end!(
                "resolve",
                duration_ms = start.elapsed().as_millis() as u64,
                template_count = resolved.templates.len(),
                repo_count = resolved.assignments.len()
            );
            Ok(resolved)
        }
        Err(err) => {
            log_op_error!(
                "resolve",
                err.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            Err(err)
        }
    }
}

fn resolve_inner(
    spec: &SpecDocument,
    repositories: &[String],
    config: &EngineConfig,
) -> Result<ResolvedAssignments> {
    config.validate()?;
    let templates = resolve_templates(&spec.templates, config.max_inheritance_depth)?;

    if config.strict_rule_types {
        for (policy_id, policy) in &spec.policies {
            for rule in &policy.rules {
                RuleKind::parse(policy_id, rule, &config.default_branch)?;
            }
        }
    }

    for exception in &spec.exceptions {
        if !spec.policies.contains_key(&exception.policy_id) {
            return Err(ConfigError::UnknownPolicy {
                policy_id: exception.policy_id.clone(),
                referenced_by: format!("exception for repository '{}'", exception.repo),
            });
        }
    }

    let resolver = AssignmentResolver::new(&spec.repositories, &templates, &spec.policies)?;
    let mut seen = BTreeSet::new();
    let assignments = repositories
        .iter()
        .filter(|repo| seen.insert(repo.as_str()))
        .map(|repo| resolver.resolve(repo))
        .collect();

    Ok(ResolvedAssignments {
        organization: spec.organization.clone(),
        templates,
        policies: spec.policies.clone(),
        assignments,
        exceptions: spec.exceptions.clone(),
    })
}
