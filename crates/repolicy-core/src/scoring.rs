//! Compliance scoring and the organisation-wide audit report

use crate::config::{ScoringConfig, SeverityWeights};
use crate::model::{AuditResult, Enforcement, Grade, Severity, Violation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 100 minus the weight of every non-suppressed required violation, floored at 0
pub fn score(violations: &[Violation], weights: &SeverityWeights) -> u32 {
    let penalty: u32 = violations
        .iter()
        .filter(|v| v.is_penalized())
        .map(|v| weights.weight(v.severity))
        .fold(0u32, u32::saturating_add);
    100u32.saturating_sub(penalty)
}

/// Compliance of one policy across the repositories it is applied to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySummary {
    pub policy_id: String,
    pub compliant_repos: Vec<String>,
    /// Repositories with at least one active violation of this policy
    pub violating_repos: Vec<String>,
    /// Repositories whose only violations of this policy are suppressed
    pub exempted_repos: Vec<String>,
    pub compliance_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub organization: String,
    pub generated_at: DateTime<Utc>,
    pub total_repositories: usize,
    /// Repositories evaluated without a remote or rule error
    pub audited: usize,
    pub failed: usize,
    pub compliant: usize,
    pub non_compliant: usize,
    pub compliance_percentage: f64,
    pub average_score: f64,
    pub grade: Grade,
    /// Active (non-suppressed) violations by severity
    pub violations_by_severity: BTreeMap<Severity, usize>,
    pub violations_by_enforcement: BTreeMap<Enforcement, usize>,
    pub suppressed_violations: usize,
    pub expired_exceptions: usize,
    pub policies: Vec<PolicySummary>,
}

impl AuditReport {
    pub fn build(
        organization: &str,
        results: &[AuditResult],
        config: &ScoringConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let audited: Vec<&AuditResult> = results.iter().filter(|r| !r.is_failed()).collect();
        let compliant = audited
            .iter()
            .filter(|r| r.compliance_score >= config.compliant_threshold)
            .count();

        let mut violations_by_severity: BTreeMap<Severity, usize> =
            Severity::ALL.iter().map(|s| (*s, 0)).collect();
        let mut violations_by_enforcement: BTreeMap<Enforcement, usize> = BTreeMap::new();
        let mut suppressed_violations = 0;
        let mut expired_exceptions = 0;

        for violation in audited.iter().flat_map(|r| r.violations.iter()) {
            if violation.suppressed_by_exception {
                suppressed_violations += 1;
                continue;
            }
            if violation.exception_expired {
                expired_exceptions += 1;
            }
            *violations_by_severity.entry(violation.severity).or_insert(0) += 1;
            *violations_by_enforcement
                .entry(violation.enforcement)
                .or_insert(0) += 1;
        }

        let average_score = if audited.is_empty() {
            0.0
        } else {
            audited
                .iter()
                .map(|r| f64::from(r.compliance_score))
                .sum::<f64>()
                / audited.len() as f64
        };

        Self {
            organization: organization.to_string(),
            generated_at: now,
            total_repositories: results.len(),
            audited: audited.len(),
            failed: results.len() - audited.len(),
            compliant,
            non_compliant: audited.len() - compliant,
            compliance_percentage: percentage(compliant, audited.len()),
            average_score,
            grade: Grade::from_score(average_score),
            violations_by_severity,
            violations_by_enforcement,
            suppressed_violations,
            expired_exceptions,
            policies: summarize_policies(&audited),
        }
    }

    /// Non-zero exit semantics for the caller: any failure or non-compliance
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.non_compliant > 0
    }
}

fn summarize_policies(audited: &[&AuditResult]) -> Vec<PolicySummary> {
    let policy_ids: BTreeSet<&str> = audited
        .iter()
        .flat_map(|r| r.applied_policies.iter().map(String::as_str))
        .collect();

    policy_ids
        .into_iter()
        .map(|policy_id| {
            let mut summary = PolicySummary {
                policy_id: policy_id.to_string(),
                compliant_repos: Vec::new(),
                violating_repos: Vec::new(),
                exempted_repos: Vec::new(),
                compliance_percentage: 0.0,
            };
            for result in audited
                .iter()
                .filter(|r| r.applied_policies.iter().any(|p| p == policy_id))
            {
                let relevant: Vec<&Violation> = result
                    .violations
                    .iter()
                    .filter(|v| v.policy_id == policy_id)
                    .collect();
                let bucket = if relevant.iter().any(|v| v.is_active()) {
                    &mut summary.violating_repos
                } else if !relevant.is_empty() {
                    &mut summary.exempted_repos
                } else {
                    &mut summary.compliant_repos
                };
                bucket.push(result.repo.clone());
            }
            let applied = summary.compliant_repos.len()
                + summary.violating_repos.len()
                + summary.exempted_repos.len();
            summary.compliance_percentage = percentage(summary.compliant_repos.len(), applied);
            summary
        })
        .collect()
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn violation(severity: Severity, enforcement: Enforcement, suppressed: bool) -> Violation {
        Violation {
            repo: "svc".into(),
            policy_id: "p".into(),
            rule_id: "r".into(),
            rule_type: "visibility".into(),
            enforcement,
            severity,
            message: String::new(),
            expected: Value::Null,
            actual: Value::Null,
            remediation: None,
            suppressed_by_exception: suppressed,
            exception_expired: false,
            exception_note: None,
        }
    }

    #[test]
    fn test_only_active_required_violations_penalize() {
        let weights = SeverityWeights::default();
        let violations = vec![
            violation(Severity::High, Enforcement::Required, false),
            violation(Severity::Critical, Enforcement::Required, true),
            violation(Severity::Critical, Enforcement::Recommended, false),
            violation(Severity::Low, Enforcement::Optional, false),
        ];
        assert_eq!(score(&violations, &weights), 85);
    }

    #[test]
    fn test_score_floors_at_zero() {
        let weights = SeverityWeights::default();
        let violations: Vec<_> = (0..5)
            .map(|_| violation(Severity::Critical, Enforcement::Required, false))
            .collect();
        assert_eq!(score(&violations, &weights), 0);
    }

    #[test]
    fn test_custom_weights() {
        let weights = SeverityWeights {
            medium: 10,
            ..Default::default()
        };
        let violations = vec![violation(Severity::Medium, Enforcement::Required, false)];
        assert_eq!(score(&violations, &weights), 90);
    }
}
