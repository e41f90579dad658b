//! Exception filter
//!
//! Marks violations covered by an active exception as suppressed. Violations
//! are never removed: a suppressed violation is accepted risk, not
//! compliance. A violation whose only matching exceptions have lapsed stays
//! active and is annotated as expired.

use crate::model::{Exception, Violation};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

type ExceptionKey = (String, String, String);

/// Exceptions indexed by `(repo, policy_id, rule_id)`
#[derive(Debug, Clone, Default)]
pub struct ExceptionLedger {
    entries: BTreeMap<ExceptionKey, Vec<Exception>>,
}

/// What `apply` did to a batch of violations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub suppressed: usize,
    pub expired: usize,
}

impl ExceptionLedger {
    pub fn new(exceptions: &[Exception]) -> Self {
        let mut entries: BTreeMap<ExceptionKey, Vec<Exception>> = BTreeMap::new();
        for exception in exceptions {
            entries
                .entry((
                    exception.repo.clone(),
                    exception.policy_id.clone(),
                    exception.rule_id.clone(),
                ))
                .or_default()
                .push(exception.clone());
        }
        Self { entries }
    }

    pub fn lookup(&self, repo: &str, policy_id: &str, rule_id: &str) -> &[Exception] {
        self.entries
            .get(&(repo.to_string(), policy_id.to_string(), rule_id.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn apply(&self, violations: &mut [Violation], now: DateTime<Utc>) -> FilterStats {
        let mut stats = FilterStats::default();
        for violation in violations.iter_mut() {
            let matches = self.lookup(&violation.repo, &violation.policy_id, &violation.rule_id);
            if matches.is_empty() {
                continue;
            }

            if let Some(active) = matches.iter().find(|e| e.is_active(now)) {
                violation.suppressed_by_exception = true;
                violation.exception_expired = false;
                violation.exception_note = Some(match active.expires_at {
                    Some(expires) => format!(
                        "accepted risk until {}: {} (approved by {})",
                        expires.to_rfc3339(),
                        active.reason,
                        active.approver
                    ),
                    None => format!(
                        "accepted risk: {} (approved by {})",
                        active.reason, active.approver
                    ),
                });
                stats.suppressed += 1;
                continue;
            }

            let lapsed = matches.iter().filter_map(|e| e.expires_at).max();
            violation.suppressed_by_exception = false;
            violation.exception_expired = true;
            violation.exception_note = Some(match lapsed {
                Some(at) => format!("exception expired {}", at.to_rfc3339()),
                None => "exception expired".to_string(),
            });
            stats.expired += 1;
            tracing::info!(
                repo = %violation.repo,
                policy_id = %violation.policy_id,
                rule_id = %violation.rule_id,
                "exception expired; violation remains active"
            );
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Enforcement, Severity};
    use chrono::Duration;
    use serde_json::Value;

    fn violation(repo: &str) -> Violation {
        Violation {
            repo: repo.into(),
            policy_id: "security-baseline".into(),
            rule_id: "vulnerability_alerts".into(),
            rule_type: "security_feature".into(),
            enforcement: Enforcement::Required,
            severity: Severity::High,
            message: "vulnerability_alerts should be enabled".into(),
            expected: Value::Bool(true),
            actual: Value::Bool(false),
            remediation: None,
            suppressed_by_exception: false,
            exception_expired: false,
            exception_note: None,
        }
    }

    fn exception(repo: &str, expires_at: Option<DateTime<Utc>>) -> Exception {
        Exception {
            policy_id: "security-baseline".into(),
            rule_id: "vulnerability_alerts".into(),
            repo: repo.into(),
            reason: "archived vendor fork".into(),
            approver: "secops".into(),
            expires_at,
        }
    }

    #[test]
    fn test_active_exception_suppresses_without_removing() {
        let now = Utc::now();
        let ledger = ExceptionLedger::new(&[exception("legacy", None)]);
        let mut violations = vec![violation("legacy"), violation("other")];

        let stats = ledger.apply(&mut violations, now);

        assert_eq!(violations.len(), 2);
        assert!(violations[0].suppressed_by_exception);
        assert!(violations[0]
            .exception_note
            .as_deref()
            .unwrap()
            .contains("secops"));
        assert!(!violations[1].suppressed_by_exception);
        assert_eq!(stats, FilterStats { suppressed: 1, expired: 0 });
    }

    #[test]
    fn test_expired_exception_annotates_only() {
        let now = Utc::now();
        let ledger = ExceptionLedger::new(&[exception("legacy", Some(now - Duration::days(3)))]);
        let mut violations = vec![violation("legacy")];

        let stats = ledger.apply(&mut violations, now);

        assert!(!violations[0].suppressed_by_exception);
        assert!(violations[0].exception_expired);
        assert!(violations[0]
            .exception_note
            .as_deref()
            .unwrap()
            .starts_with("exception expired"));
        assert_eq!(stats.expired, 1);
    }

    #[test]
    fn test_any_active_exception_wins_over_expired_one() {
        let now = Utc::now();
        let ledger = ExceptionLedger::new(&[
            exception("legacy", Some(now - Duration::days(30))),
            exception("legacy", Some(now + Duration::days(30))),
        ]);
        let mut violations = vec![violation("legacy")];
        ledger.apply(&mut violations, now);
        assert!(violations[0].suppressed_by_exception);
        assert!(!violations[0].exception_expired);
    }
}
