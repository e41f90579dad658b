use super::violation::Violation;
use crate::errors::ExError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Letter grade for a compliance score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Grade::A
        } else if score >= 80.0 {
            Grade::B
        } else if score >= 70.0 {
            Grade::C
        } else if score >= 60.0 {
            Grade::D
        } else {
            Grade::F
        }
    }
}

/// Why a repository could not be audited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub code: String,
    pub message: String,
    pub cancelled: bool,
}

impl FailureRecord {
    pub fn from_error(err: impl Into<ExError>) -> Self {
        let ex: ExError = err.into();
        Self {
            code: ex.code().to_string(),
            message: ex.to_string(),
            cancelled: ex.kind() == crate::errors::ExErrorKind::Cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditResult {
    pub repo: String,
    pub template_id: Option<String>,
    pub violations: Vec<Violation>,
    pub compliance_score: u32,
    pub grade: Grade,
    pub applied_policies: Vec<String>,
    pub checked_at: DateTime<Utc>,
    /// Set when the repository could not be evaluated; the score is then 0
    pub error: Option<FailureRecord>,
}

impl AuditResult {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn active_violations(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_active())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RemoteError;

    #[test]
    fn test_grade_thresholds() {
        assert_eq!(Grade::from_score(100.0), Grade::A);
        assert_eq!(Grade::from_score(90.0), Grade::A);
        assert_eq!(Grade::from_score(85.0), Grade::B);
        assert_eq!(Grade::from_score(70.0), Grade::C);
        assert_eq!(Grade::from_score(60.0), Grade::D);
        assert_eq!(Grade::from_score(59.9), Grade::F);
    }

    #[test]
    fn test_failure_record_marks_cancellation() {
        let record = FailureRecord::from_error(RemoteError::Cancelled);
        assert!(record.cancelled);
        assert_eq!(record.code, "ERR_CANCELLED");

        let record = FailureRecord::from_error(RemoteError::Forbidden {
            resource: "repos/acme/x".into(),
        });
        assert!(!record.cancelled);
    }
}
