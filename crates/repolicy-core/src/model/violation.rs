use super::policy::{Enforcement, Severity};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A policy rule found unsatisfied for one repository
///
/// Suppressed violations are kept, not dropped, so reports can show accepted
/// risk separately from compliance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub repo: String,
    pub policy_id: String,
    pub rule_id: String,
    pub rule_type: String,
    pub enforcement: Enforcement,
    pub severity: Severity,
    pub message: String,
    pub expected: Value,
    pub actual: Value,
    pub remediation: Option<String>,
    pub suppressed_by_exception: bool,
    /// Set when a matching exception existed but had lapsed
    pub exception_expired: bool,
    pub exception_note: Option<String>,
}

impl Violation {
    /// Counts against the compliance score
    pub fn is_penalized(&self) -> bool {
        !self.suppressed_by_exception && self.enforcement == Enforcement::Required
    }

    pub fn is_active(&self) -> bool {
        !self.suppressed_by_exception
    }
}
