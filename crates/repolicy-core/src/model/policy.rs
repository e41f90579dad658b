//! Policies: named sets of compliance rules

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How strongly a rule is enforced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Enforcement {
    #[default]
    Required,
    Recommended,
    Optional,
}

/// Severity of a violated rule, used for score weighting
///
/// Variants are declared in ascending order so `Ord` ranks Critical highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// One compliance rule
///
/// `rule_type` stays a string here; it is parsed into a closed rule kind
/// when the rule is evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(default)]
    pub expected_value: Value,
    #[serde(default)]
    pub enforcement: Enforcement,
    #[serde(default)]
    pub message: Option<String>,
    /// Feature name, branch or path the rule targets when `expected_value`
    /// does not carry it
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub remediation: Option<String>,
}

impl Rule {
    /// Rules without an explicit severity weigh as High
    pub fn severity(&self) -> Severity {
        self.severity.unwrap_or(Severity::High)
    }
}
