//! Closed set of rule kinds
//!
//! A rule's `type` string and `expected_value` are parsed once into a
//! `RuleKind`; each variant owns its own check.

#![allow(clippy::result_large_err)]

use super::files::FileListing;
use crate::errors::{ConfigError, RemoteError};
use crate::model::state::setting_matches;
use crate::model::{BranchProtectionRule, Rule, RepositoryState};
use serde_json::{Map, Value};

const WORKFLOW_DIR: &str = ".github/workflows/";

#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    /// A security toggle (or boolean setting) must equal `enabled`
    SecurityFeature { feature: String, enabled: bool },
    Visibility { expected: String },
    /// Only the declared sub-fields are compared
    BranchProtectionSetting {
        branch: String,
        expected: Map<String, Value>,
    },
    MinReviews { branch: String, min: u64 },
    FileExists { path: String },
    WorkflowExists { file: String },
}

/// Outcome of checking one rule against one repository
#[derive(Debug, Clone, PartialEq)]
pub struct RuleCheck {
    pub passed: bool,
    pub expected: Value,
    pub actual: Value,
}

impl RuleKind {
    pub fn parse(policy_id: &str, rule: &Rule, default_branch: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidRuleValue {
            policy_id: policy_id.to_string(),
            rule_id: rule.id.clone(),
            reason: reason.to_string(),
        };
        let target_branch = || {
            rule.target
                .clone()
                .unwrap_or_else(|| default_branch.to_string())
        };

        match rule.rule_type.as_str() {
            "security_feature" => match &rule.expected_value {
                Value::Bool(enabled) => Ok(RuleKind::SecurityFeature {
                    feature: rule.target.clone().unwrap_or_else(|| rule.id.clone()),
                    enabled: *enabled,
                }),
                Value::String(feature) if !feature.is_empty() => Ok(RuleKind::SecurityFeature {
                    feature: feature.clone(),
                    enabled: true,
                }),
                _ => Err(invalid("expected a boolean or a feature name")),
            },
            "visibility" => match &rule.expected_value {
                Value::String(v) if matches!(v.as_str(), "public" | "private" | "internal") => {
                    Ok(RuleKind::Visibility { expected: v.clone() })
                }
                _ => Err(invalid("expected one of public, private, internal")),
            },
            "branch_protection_setting" => match &rule.expected_value {
                Value::Object(fields) => {
                    let mut expected = fields.clone();
                    let branch = match expected.remove("branch") {
                        Some(Value::String(b)) => b,
                        Some(_) => return Err(invalid("branch must be a string")),
                        None => target_branch(),
                    };
                    if expected.is_empty() {
                        return Err(invalid("no branch protection fields declared"));
                    }
                    if let Some(unknown) = expected
                        .keys()
                        .find(|k| !BranchProtectionRule::FIELDS.contains(&k.as_str()))
                    {
                        return Err(invalid(&format!(
                            "unknown branch protection field '{}'",
                            unknown
                        )));
                    }
                    Ok(RuleKind::BranchProtectionSetting { branch, expected })
                }
                _ => Err(invalid("expected an object of branch protection fields")),
            },
            "min_reviews" => match rule.expected_value.as_u64() {
                Some(min) => Ok(RuleKind::MinReviews {
                    branch: target_branch(),
                    min,
                }),
                None => Err(invalid("expected a non-negative review count")),
            },
            "file_exists" => match file_argument(rule) {
                Some(path) => Ok(RuleKind::FileExists { path }),
                None => Err(invalid("expected a file path")),
            },
            "workflow_exists" => match file_argument(rule) {
                Some(file) => Ok(RuleKind::WorkflowExists {
                    file: file.trim_start_matches(WORKFLOW_DIR).to_string(),
                }),
                None => Err(invalid("expected a workflow file name")),
            },
            other => Err(ConfigError::UnknownRuleType {
                policy_id: policy_id.to_string(),
                rule_id: rule.id.clone(),
                rule_type: other.to_string(),
            }),
        }
    }

    /// Branch whose protection this rule reads, if any
    pub fn branch(&self) -> Option<&str> {
        match self {
            RuleKind::BranchProtectionSetting { branch, .. } | RuleKind::MinReviews { branch, .. } => {
                Some(branch.as_str())
            }
            _ => None,
        }
    }

    pub fn needs_files(&self) -> bool {
        matches!(self, RuleKind::FileExists { .. } | RuleKind::WorkflowExists { .. })
    }

    pub fn check(
        &self,
        state: &RepositoryState,
        files: &mut FileListing<'_>,
    ) -> Result<RuleCheck, RemoteError> {
        let check = match self {
            RuleKind::SecurityFeature { feature, enabled } => {
                let actual = state
                    .security
                    .toggle(feature)
                    .or_else(|| state.settings.get(feature).and_then(Value::as_bool))
                    .unwrap_or(false);
                RuleCheck {
                    passed: actual == *enabled,
                    expected: Value::Bool(*enabled),
                    actual: Value::Bool(actual),
                }
            }
            RuleKind::Visibility { expected } => {
                let actual = state.visibility();
                RuleCheck {
                    passed: actual.as_deref() == Some(expected.as_str()),
                    expected: Value::String(expected.clone()),
                    actual: actual.map(Value::String).unwrap_or(Value::Null),
                }
            }
            RuleKind::BranchProtectionSetting { branch, expected } => {
                match state.security.branch_protection.get(branch) {
                    None => RuleCheck {
                        passed: false,
                        expected: Value::Object(expected.clone()),
                        actual: Value::Null,
                    },
                    Some(live) => {
                        let live = live.declared();
                        let mut actual = Map::new();
                        let mut passed = true;
                        for (field, want) in expected {
                            let have = live.get(field).cloned().unwrap_or(Value::Null);
                            if !setting_matches(want, &have) {
                                passed = false;
                            }
                            actual.insert(field.clone(), have);
                        }
                        RuleCheck {
                            passed,
                            expected: Value::Object(expected.clone()),
                            actual: Value::Object(actual),
                        }
                    }
                }
            }
            RuleKind::MinReviews { branch, min } => {
                let reviews = state
                    .security
                    .branch_protection
                    .get(branch)
                    .and_then(|rule| rule.required_reviews)
                    .map(u64::from)
                    .unwrap_or(0);
                RuleCheck {
                    passed: reviews >= *min,
                    expected: Value::from(*min),
                    actual: Value::from(reviews),
                }
            }
            RuleKind::FileExists { path } => {
                let found = files.contains(path)?;
                RuleCheck {
                    passed: found,
                    expected: Value::String(path.clone()),
                    actual: Value::Bool(found),
                }
            }
            RuleKind::WorkflowExists { file } => {
                let path = format!("{}{}", WORKFLOW_DIR, file);
                let found = files.contains(&path)?;
                RuleCheck {
                    passed: found,
                    expected: Value::String(path),
                    actual: Value::Bool(found),
                }
            }
        };
        Ok(check)
    }

    /// Default violation text when the rule carries no message
    pub fn describe_failure(&self) -> String {
        match self {
            RuleKind::SecurityFeature { feature, enabled } => {
                format!("{} should be {}", feature, if *enabled { "enabled" } else { "disabled" })
            }
            RuleKind::Visibility { expected } => format!("repository should be {}", expected),
            RuleKind::BranchProtectionSetting { branch, .. } => {
                format!("branch protection on '{}' does not match", branch)
            }
            RuleKind::MinReviews { branch, min } => {
                format!("'{}' should require at least {} reviews", branch, min)
            }
            RuleKind::FileExists { path } => format!("required file '{}' is missing", path),
            RuleKind::WorkflowExists { file } => format!("workflow '{}' is missing", file),
        }
    }
}

fn file_argument(rule: &Rule) -> Option<String> {
    match &rule.expected_value {
        Value::String(path) if !path.is_empty() => Some(path.clone()),
        _ => rule.target.clone().filter(|t| !t.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BranchProtectionRule, Enforcement};
    use serde_json::json;

    fn rule(rule_type: &str, expected_value: Value) -> Rule {
        Rule {
            id: "r1".into(),
            rule_type: rule_type.into(),
            expected_value,
            enforcement: Enforcement::Required,
            message: None,
            target: None,
            severity: None,
            remediation: None,
        }
    }

    #[test]
    fn test_unknown_type_names_rule() {
        let err = RuleKind::parse("p1", &rule("license_check", json!(true)), "main").unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownRuleType {
                policy_id: "p1".into(),
                rule_id: "r1".into(),
                rule_type: "license_check".into(),
            }
        );
    }

    #[test]
    fn test_security_feature_uses_rule_id_as_feature() {
        let mut r = rule("security_feature", json!(true));
        r.id = "vulnerability_alerts".into();
        let kind = RuleKind::parse("p", &r, "main").unwrap();
        assert_eq!(
            kind,
            RuleKind::SecurityFeature {
                feature: "vulnerability_alerts".into(),
                enabled: true
            }
        );
    }

    #[test]
    fn test_branch_rule_pulls_branch_from_expected_value() {
        let kind = RuleKind::parse(
            "p",
            &rule(
                "branch_protection_setting",
                json!({"branch": "develop", "enforce_admins": true}),
            ),
            "main",
        )
        .unwrap();
        assert_eq!(kind.branch(), Some("develop"));
    }

    #[test]
    fn test_workflow_prefix_is_optional() {
        let kind = RuleKind::parse(
            "p",
            &rule("workflow_exists", json!(".github/workflows/ci.yml")),
            "main",
        )
        .unwrap();
        assert_eq!(kind, RuleKind::WorkflowExists { file: "ci.yml".into() });
    }

    #[test]
    fn test_invalid_visibility_value() {
        let err = RuleKind::parse("p", &rule("visibility", json!("secret")), "main").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRuleValue { .. }));
    }

    #[test]
    fn test_branch_partial_compare_ignores_undeclared_fields() {
        let kind = RuleKind::parse(
            "p",
            &rule("branch_protection_setting", json!({"required_reviews": 2})),
            "main",
        )
        .unwrap();

        let mut state = RepositoryState::new("svc");
        state.security.branch_protection.insert(
            "main".into(),
            BranchProtectionRule {
                required_reviews: Some(2),
                enforce_admins: Some(false),
                allow_force_pushes: Some(true),
                ..Default::default()
            },
        );
        let lister = crate::evaluate::files::StaticFiles::default();
        let mut files = FileListing::new("svc", &lister);
        let check = kind.check(&state, &mut files).unwrap();
        assert!(check.passed);
        assert_eq!(check.actual, json!({"required_reviews": 2}));
    }

    #[test]
    fn test_unknown_branch_protection_field_is_rejected() {
        let err = RuleKind::parse(
            "p",
            &rule(
                "branch_protection_setting",
                json!({"required_approving_review_count": 2}),
            ),
            "main",
        )
        .unwrap_err();
        match err {
            ConfigError::InvalidRuleValue { reason, .. } => {
                assert!(reason.contains("required_approving_review_count"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_live_checks_do_not_satisfy_rule() {
        let kind = RuleKind::parse(
            "p",
            &rule(
                "branch_protection_setting",
                json!({"required_status_checks": ["build", "lint"]}),
            ),
            "main",
        )
        .unwrap();

        let mut state = RepositoryState::new("svc");
        state.security.branch_protection.insert(
            "main".into(),
            BranchProtectionRule {
                required_status_checks: Some(vec!["build".into(), "build".into()]),
                ..Default::default()
            },
        );
        let lister = crate::evaluate::files::StaticFiles::default();
        let mut files = FileListing::new("svc", &lister);
        assert!(!kind.check(&state, &mut files).unwrap().passed);
    }
}
