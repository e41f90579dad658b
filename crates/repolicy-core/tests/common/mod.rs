use chrono::{DateTime, TimeZone, Utc};
use repolicy_core::model::{RepositoryState, SpecDocument};
use serde_json::{json, Value};

/// Build a spec document from a JSON literal
#[allow(dead_code)]
pub fn spec(value: Value) -> SpecDocument {
    serde_json::from_value(value).unwrap()
}

#[allow(dead_code)]
pub fn repos(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Fixed clock so exception expiry is reproducible
#[allow(dead_code)]
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Live state from a JSON literal shaped like `RepositoryState`
#[allow(dead_code)]
pub fn state(name: &str, value: Value) -> RepositoryState {
    let mut state: RepositoryState = serde_json::from_value(value).unwrap();
    state.name = name.to_string();
    state
}

/// The organisation used across scenario tests
///
/// - `base` sets `has_issues`; `secure` extends it with `visibility=private`
/// - `backend` extends `secure` and protects `main`
/// - `security-baseline` requires vulnerability alerts
#[allow(dead_code)]
pub fn org_spec() -> SpecDocument {
    spec(json!({
        "version": "1",
        "organization": "acme",
        "templates": {
            "base": {
                "description": "organisation defaults",
                "settings": {"has_issues": true}
            },
            "secure": {
                "base": "base",
                "settings": {"visibility": "private"}
            },
            "backend": {
                "base": "secure",
                "settings": {"allow_squash_merge": true, "has_wiki": false},
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
                "description": "minimum security posture",
                "rules": [
                    {
                        "id": "vulnerability_alerts",
                        "type": "security_feature",
                        "expected_value": true,
                        "enforcement": "required",
                        "message": "Vulnerability alerts must be enabled"
                    }
                ]
            },
            "code-review": {
                "rules": [
                    {
                        "id": "two-reviewers",
                        "type": "min_reviews",
                        "expected_value": 2,
                        "severity": "medium"
                    },
                    {
                        "id": "codeowners",
                        "type": "file_exists",
                        "expected_value": ".github/CODEOWNERS",
                        "enforcement": "recommended"
                    }
                ]
            }
        },
        "repositories": {
            "specific": [
                {"name": "svc-a", "template": "secure", "policies": ["security-baseline"]}
            ],
            "patterns": [
                {"match": "*-api", "template": "backend", "policies": ["code-review"]}
            ],
            "default": {"template": "base", "policies": []}
        },
        "exceptions": []
    }))
}
