//! Templates: inheritable bundles of desired repository settings

use repolicy_core_types::Sensitive;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// List fields a template may replace instead of concatenating onto its base
///
/// `exclusive` markers accumulate down the chain like any other list; naming
/// `Exclusive` here makes the template's own markers the whole set, which is
/// how a child stops managing a collection its base managed exclusively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListField {
    Webhooks,
    RequiredFiles,
    RequiredStatusChecks,
    Exclusive,
}

/// Keyed collections a template may manage exclusively
///
/// For an exclusive collection, live entries the template does not declare
/// are reported as removals. Otherwise they are left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyedCollection {
    Webhooks,
    BranchProtection,
    TeamPermissions,
    UserPermissions,
}

/// A raw template as written by the operator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Template {
    pub description: Option<String>,
    pub base: Option<String>,
    pub settings: BTreeMap<String, Value>,
    pub security: SecurityBlock,
    pub permissions: PermissionBlock,
    pub webhooks: Vec<Webhook>,
    pub required_files: Vec<String>,
    #[serde(rename = "override")]
    pub override_lists: Vec<ListField>,
    pub exclusive: Vec<KeyedCollection>,
}

/// Security toggles plus per-branch protection rules
///
/// Also used for live state, where an absent toggle means the remote did
/// not report it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vulnerability_alerts: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_advisories: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_vulnerability_reporting: Option<bool>,
    pub branch_protection: BTreeMap<String, BranchProtectionRule>,
}

impl SecurityBlock {
    pub const TOGGLES: [&'static str; 3] = [
        "vulnerability_alerts",
        "security_advisories",
        "private_vulnerability_reporting",
    ];

    /// Look up a security toggle by name
    pub fn toggle(&self, name: &str) -> Option<bool> {
        match name {
            "vulnerability_alerts" => self.vulnerability_alerts,
            "security_advisories" => self.security_advisories,
            "private_vulnerability_reporting" => self.private_vulnerability_reporting,
            _ => None,
        }
    }

    /// Set a security toggle by name; returns false for unknown names
    pub fn set_toggle(&mut self, name: &str, value: bool) -> bool {
        let slot = match name {
            "vulnerability_alerts" => &mut self.vulnerability_alerts,
            "security_advisories" => &mut self.security_advisories,
            "private_vulnerability_reporting" => &mut self.private_vulnerability_reporting,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// Declared toggles in a fixed order
    pub fn declared_toggles(&self) -> impl Iterator<Item = (&'static str, bool)> + '_ {
        Self::TOGGLES
            .iter()
            .filter_map(move |name| self.toggle(name).map(|v| (*name, v)))
    }
}

/// Protection settings for one branch
///
/// Every field is optional: a template declares only what it has an opinion
/// about, and live state reports only what the remote returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchProtectionRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_reviews: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dismiss_stale_reviews: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_code_owner_reviews: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_status_checks: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict_status_checks: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restrict_pushes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enforce_admins: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_conversation_resolution: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_force_pushes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_deletions: Option<bool>,
}

impl BranchProtectionRule {
    pub const FIELDS: [&'static str; 10] = [
        "required_reviews",
        "dismiss_stale_reviews",
        "require_code_owner_reviews",
        "required_status_checks",
        "strict_status_checks",
        "restrict_pushes",
        "enforce_admins",
        "require_conversation_resolution",
        "allow_force_pushes",
        "allow_deletions",
    ];

    /// The declared fields as a JSON object, in field-name order
    pub fn declared(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Overlay `fields` (a partial object) onto this rule
    ///
    /// Unknown keys and mistyped values are ignored.
    pub fn apply_fields(&mut self, fields: &Map<String, Value>) {
        let mut current = self.declared();
        for (key, value) in fields {
            if Self::FIELDS.contains(&key.as_str()) {
                current.insert(key.clone(), value.clone());
            }
        }
        if let Ok(updated) = serde_json::from_value(Value::Object(current)) {
            *self = updated;
        }
    }
}

/// Team and user permission grants, keyed by slug/login
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionBlock {
    pub teams: BTreeMap<String, String>,
    pub users: BTreeMap<String, String>,
}

/// A repository webhook, keyed by URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webhook {
    pub url: String,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing)]
    pub secret: Option<Sensitive<String>>,
}

impl Webhook {
    pub const FIELDS: [&'static str; 3] = ["events", "active", "content_type"];

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            events: Vec::new(),
            active: None,
            content_type: None,
            secret: None,
        }
    }

    /// Declared comparable fields; the secret is never included
    pub fn declared(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if !self.events.is_empty() {
            let events: BTreeSet<&str> = self.events.iter().map(String::as_str).collect();
            map.insert("events".into(), Value::from(events.into_iter().collect::<Vec<_>>()));
        }
        if let Some(active) = self.active {
            map.insert("active".into(), Value::Bool(active));
        }
        if let Some(content_type) = &self.content_type {
            map.insert("content_type".into(), Value::String(content_type.clone()));
        }
        map
    }

    /// Overlay declared fields; mistyped values are ignored
    pub fn apply_fields(&mut self, fields: &Map<String, Value>) {
        if let Some(Value::Array(events)) = fields.get("events") {
            self.events = events
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
        if let Some(active) = fields.get("active").and_then(Value::as_bool) {
            self.active = Some(active);
        }
        if let Some(content_type) = fields.get("content_type").and_then(Value::as_str) {
            self.content_type = Some(content_type.to_string());
        }
    }
}

/// A template after inheritance has been flattened
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedTemplate {
    pub id: String,
    pub description: Option<String>,
    /// Template ids from the root of the chain down to this template
    pub lineage: Vec<String>,
    pub settings: BTreeMap<String, Value>,
    pub security: SecurityBlock,
    pub permissions: PermissionBlock,
    pub webhooks: Vec<Webhook>,
    pub required_files: Vec<String>,
    pub exclusive: BTreeSet<KeyedCollection>,
}

impl ResolvedTemplate {
    pub fn is_exclusive(&self, collection: KeyedCollection) -> bool {
        self.exclusive.contains(&collection)
    }

    pub fn webhook(&self, url: &str) -> Option<&Webhook> {
        self.webhooks.iter().find(|w| w.url == url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_branch_rule_declared_skips_unset_fields() {
        let rule = BranchProtectionRule {
            required_reviews: Some(2),
            enforce_admins: Some(true),
            ..Default::default()
        };
        let declared = rule.declared();
        assert_eq!(declared.len(), 2);
        assert_eq!(declared.get("required_reviews"), Some(&json!(2)));
    }

    #[test]
    fn test_branch_rule_apply_fields_ignores_unknown_keys() {
        let mut rule = BranchProtectionRule::default();
        let patch = json!({"required_reviews": 3, "bogus": true});
        if let Value::Object(map) = patch {
            rule.apply_fields(&map);
        }
        assert_eq!(rule.required_reviews, Some(3));
        assert_eq!(rule.declared().len(), 1);
    }

    #[test]
    fn test_webhook_declared_never_contains_secret() {
        let hook = Webhook {
            secret: Some(Sensitive::new("s3cr3t".to_string())),
            active: Some(true),
            ..Webhook::new("https://ci.example.com/hook")
        };
        let declared = Value::Object(hook.declared()).to_string();
        assert!(!declared.contains("s3cr3t"));
        assert!(declared.contains("active"));
    }

    #[test]
    fn test_template_deserializes_override_marker() {
        let template: Template = serde_json::from_value(json!({
            "base": "org-default",
            "override": ["webhooks"],
            "exclusive": ["team_permissions"],
            "settings": {"has_wiki": false}
        }))
        .unwrap();
        assert_eq!(template.override_lists, vec![ListField::Webhooks]);
        assert_eq!(template.exclusive, vec![KeyedCollection::TeamPermissions]);
        assert_eq!(template.base.as_deref(), Some("org-default"));
    }

    #[test]
    fn test_security_toggles() {
        let mut security = SecurityBlock::default();
        assert!(security.set_toggle("vulnerability_alerts", true));
        assert!(!security.set_toggle("nonsense", true));
        let declared: Vec<_> = security.declared_toggles().collect();
        assert_eq!(declared, vec![("vulnerability_alerts", true)]);
    }
}
