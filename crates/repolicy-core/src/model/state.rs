//! Live repository state, fetched once per run

use super::template::{PermissionBlock, SecurityBlock, Webhook};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Read-only snapshot of one repository as reported by the remote API
///
/// Mirrors the template shape so the same paths address both sides.
/// `security.branch_protection` holds only branches the remote reported as
/// protected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryState {
    pub name: String,
    pub settings: BTreeMap<String, Value>,
    pub security: SecurityBlock,
    pub permissions: PermissionBlock,
    pub webhooks: Vec<Webhook>,
}

impl RepositoryState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Visibility from the `visibility` setting, falling back to `private`
    pub fn visibility(&self) -> Option<String> {
        if let Some(Value::String(v)) = self.settings.get("visibility") {
            return Some(v.clone());
        }
        match self.settings.get("private") {
            Some(Value::Bool(true)) => Some("private".into()),
            Some(Value::Bool(false)) => Some("public".into()),
            _ => None,
        }
    }

    pub fn webhook(&self, url: &str) -> Option<&Webhook> {
        self.webhooks.iter().find(|w| w.url == url)
    }
}

/// Compare a declared value with a live one; arrays compare as sets
///
/// Duplicates on either side collapse, so `["build", "build"]` does not
/// stand in for `["build", "lint"]`.
pub fn setting_matches(declared: &Value, live: &Value) -> bool {
    match (declared, live) {
        (Value::Array(want), Value::Array(have)) => members(want) == members(have),
        _ => declared == live,
    }
}

fn members(items: &[Value]) -> BTreeSet<String> {
    items.iter().map(Value::to_string).collect()
}
