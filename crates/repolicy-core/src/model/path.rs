//! Typed view of `DiffEntry::setting_path`
//!
//! Path grammar:
//!
//! - `<key>` for a top-level setting (`visibility`, `has_wiki`, ...)
//! - `security.<toggle>`
//! - `branch_protection.<branch>` or `branch_protection.<branch>.<field>`
//! - `webhooks.<url>` or `webhooks.<url>.<field>`
//! - `permissions.teams.<slug>` / `permissions.users.<login>`
//!
//! Branch names and URLs may themselves contain dots, so a trailing segment
//! is only taken as a field when it names a known field.

use super::template::{BranchProtectionRule, Webhook};
use std::fmt;

const SECURITY: &str = "security.";
const BRANCH_PROTECTION: &str = "branch_protection.";
const WEBHOOKS: &str = "webhooks.";
const TEAMS: &str = "permissions.teams.";
const USERS: &str = "permissions.users.";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SettingPath {
    Setting(String),
    Security(String),
    BranchProtection { branch: String, field: Option<String> },
    Webhook { url: String, field: Option<String> },
    TeamPermission(String),
    UserPermission(String),
}

impl SettingPath {
    pub fn parse(path: &str) -> Self {
        if let Some(rest) = path.strip_prefix(SECURITY) {
            return SettingPath::Security(rest.to_string());
        }
        if let Some(rest) = path.strip_prefix(BRANCH_PROTECTION) {
            let (branch, field) = split_field(rest, &BranchProtectionRule::FIELDS);
            return SettingPath::BranchProtection { branch, field };
        }
        if let Some(rest) = path.strip_prefix(WEBHOOKS) {
            let (url, field) = split_field(rest, &Webhook::FIELDS);
            return SettingPath::Webhook { url, field };
        }
        if let Some(rest) = path.strip_prefix(TEAMS) {
            return SettingPath::TeamPermission(rest.to_string());
        }
        if let Some(rest) = path.strip_prefix(USERS) {
            return SettingPath::UserPermission(rest.to_string());
        }
        SettingPath::Setting(path.to_string())
    }

    /// The last addressed field name (the setting key, toggle or sub-field)
    pub fn leaf(&self) -> Option<&str> {
        match self {
            SettingPath::Setting(key) | SettingPath::Security(key) => Some(key.as_str()),
            SettingPath::BranchProtection { field, .. } | SettingPath::Webhook { field, .. } => {
                field.as_deref()
            }
            SettingPath::TeamPermission(_) | SettingPath::UserPermission(_) => None,
        }
    }
}

fn split_field(rest: &str, fields: &[&str]) -> (String, Option<String>) {
    match rest.rsplit_once('.') {
        Some((head, tail)) if fields.contains(&tail) => (head.to_string(), Some(tail.to_string())),
        _ => (rest.to_string(), None),
    }
}

impl fmt::Display for SettingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingPath::Setting(key) => write!(f, "{}", key),
            SettingPath::Security(name) => write!(f, "{}{}", SECURITY, name),
            SettingPath::BranchProtection { branch, field } => match field {
                Some(field) => write!(f, "{}{}.{}", BRANCH_PROTECTION, branch, field),
                None => write!(f, "{}{}", BRANCH_PROTECTION, branch),
            },
            SettingPath::Webhook { url, field } => match field {
                Some(field) => write!(f, "{}{}.{}", WEBHOOKS, url, field),
                None => write!(f, "{}{}", WEBHOOKS, url),
            },
            SettingPath::TeamPermission(team) => write!(f, "{}{}", TEAMS, team),
            SettingPath::UserPermission(user) => write!(f, "{}{}", USERS, user),
        }
    }
}
