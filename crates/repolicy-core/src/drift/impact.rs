//! Fixed impact table
//!
//! Impact is a pure function of the setting path.

use crate::model::{Impact, SettingPath};

const HIGH_SETTINGS: &[&str] = &["visibility", "private", "archived"];
const MEDIUM_SETTINGS: &[&str] = &[
    "allow_squash_merge",
    "allow_merge_commit",
    "allow_rebase_merge",
    "allow_auto_merge",
    "delete_branch_on_merge",
    "default_branch",
];
const HIGH_BRANCH_FIELDS: &[&str] = &[
    "enforce_admins",
    "restrict_pushes",
    "allow_force_pushes",
    "allow_deletions",
];

pub fn classify_impact(setting_path: &str) -> Impact {
    match SettingPath::parse(setting_path) {
        SettingPath::Setting(key) if HIGH_SETTINGS.contains(&key.as_str()) => Impact::High,
        SettingPath::Setting(key) if MEDIUM_SETTINGS.contains(&key.as_str()) => Impact::Medium,
        SettingPath::Setting(_) => Impact::Low,
        SettingPath::Security(_) => Impact::Medium,
        // Adding or removing a whole protection rule
        SettingPath::BranchProtection { field: None, .. } => Impact::High,
        SettingPath::BranchProtection {
            field: Some(field), ..
        } if HIGH_BRANCH_FIELDS.contains(&field.as_str()) => Impact::High,
        SettingPath::BranchProtection { .. } => Impact::Medium,
        SettingPath::Webhook { .. } => Impact::Medium,
        SettingPath::TeamPermission(_) | SettingPath::UserPermission(_) => Impact::Medium,
    }
}
