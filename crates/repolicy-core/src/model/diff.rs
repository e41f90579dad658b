use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Add,
    Update,
    Remove,
}

/// Impact of a change; `Ord` ranks High above Low
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Low,
    Medium,
    High,
}

/// One difference between a repository's resolved template and its live state
///
/// Absent values on either side are `Value::Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub repo: String,
    pub setting_path: String,
    pub current_value: Value,
    pub target_value: Value,
    pub change_type: ChangeType,
    pub impact: Impact,
}
