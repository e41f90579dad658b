use super::diff::DiffEntry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplyMode {
    /// Compute and return diffs without any write call
    DryRun,
    /// Write every repository's patch
    Force,
    /// Ask a confirmer before writing each repository
    Interactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApplyOutcome {
    Applied,
    Skipped { reason: String },
    Failed { reason: String },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FieldStatus {
    Applied,
    Failed { reason: String },
    /// Its group was never sent (cancelled before reaching it)
    NotAttempted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOutcome {
    pub setting_path: String,
    pub status: FieldStatus,
}

/// Per-repository apply result with field-level detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyResult {
    pub repo: String,
    pub outcome: ApplyOutcome,
    pub entries: Vec<DiffEntry>,
    pub fields: Vec<FieldOutcome>,
    /// Number of write calls issued for this repository
    pub write_calls: usize,
}

impl ApplyResult {
    pub fn skipped(repo: impl Into<String>, reason: impl Into<String>, entries: Vec<DiffEntry>) -> Self {
        Self {
            repo: repo.into(),
            outcome: ApplyOutcome::Skipped {
                reason: reason.into(),
            },
            entries,
            fields: Vec::new(),
            write_calls: 0,
        }
    }
}
