//! Repository to template/policy assignment rules and their output

use serde::{Deserialize, Serialize};

/// Assignment rules from the `repositories` section of a spec document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentRules {
    pub specific: Vec<SpecificAssignment>,
    /// Evaluated in declaration order
    pub patterns: Vec<PatternAssignment>,
    pub default: Option<DefaultAssignment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificAssignment {
    pub name: String,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub policies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternAssignment {
    /// Glob (`*`, `?`) or, when it starts with `^`, a raw regex
    #[serde(rename = "match")]
    pub pattern: String,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub policies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultAssignment {
    pub template: Option<String>,
    pub policies: Vec<String>,
}

/// Where a repository's template came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum AssignmentSource {
    Explicit,
    Pattern { pattern: String },
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryAssignment {
    pub repo_name: String,
    /// `None` when nothing matched and no default template exists; such a
    /// repository is still audited against its policies but has no drift
    pub resolved_template_id: Option<String>,
    pub template_source: Option<AssignmentSource>,
    /// Union of every applicable source, first occurrence kept
    pub policy_ids: Vec<String>,
}
