//! Data model for templates, policies, assignments, live state and results
//!
//! Every map is a `BTreeMap` so iteration order, and therefore every
//! derived output, is deterministic.

pub mod apply;
pub mod assignment;
pub mod audit;
pub mod diff;
pub mod exception;
pub mod path;
pub mod policy;
pub mod spec;
pub mod state;
pub mod template;
pub mod violation;

pub use apply::{ApplyMode, ApplyOutcome, ApplyResult, FieldOutcome, FieldStatus};
pub use assignment::{
    AssignmentRules, AssignmentSource, DefaultAssignment, PatternAssignment,
    RepositoryAssignment, SpecificAssignment,
};
pub use audit::{AuditResult, FailureRecord, Grade};
pub use diff::{ChangeType, DiffEntry, Impact};
pub use exception::Exception;
pub use path::SettingPath;
pub use policy::{Enforcement, Policy, Rule, Severity};
pub use spec::SpecDocument;
pub use state::RepositoryState;
pub use template::{
    BranchProtectionRule, KeyedCollection, ListField, PermissionBlock, ResolvedTemplate,
    SecurityBlock, Template, Webhook,
};
pub use violation::Violation;
