//! repolicy core - declarative repository configuration policy
//!
//! Synchronous, deterministic domain logic:
//! - Template inheritance resolution and repository assignment
//! - Policy rule evaluation with exception filtering
//! - Compliance scoring and organisation audit reports
//! - Drift analysis and patch planning
//!
//! Nothing in this crate performs I/O; live state is passed in.

pub mod config;
pub mod drift;
pub mod errors;
pub mod evaluate;
pub mod exceptions;
pub mod logging_facility;
pub mod model;
pub mod patch;
pub mod resolve;
pub mod scoring;

// Re-export commonly used types
pub use config::EngineConfig;
pub use drift::{classify_impact, diff, diff_repository};
pub use errors::{ApplyError, ConfigError, ExError, ExErrorKind, RemoteError, Result};
pub use evaluate::{audit_repository, evaluate, evaluate_repository, FileLister, StaticFiles};
pub use exceptions::ExceptionLedger;
pub use patch::{BranchProtectionPatch, PatchPlan, RepositoryPatch, WebhookChange};
pub use resolve::{resolve, ResolvedAssignments};
pub use scoring::{score, AuditReport, PolicySummary};

/// Paths used by the exported logging macros
#[doc(hidden)]
pub mod __private {
    pub use repolicy_core_types::schema;
    pub use tracing;
}
