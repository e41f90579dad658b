use repolicy_core_types::{RequestId, RunId};
use thiserror::Error;

/// Result type alias using ConfigError
pub type Result<T> = std::result::Result<T, ConfigError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every typed error in repolicy converts into an `ExError` carrying one of
/// these kinds. Each kind maps to a stable error code usable by reporters,
/// tests, and exit-summary rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Configuration
    InvalidConfig,
    Parse,
    CyclicTemplateInheritance,
    UnknownTemplate,
    UnknownPolicy,
    UnknownRuleType,
    InheritanceTooDeep,
    InvalidPattern,
    InvalidRuleValue,

    // Remote
    NotFound,
    Forbidden,
    RateLimited,
    ServerError,
    Cancelled,

    // Apply
    ApplyFailed,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ExErrorKind::Parse => "ERR_PARSE",
            ExErrorKind::CyclicTemplateInheritance => "ERR_CYCLIC_TEMPLATE_INHERITANCE",
            ExErrorKind::UnknownTemplate => "ERR_UNKNOWN_TEMPLATE",
            ExErrorKind::UnknownPolicy => "ERR_UNKNOWN_POLICY",
            ExErrorKind::UnknownRuleType => "ERR_UNKNOWN_RULE_TYPE",
            ExErrorKind::InheritanceTooDeep => "ERR_INHERITANCE_TOO_DEEP",
            ExErrorKind::InvalidPattern => "ERR_INVALID_PATTERN",
            ExErrorKind::InvalidRuleValue => "ERR_INVALID_RULE_VALUE",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::Forbidden => "ERR_FORBIDDEN",
            ExErrorKind::RateLimited => "ERR_RATE_LIMITED",
            ExErrorKind::ServerError => "ERR_SERVER_ERROR",
            ExErrorKind::Cancelled => "ERR_CANCELLED",
            ExErrorKind::ApplyFailed => "ERR_APPLY_FAILED",
        }
    }

    /// Whether this kind aborts a whole run rather than a single repository
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExErrorKind::InvalidConfig
                | ExErrorKind::Parse
                | ExErrorKind::CyclicTemplateInheritance
                | ExErrorKind::UnknownTemplate
                | ExErrorKind::UnknownPolicy
                | ExErrorKind::InheritanceTooDeep
                | ExErrorKind::InvalidPattern
                | ExErrorKind::InvalidRuleValue
        )
    }
}

/// Canonical structured error type
///
/// Carries the classification plus whatever context the failing operation
/// had at hand.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    repo: Option<String>,
    entity_id: Option<String>,
    run_id: Option<RunId>,
    request_id: Option<RequestId>,
    message: String,
    source: Option<Box<ExError>>,
    candidates: Option<Vec<String>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            repo: None,
            entity_id: None,
            run_id: None,
            request_id: None,
            message: String::new(),
            source: None,
            candidates: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add repository context
    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = Some(repo.into());
        self
    }

    /// Add entity ID context (template, policy or rule id)
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add run ID context
    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Add request ID context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Add candidate ids (the template ids forming a cycle, for instance)
    pub fn with_candidates(mut self, ids: Vec<String>) -> Self {
        self.candidates = Some(ids);
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn repo(&self) -> Option<&str> {
        self.repo.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn run_id(&self) -> Option<&RunId> {
        self.run_id.as_ref()
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }

    pub fn candidates(&self) -> Option<&[String]> {
        self.candidates.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(repo) = &self.repo {
            write!(f, " (repo: {})", repo)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

// ========== End Error Facility ==========

/// Configuration errors
///
/// Raised while resolving templates, assignments and policies. All of these
/// abort the run before any remote call is made, except `UnknownRuleType`
/// which evaluation reports against a single repository.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Cyclic template inheritance: {}", cycle.join(" -> "))]
    CyclicTemplateInheritance { cycle: Vec<String> },

    #[error("Unknown template '{template_id}' referenced by {referenced_by}")]
    UnknownTemplate {
        template_id: String,
        referenced_by: String,
    },

    #[error("Unknown policy '{policy_id}' referenced by {referenced_by}")]
    UnknownPolicy {
        policy_id: String,
        referenced_by: String,
    },

    #[error("Unknown rule type '{rule_type}' in {policy_id}/{rule_id}")]
    UnknownRuleType {
        policy_id: String,
        rule_id: String,
        rule_type: String,
    },

    #[error("Template '{template_id}' exceeds maximum inheritance depth {max_depth}")]
    InheritanceTooDeep { template_id: String, max_depth: usize },

    #[error("Invalid repository pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid expected value for {policy_id}/{rule_id}: {reason}")]
    InvalidRuleValue {
        policy_id: String,
        rule_id: String,
        reason: String,
    },

    #[error("Invalid configuration field '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

impl From<ConfigError> for ExError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::CyclicTemplateInheritance { cycle } => {
                ExError::new(ExErrorKind::CyclicTemplateInheritance)
                    .with_op("resolve_templates")
                    .with_entity_id(cycle.first().cloned().unwrap_or_default())
                    .with_message(format!("cycle: {}", cycle.join(" -> ")))
                    .with_candidates(cycle)
            }

            ConfigError::UnknownTemplate {
                template_id,
                referenced_by,
            } => ExError::new(ExErrorKind::UnknownTemplate)
                .with_entity_id(template_id)
                .with_message(format!("referenced by {}", referenced_by)),

            ConfigError::UnknownPolicy {
                policy_id,
                referenced_by,
            } => ExError::new(ExErrorKind::UnknownPolicy)
                .with_entity_id(policy_id)
                .with_message(format!("referenced by {}", referenced_by)),

            ConfigError::UnknownRuleType {
                policy_id,
                rule_id,
                rule_type,
            } => ExError::new(ExErrorKind::UnknownRuleType)
                .with_entity_id(format!("{}/{}", policy_id, rule_id))
                .with_message(format!("unknown rule type '{}'", rule_type)),

            ConfigError::InheritanceTooDeep {
                template_id,
                max_depth,
            } => ExError::new(ExErrorKind::InheritanceTooDeep)
                .with_op("resolve_templates")
                .with_entity_id(template_id)
                .with_message(format!("maximum depth {} exceeded", max_depth)),

            ConfigError::InvalidPattern { pattern, reason } => {
                ExError::new(ExErrorKind::InvalidPattern)
                    .with_entity_id(pattern)
                    .with_message(reason)
            }

            ConfigError::InvalidRuleValue {
                policy_id,
                rule_id,
                reason,
            } => ExError::new(ExErrorKind::InvalidRuleValue)
                .with_entity_id(format!("{}/{}", policy_id, rule_id))
                .with_message(reason),

            ConfigError::InvalidConfig { field, reason } => {
                ExError::new(ExErrorKind::InvalidConfig)
                    .with_entity_id(field)
                    .with_message(reason)
            }

            ConfigError::Parse { reason } => ExError::new(ExErrorKind::Parse).with_message(reason),
        }
    }
}

/// Errors surfaced by the remote repository client
///
/// The client's own retry layer has already run by the time one of these
/// reaches the engine; it is final for that repository.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Access to {resource} is forbidden")]
    Forbidden { resource: String },

    #[error("Rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl RemoteError {
    /// Transient failures that a retrying client may re-issue
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RemoteError::RateLimited { .. } | RemoteError::ServerError { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RemoteError::Cancelled)
    }
}

impl From<RemoteError> for ExError {
    fn from(err: RemoteError) -> Self {
        let message = err.to_string();
        match err {
            RemoteError::NotFound { resource } => ExError::new(ExErrorKind::NotFound)
                .with_entity_id(resource)
                .with_message(message),
            RemoteError::Forbidden { resource } => ExError::new(ExErrorKind::Forbidden)
                .with_entity_id(resource)
                .with_message(message),
            RemoteError::RateLimited { .. } => {
                ExError::new(ExErrorKind::RateLimited).with_message(message)
            }
            RemoteError::ServerError { .. } => {
                ExError::new(ExErrorKind::ServerError).with_message(message)
            }
            RemoteError::Cancelled => ExError::new(ExErrorKind::Cancelled).with_message(message),
        }
    }
}

/// A field group that could not be written during apply
///
/// Settings APIs are not transactional, so a repository may end up with
/// some groups applied and others failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to apply {group} on {repo}: {source}")]
pub struct ApplyError {
    pub repo: String,
    pub group: String,
    pub setting_paths: Vec<String>,
    pub source: RemoteError,
    /// Correlation of the apply that issued the write
    pub run_id: Option<RunId>,
    pub request_id: Option<RequestId>,
}

impl From<ApplyError> for ExError {
    fn from(err: ApplyError) -> Self {
        let cause: ExError = err.source.clone().into();
        let mut ex = ExError::new(ExErrorKind::ApplyFailed)
            .with_op("apply_repository")
            .with_repo(err.repo.clone())
            .with_entity_id(err.group.clone())
            .with_message(err.to_string())
            .with_source(cause);
        if let Some(run_id) = err.run_id {
            ex = ex.with_run_id(run_id);
        }
        if let Some(request_id) = err.request_id {
            ex = ex.with_request_id(request_id);
        }
        ex.with_candidates(err.setting_paths)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse {
            reason: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_kind_codes() {
        let cases = [
            (
                ExErrorKind::CyclicTemplateInheritance,
                "ERR_CYCLIC_TEMPLATE_INHERITANCE",
            ),
            (ExErrorKind::UnknownTemplate, "ERR_UNKNOWN_TEMPLATE"),
            (ExErrorKind::UnknownPolicy, "ERR_UNKNOWN_POLICY"),
            (ExErrorKind::UnknownRuleType, "ERR_UNKNOWN_RULE_TYPE"),
            (ExErrorKind::Cancelled, "ERR_CANCELLED"),
            (ExErrorKind::ApplyFailed, "ERR_APPLY_FAILED"),
        ];
        for (kind, expected_code) in cases {
            assert_eq!(kind.code(), expected_code, "Wrong code for {:?}", kind);
        }
    }

    #[test]
    fn test_cycle_converts_with_candidates() {
        let err: ExError = ConfigError::CyclicTemplateInheritance {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        }
        .into();
        assert_eq!(err.kind(), ExErrorKind::CyclicTemplateInheritance);
        assert_eq!(err.entity_id(), Some("a"));
        assert_eq!(err.candidates().map(|c| c.len()), Some(3));
        assert!(err.kind().is_fatal());
    }

    #[test]
    fn test_unknown_rule_type_is_not_fatal() {
        assert!(!ExErrorKind::UnknownRuleType.is_fatal());
        assert!(!ExErrorKind::Forbidden.is_fatal());
    }

    #[test]
    fn test_remote_error_transience() {
        assert!(RemoteError::RateLimited {
            retry_after_secs: Some(3)
        }
        .is_transient());
        assert!(RemoteError::ServerError {
            status: 502,
            message: "bad gateway".into()
        }
        .is_transient());
        assert!(!RemoteError::NotFound {
            resource: "repos/acme/x".into()
        }
        .is_transient());
        assert!(RemoteError::Cancelled.is_cancelled());
    }

    #[test]
    fn test_apply_error_carries_source_and_paths() {
        let err = ApplyError {
            repo: "svc-a".into(),
            group: "branch_protection.main".into(),
            setting_paths: vec!["branch_protection.main.enforce_admins".into()],
            source: RemoteError::Forbidden {
                resource: "repos/svc-a/branches/main/protection".into(),
            },
            run_id: Some(RunId::from_string("run-7".into())),
            request_id: Some(RequestId::from_string("req-7".into())),
        };
        let ex: ExError = err.into();
        assert_eq!(ex.run_id().map(RunId::as_str), Some("run-7"));
        assert_eq!(ex.request_id().map(RequestId::as_str), Some("req-7"));
        assert_eq!(ex.code(), "ERR_APPLY_FAILED");
        assert_eq!(ex.repo(), Some("svc-a"));
        assert_eq!(
            ex.source_error().map(|s| s.kind()),
            Some(ExErrorKind::Forbidden)
        );
    }

    #[test]
    fn test_display_includes_code_and_repo() {
        let err = ExError::new(ExErrorKind::NotFound)
            .with_op("get_repository")
            .with_repo("svc-b")
            .with_message("gone");
        let text = err.to_string();
        assert!(text.starts_with("[ERR_NOT_FOUND]"));
        assert!(text.contains("svc-b"));
    }
}
