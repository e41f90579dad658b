//! Field keys and event names shared by every structured log line
//!
//! `tracing` takes field names as identifiers, so emitters spell them out;
//! these constants are what consumers (log pipelines, the test capture
//! layer) match on.

/// Field keys
pub mod field {
    pub const COMPONENT: &str = "component";
    pub const OP: &str = "op";
    pub const EVENT: &str = "event";
    pub const DURATION_MS: &str = "duration_ms";
    pub const RUN_ID: &str = "run_id";
    pub const REQUEST_ID: &str = "request_id";

    pub const REPO: &str = "repo";
    pub const TEMPLATE_ID: &str = "template_id";
    pub const POLICY_ID: &str = "policy_id";
    pub const GROUP: &str = "group";

    pub const REPO_COUNT: &str = "repo_count";
    pub const VIOLATION_COUNT: &str = "violation_count";
    pub const DIFF_COUNT: &str = "diff_count";
    pub const WRITE_CALLS: &str = "write_calls";

    /// Retry number, starting at 1
    pub const ATTEMPT: &str = "attempt";
    pub const DELAY_MS: &str = "delay_ms";

    pub const ERR_KIND: &str = "err_kind";
    pub const ERR_CODE: &str = "err_code";
}

/// Values of the `event` field
pub mod event {
    pub const START: &str = "start";
    pub const END: &str = "end";
    pub const END_ERROR: &str = "end_error";

    /// Whether `name` closes an operation, successfully or not
    pub fn is_terminal(name: &str) -> bool {
        name == END || name == END_ERROR
    }
}
