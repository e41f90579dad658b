//! Run and request identifiers
//!
//! One engine invocation carries a `RunId` on every log line it emits.
//! Each remote read or write inside the run additionally gets a
//! `RequestId`, so interleaved output from the worker pool can be pulled
//! apart afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_v7_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Adopt an identifier minted elsewhere, e.g. by a CI job
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

uuid_v7_id!(
    /// Identifies one resolve/evaluate/diff/apply invocation
    RunId
);

uuid_v7_id!(
    /// Identifies one remote call within a run
    RequestId
);

/// Correlation state threaded through the engine
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub run_id: RunId,
    pub request_id: Option<RequestId>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run_id(run_id: RunId) -> Self {
        Self {
            run_id,
            request_id: None,
        }
    }

    /// Same run, fresh request id
    pub fn for_request(&self) -> Self {
        Self {
            run_id: self.run_id.clone(),
            request_id: Some(RequestId::new()),
        }
    }
}
