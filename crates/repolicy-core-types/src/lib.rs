//! Leaf types for repolicy
//!
//! Nothing here knows about templates or policies. The crate exists so the
//! error and logging layers of `repolicy-core` can agree on run identifiers,
//! secret handling and log field names without depending on each other.

pub mod correlation;
pub mod schema;
pub mod sensitive;

pub use correlation::{RequestContext, RequestId, RunId};
pub use sensitive::Sensitive;
