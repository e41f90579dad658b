//! Redacting wrapper for webhook secrets
//!
//! Templates may declare a secret alongside a webhook URL. The value must
//! reach the remote write and nowhere else: `Debug` and `Display` print a
//! fixed marker, and drift entries compare webhooks without it.

use serde::{Deserialize, Deserializer};
use std::fmt;

const REDACTED: &str = "***REDACTED***";

/// A value that never shows up in formatted output
///
/// ```
/// use repolicy_core_types::Sensitive;
///
/// let secret = Sensitive::new("hook-secret".to_string());
/// assert_eq!(format!("{:?}", secret), "***REDACTED***");
/// assert_eq!(secret.expose(), "hook-secret");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Sensitive<T>(T);

impl<T> Sensitive<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the secret for the outgoing request
    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T> fmt::Display for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

// Deserialize only: a spec file can carry a secret, but nothing we emit
// (reports, diff entries, patches) may serialize one back out.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Sensitive<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Self)
    }
}
