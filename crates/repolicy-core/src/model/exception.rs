//! Documented, time-bounded waivers for specific violations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exception {
    pub policy_id: String,
    pub rule_id: String,
    pub repo: String,
    pub reason: String,
    pub approver: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Exception {
    /// An exception without an expiry never lapses
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires| expires > now)
    }
}
