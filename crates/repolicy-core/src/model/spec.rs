//! The declarative spec document consumed by `resolve`
//!
//! Loading it from YAML or JSON is the caller's job; this is the shape it
//! deserializes into.

use super::{AssignmentRules, Exception, Policy, Template};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecDocument {
    pub version: Option<String>,
    pub organization: String,
    pub templates: BTreeMap<String, Template>,
    pub policies: BTreeMap<String, Policy>,
    pub repositories: AssignmentRules,
    pub exceptions: Vec<Exception>,
}
