//! Repository name patterns
//!
//! Glob syntax (`*`, `?`) is anchored and compiled to a regex. A pattern that
//! starts with `^` is taken as a regex verbatim.

#![allow(clippy::result_large_err)]

use crate::errors::ConfigError;
use regex::Regex;

#[derive(Debug, Clone)]
pub struct RepoPattern {
    source: String,
    regex: Regex,
}

impl RepoPattern {
    pub fn compile(pattern: &str) -> Result<Self, ConfigError> {
        if pattern.is_empty() {
            return Err(ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern is empty".to_string(),
            });
        }
        let expr = if pattern.starts_with('^') {
            pattern.to_string()
        } else {
            glob_to_regex(pattern)
        };
        let regex = Regex::new(&expr).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, repo: &str) -> bool {
        self.regex.is_match(repo)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut expr = String::with_capacity(glob.len() + 8);
    expr.push('^');
    for ch in glob.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    expr.push('$');
    expr
}
