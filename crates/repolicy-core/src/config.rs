//! Engine configuration
//!
//! One explicit value threaded through resolve, evaluate, diff and apply.
//! Resolution order (highest priority first):
//! 1. Environment variables (`REPOLICY_*`)
//! 2. TOML document passed to `from_toml_str`
//! 3. Compiled defaults

use crate::errors::ConfigError;
use crate::model::Severity;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_INHERITANCE_DEPTH: usize = 10;
pub const DEFAULT_COMPLIANT_THRESHOLD: u32 = 80;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker pool size; `None` means available parallelism
    pub concurrency: Option<usize>,
    pub max_inheritance_depth: usize,
    /// Reject unknown rule types during resolve instead of per repository
    pub strict_rule_types: bool,
    /// Branch used by branch rules that do not name one
    pub default_branch: String,
    pub scoring: ScoringConfig,
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: None,
            max_inheritance_depth: DEFAULT_MAX_INHERITANCE_DEPTH,
            strict_rule_types: false,
            default_branch: "main".to_string(),
            scoring: ScoringConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: SeverityWeights,
    /// Minimum score for a repository to count as compliant
    pub compliant_threshold: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: SeverityWeights::default(),
            compliant_threshold: DEFAULT_COMPLIANT_THRESHOLD,
        }
    }
}

/// Score penalty per non-suppressed required violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityWeights {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            critical: 25,
            high: 15,
            medium: 7,
            low: 3,
        }
    }
}

impl SeverityWeights {
    pub fn weight(&self, severity: Severity) -> u32 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}

/// Retry and backoff settings for the rate-limited client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter: true,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(toml_str)?;
        Ok(config)
    }

    /// Effective worker pool size
    pub fn worker_count(&self) -> usize {
        self.concurrency.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == Some(0) {
            return Err(invalid("concurrency", "must be greater than 0"));
        }
        if self.max_inheritance_depth == 0 {
            return Err(invalid("max_inheritance_depth", "must be greater than 0"));
        }
        if self.scoring.compliant_threshold > 100 {
            return Err(invalid(
                "scoring.compliant_threshold",
                "must be between 0 and 100",
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(invalid(
                "retry.base_delay_ms",
                "must not exceed retry.max_delay_ms",
            ));
        }
        if self.default_branch.trim().is_empty() {
            return Err(invalid("default_branch", "must not be empty"));
        }
        Ok(())
    }

    /// Apply `REPOLICY_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (environment or test map)
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("REPOLICY_CONCURRENCY") {
            self.concurrency = Some(parse_env("REPOLICY_CONCURRENCY", &raw)?);
        }
        if let Some(raw) = lookup("REPOLICY_MAX_DEPTH") {
            self.max_inheritance_depth = parse_env("REPOLICY_MAX_DEPTH", &raw)?;
        }
        if let Some(raw) = lookup("REPOLICY_COMPLIANT_THRESHOLD") {
            self.scoring.compliant_threshold = parse_env("REPOLICY_COMPLIANT_THRESHOLD", &raw)?;
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidConfig {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidConfig {
        field: key.to_string(),
        reason: format!("cannot parse '{}'", raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_inheritance_depth, 10);
        assert_eq!(config.scoring.compliant_threshold, 80);
        assert_eq!(config.scoring.weights.weight(Severity::High), 15);
        assert!(config.worker_count() >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            concurrency = 3

            [scoring.weights]
            critical = 40
            "#,
        )
        .unwrap();
        assert_eq!(config.worker_count(), 3);
        assert_eq!(config.scoring.weights.critical, 40);
        assert_eq!(config.scoring.weights.high, 15);
        assert_eq!(config.retry.max_retries, 5);
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = EngineConfig::from_toml_str("concurrency = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.scoring.compliant_threshold = 101;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidConfig { ref field, .. } if field == "scoring.compliant_threshold"
        ));

        let mut config = EngineConfig::default();
        config.concurrency = Some(0);
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.retry.base_delay_ms = 60_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("REPOLICY_CONCURRENCY", "7"),
            ("REPOLICY_COMPLIANT_THRESHOLD", "90"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config
            .apply_overrides_from(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.concurrency, Some(7));
        assert_eq!(config.scoring.compliant_threshold, 90);
        assert_eq!(config.max_inheritance_depth, 10);
    }

    #[test]
    fn test_override_parse_failure() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_overrides_from(|key| (key == "REPOLICY_MAX_DEPTH").then(|| "deep".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig { .. }));
    }
}
