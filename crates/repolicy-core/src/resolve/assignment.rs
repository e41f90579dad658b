//! Repository to template/policy assignment
//!
//! Templates are exclusive: explicit name, then the first matching pattern
//! that names a template, then the default. Policies are additive: every
//! applicable source contributes, de-duplicated in first-seen order.

#![allow(clippy::result_large_err)]

use super::pattern::RepoPattern;
use crate::errors::ConfigError;
use crate::model::{
    AssignmentRules, AssignmentSource, Policy, RepositoryAssignment, ResolvedTemplate,
};
use std::collections::BTreeMap;

pub struct AssignmentResolver<'a> {
    rules: &'a AssignmentRules,
    patterns: Vec<RepoPattern>,
}

impl<'a> AssignmentResolver<'a> {
    /// Compile patterns and check every template/policy reference
    pub fn new(
        rules: &'a AssignmentRules,
        templates: &BTreeMap<String, ResolvedTemplate>,
        policies: &BTreeMap<String, Policy>,
    ) -> Result<Self, ConfigError> {
        let check_template = |id: &Option<String>, referenced_by: String| match id {
            Some(id) if !templates.contains_key(id) => Err(ConfigError::UnknownTemplate {
                template_id: id.clone(),
                referenced_by,
            }),
            _ => Ok(()),
        };
        let check_policies = |ids: &[String], referenced_by: String| {
            match ids.iter().find(|id| !policies.contains_key(*id)) {
                Some(id) => Err(ConfigError::UnknownPolicy {
                    policy_id: id.clone(),
                    referenced_by,
                }),
                None => Ok(()),
            }
        };

        for entry in &rules.specific {
            let origin = format!("repository '{}'", entry.name);
            check_template(&entry.template, origin.clone())?;
            check_policies(&entry.policies, origin)?;
        }

        let mut patterns = Vec::with_capacity(rules.patterns.len());
        for entry in &rules.patterns {
            let origin = format!("pattern '{}'", entry.pattern);
            check_template(&entry.template, origin.clone())?;
            check_policies(&entry.policies, origin)?;
            patterns.push(RepoPattern::compile(&entry.pattern)?);
        }

        if let Some(default) = &rules.default {
            check_template(&default.template, "default assignment".to_string())?;
            check_policies(&default.policies, "default assignment".to_string())?;
        }

        Ok(Self { rules, patterns })
    }

    pub fn resolve(&self, repo: &str) -> RepositoryAssignment {
        let specific: Vec<_> = self
            .rules
            .specific
            .iter()
            .filter(|entry| entry.name == repo)
            .collect();
        let matching: Vec<_> = self
            .rules
            .patterns
            .iter()
            .zip(&self.patterns)
            .filter(|(_, compiled)| compiled.matches(repo))
            .map(|(entry, _)| entry)
            .collect();

        if matching.len() > 1 {
            let names: Vec<&str> = matching.iter().map(|p| p.pattern.as_str()).collect();
            tracing::warn!(
                repo = repo,
                patterns = ?names,
                "repository matches multiple patterns; first template match wins"
            );
        }

        let explicit = specific
            .iter()
            .find_map(|entry| entry.template.clone())
            .map(|t| (t, AssignmentSource::Explicit));
        let by_pattern = || {
            matching.iter().find_map(|entry| {
                entry.template.clone().map(|t| {
                    (
                        t,
                        AssignmentSource::Pattern {
                            pattern: entry.pattern.clone(),
                        },
                    )
                })
            })
        };
        let by_default = || {
            self.rules
                .default
                .as_ref()
                .and_then(|d| d.template.clone())
                .map(|t| (t, AssignmentSource::Default))
        };
        let template = explicit.or_else(by_pattern).or_else(by_default);

        let mut policy_ids: Vec<String> = Vec::new();
        let sources = specific
            .iter()
            .map(|e| &e.policies)
            .chain(matching.iter().map(|e| &e.policies))
            .chain(self.rules.default.iter().map(|d| &d.policies));
        for ids in sources {
            for id in ids {
                if !policy_ids.contains(id) {
                    policy_ids.push(id.clone());
                }
            }
        }

        let (resolved_template_id, template_source) = match template {
            Some((id, source)) => (Some(id), Some(source)),
            None => (None, None),
        };
        RepositoryAssignment {
            repo_name: repo.to_string(),
            resolved_template_id,
            template_source,
            policy_ids,
        }
    }
}
