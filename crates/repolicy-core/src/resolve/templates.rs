//! Template inheritance resolution
//!
//! Each template names at most one `base`, so the inheritance graph is a
//! forest of chains. A template is resolved by walking up its chain until a
//! root or an already-resolved ancestor is reached, then folding the walked
//! templates back down in root-to-leaf order. Resolved templates are memoized,
//! so every template is merged exactly once.
//!
//! Merge rules, applied child over parent:
//! - scalars (settings values, security toggles, branch-rule fields) override
//! - maps (settings, branch protection, permissions) merge key-wise
//! - lists concatenate with duplicates dropped, unless the child lists the
//!   field in its `override` marker, in which case the child's list replaces
//!   the parent's

#![allow(clippy::result_large_err)]

use crate::errors::{ConfigError, Result};
use crate::model::template::{
    BranchProtectionRule, ListField, ResolvedTemplate, Template, Webhook,
};
use std::collections::{BTreeMap, BTreeSet};

/// Flatten every template's inheritance chain
///
/// Fails without partial output on a cycle, a dangling `base`, or a chain
/// longer than `max_depth` templates.
pub fn resolve_templates(
    raw: &BTreeMap<String, Template>,
    max_depth: usize,
) -> Result<BTreeMap<String, ResolvedTemplate>> {
    let mut resolved: BTreeMap<String, ResolvedTemplate> = BTreeMap::new();

    for id in raw.keys() {
        if resolved.contains_key(id) {
            continue;
        }

        // Walk towards the root, stopping at the first memoized ancestor.
        let mut chain: Vec<(&str, &Template)> = Vec::new();
        let mut in_progress: BTreeSet<&str> = BTreeSet::new();
        let mut cursor: &str = id;
        let mut referenced_by: Option<&str> = None;

        loop {
            if resolved.contains_key(cursor) {
                break;
            }
            if !in_progress.insert(cursor) {
                let start = chain
                    .iter()
                    .position(|(member, _)| *member == cursor)
                    .unwrap_or(0);
                let mut cycle: Vec<String> =
                    chain[start..].iter().map(|(m, _)| m.to_string()).collect();
                cycle.push(cursor.to_string());
                return Err(ConfigError::CyclicTemplateInheritance { cycle });
            }

            let template = raw.get(cursor).ok_or_else(|| ConfigError::UnknownTemplate {
                template_id: cursor.to_string(),
                referenced_by: format!("template '{}'", referenced_by.unwrap_or(id.as_str())),
            })?;
            chain.push((cursor, template));

            match template.base.as_deref() {
                Some(parent) => {
                    referenced_by = Some(cursor);
                    cursor = parent;
                }
                None => break,
            }
        }

        for (member, template) in chain.into_iter().rev() {
            let parent = template.base.as_deref().and_then(|b| resolved.get(b));
            let depth = parent.map_or(0, |p| p.lineage.len()) + 1;
            if depth > max_depth {
                return Err(ConfigError::InheritanceTooDeep {
                    template_id: member.to_string(),
                    max_depth,
                });
            }
            let flattened = inherit(parent, member, template);
            resolved.insert(member.to_string(), flattened);
        }
    }

    Ok(resolved)
}

/// Merge `own` on top of an already-flattened parent
fn inherit(parent: Option<&ResolvedTemplate>, id: &str, own: &Template) -> ResolvedTemplate {
    let mut out = parent.cloned().unwrap_or_default();
    let replaces = |field: ListField| own.override_lists.contains(&field);

    out.id = id.to_string();
    out.lineage.push(id.to_string());
    if own.description.is_some() {
        out.description = own.description.clone();
    }

    for (key, value) in &own.settings {
        out.settings.insert(key.clone(), value.clone());
    }

    let security = &own.security;
    for (name, value) in security.declared_toggles() {
        out.security.set_toggle(name, value);
    }
    for (branch, rule) in &security.branch_protection {
        let merged = match out.security.branch_protection.remove(branch) {
            Some(base) => overlay_branch_rule(base, rule, replaces(ListField::RequiredStatusChecks)),
            None => rule.clone(),
        };
        out.security.branch_protection.insert(branch.clone(), merged);
    }

    for (team, level) in &own.permissions.teams {
        out.permissions.teams.insert(team.clone(), level.clone());
    }
    for (user, level) in &own.permissions.users {
        out.permissions.users.insert(user.clone(), level.clone());
    }

    if replaces(ListField::Webhooks) {
        out.webhooks.clear();
    }
    for hook in &own.webhooks {
        upsert_webhook(&mut out.webhooks, hook);
    }

    if replaces(ListField::RequiredFiles) {
        out.required_files.clear();
    }
    extend_unique(&mut out.required_files, &own.required_files);

    if replaces(ListField::Exclusive) {
        out.exclusive.clear();
    }
    out.exclusive.extend(own.exclusive.iter().copied());
    out
}

fn overlay_branch_rule(
    mut base: BranchProtectionRule,
    child: &BranchProtectionRule,
    replace_checks: bool,
) -> BranchProtectionRule {
    macro_rules! take {
        ($($field:ident),*) => {
            $(base.$field = child.$field.or(base.$field);)*
        };
    }
    take!(
        required_reviews,
        dismiss_stale_reviews,
        require_code_owner_reviews,
        strict_status_checks,
        restrict_pushes,
        enforce_admins,
        require_conversation_resolution,
        allow_force_pushes,
        allow_deletions
    );

    if let Some(checks) = &child.required_status_checks {
        match (&mut base.required_status_checks, replace_checks) {
            (Some(existing), false) => extend_unique(existing, checks),
            (slot, _) => *slot = Some(checks.clone()),
        }
    }
    base
}

/// Webhooks are keyed by URL: a redeclared URL replaces the inherited hook
/// in place
fn upsert_webhook(hooks: &mut Vec<Webhook>, hook: &Webhook) {
    match hooks.iter_mut().find(|h| h.url == hook.url) {
        Some(existing) => *existing = hook.clone(),
        None => hooks.push(hook.clone()),
    }
}

fn extend_unique(target: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template(base: Option<&str>) -> Template {
        Template {
            base: base.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_lineage_is_root_to_leaf() {
        let mut raw = BTreeMap::new();
        raw.insert("a".to_string(), template(None));
        raw.insert("b".to_string(), template(Some("a")));
        raw.insert("c".to_string(), template(Some("b")));

        let resolved = resolve_templates(&raw, 10).unwrap();
        assert_eq!(resolved["c"].lineage, vec!["a", "b", "c"]);
        assert_eq!(resolved["a"].lineage, vec!["a"]);
    }

    #[test]
    fn test_depth_limit_counts_templates() {
        let mut raw = BTreeMap::new();
        raw.insert("t0".to_string(), template(None));
        for i in 1..5 {
            raw.insert(format!("t{}", i), template(Some(&format!("t{}", i - 1))));
        }

        assert!(resolve_templates(&raw, 5).is_ok());
        let err = resolve_templates(&raw, 4).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InheritanceTooDeep {
                template_id: "t4".into(),
                max_depth: 4
            }
        );
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut raw = BTreeMap::new();
        raw.insert("loop".to_string(), template(Some("loop")));
        let err = resolve_templates(&raw, 10).unwrap_err();
        assert_eq!(
            err,
            ConfigError::CyclicTemplateInheritance {
                cycle: vec!["loop".into(), "loop".into()]
            }
        );
    }

    #[test]
    fn test_status_checks_concatenate_unless_overridden() {
        let parent_rule = BranchProtectionRule {
            required_status_checks: Some(vec!["build".into()]),
            required_reviews: Some(1),
            ..Default::default()
        };
        let child_rule = BranchProtectionRule {
            required_status_checks: Some(vec!["lint".into(), "build".into()]),
            ..Default::default()
        };

        let merged = overlay_branch_rule(parent_rule.clone(), &child_rule, false);
        assert_eq!(
            merged.required_status_checks,
            Some(vec!["build".to_string(), "lint".to_string()])
        );
        assert_eq!(merged.required_reviews, Some(1));

        let replaced = overlay_branch_rule(parent_rule, &child_rule, true);
        assert_eq!(
            replaced.required_status_checks,
            Some(vec!["lint".to_string(), "build".to_string()])
        );
    }

    #[test]
    fn test_settings_override_keywise() {
        let mut base = template(None);
        base.settings.insert("has_wiki".into(), json!(true));
        base.settings.insert("description".into(), json!("org default"));
        let mut child = template(Some("base"));
        child.settings.insert("has_wiki".into(), json!(false));

        let mut raw = BTreeMap::new();
        raw.insert("base".to_string(), base);
        raw.insert("child".to_string(), child);

        let resolved = resolve_templates(&raw, 10).unwrap();
        let child = &resolved["child"];
        assert_eq!(child.settings["has_wiki"], json!(false));
        assert_eq!(child.settings["description"], json!("org default"));
    }
}
