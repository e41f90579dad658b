//! Drift analysis: resolved template vs live state
//!
//! Only fields the template declares are compared. Keyed collections
//! (branch protection by branch, webhooks by URL, permissions by name) use
//! `add` for a declared key missing live and `update` for a differing
//! sub-field. A live key the template does not declare is reported as
//! `remove` only when the template manages that collection exclusively.
//!
//! Output is sorted High -> Medium -> Low, then by repository and path.

pub mod impact;

pub use impact::classify_impact;

use crate::errors::RemoteError;
use crate::model::state::setting_matches;
use crate::model::{
    ChangeType, DiffEntry, KeyedCollection, RepositoryState, ResolvedTemplate, SettingPath,
};
use crate::resolve::ResolvedAssignments;
use crate::{log_op_end, log_op_start};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;

/// Diff one repository against its resolved template
pub fn diff_repository(
    repo: &str,
    target: &ResolvedTemplate,
    state: &RepositoryState,
) -> Vec<DiffEntry> {
    let start = Instant::now();
    log_op_start!("diff_repository", repo = repo, template_id = target.id.as_str());

    let mut out = DiffCollector::new(repo);

    for (key, want) in &target.settings {
        out.compare(SettingPath::Setting(key.clone()), state.settings.get(key), want);
    }

    for (name, want) in target.security.declared_toggles() {
        let have = state.security.toggle(name).map(Value::Bool);
        out.compare(
            SettingPath::Security(name.to_string()),
            have.as_ref(),
            &Value::Bool(want),
        );
    }

    diff_branch_protection(&mut out, target, state);
    diff_webhooks(&mut out, target, state);
    diff_permissions(
        &mut out,
        &target.permissions.teams,
        &state.permissions.teams,
        target.is_exclusive(KeyedCollection::TeamPermissions),
        SettingPath::TeamPermission,
    );
    diff_permissions(
        &mut out,
        &target.permissions.users,
        &state.permissions.users,
        target.is_exclusive(KeyedCollection::UserPermissions),
        SettingPath::UserPermission,
    );

    let mut entries = out.entries;
    sort_entries(&mut entries);
    log_op_end!(
        "diff_repository",
        duration_ms = start.elapsed().as_millis() as u64,
        repo = repo,
        diff_count = entries.len()
    );
    entries
}

/// Diff every repository that has a template and a fetched state
///
/// Repositories whose fetch failed are returned separately so callers can
/// report them without aborting.
pub fn diff(
    resolved: &ResolvedAssignments,
    live_states: &BTreeMap<String, Result<RepositoryState, RemoteError>>,
) -> (Vec<DiffEntry>, Vec<(String, RemoteError)>) {
    let mut entries = Vec::new();
    let mut failures = Vec::new();

    for assignment in &resolved.assignments {
        let Some(template) = resolved.template_for(assignment) else {
            continue;
        };
        match live_states.get(&assignment.repo_name) {
            Some(Ok(state)) => {
                entries.extend(diff_repository(&assignment.repo_name, template, state))
            }
            Some(Err(err)) => failures.push((assignment.repo_name.clone(), err.clone())),
            None => failures.push((
                assignment.repo_name.clone(),
                RemoteError::NotFound {
                    resource: assignment.repo_name.clone(),
                },
            )),
        }
    }

    sort_entries(&mut entries);
    (entries, failures)
}

/// High impact first; ties broken by repository then path
pub fn sort_entries(entries: &mut [DiffEntry]) {
    entries.sort_by(|a, b| {
        b.impact
            .cmp(&a.impact)
            .then_with(|| a.repo.cmp(&b.repo))
            .then_with(|| a.setting_path.cmp(&b.setting_path))
    });
}

struct DiffCollector<'a> {
    repo: &'a str,
    entries: Vec<DiffEntry>,
}

impl<'a> DiffCollector<'a> {
    fn new(repo: &'a str) -> Self {
        Self {
            repo,
            entries: Vec::new(),
        }
    }

    fn push(&mut self, path: SettingPath, current: Value, target: Value, change_type: ChangeType) {
        let setting_path = path.to_string();
        self.entries.push(DiffEntry {
            repo: self.repo.to_string(),
            impact: classify_impact(&setting_path),
            setting_path,
            current_value: current,
            target_value: target,
            change_type,
        });
    }

    /// Emit `add` when the live side is absent, `update` when it differs
    fn compare(&mut self, path: SettingPath, have: Option<&Value>, want: &Value) {
        match have {
            Some(have) if setting_matches(want, have) => {}
            Some(have) => self.push(path, have.clone(), want.clone(), ChangeType::Update),
            None if want.is_null() => {}
            None => self.push(path, Value::Null, want.clone(), ChangeType::Add),
        }
    }
}

fn diff_branch_protection(
    out: &mut DiffCollector<'_>,
    target: &ResolvedTemplate,
    state: &RepositoryState,
) {
    let live = &state.security.branch_protection;
    for (branch, rule) in &target.security.branch_protection {
        let declared = rule.declared();
        match live.get(branch) {
            None => out.push(
                SettingPath::BranchProtection {
                    branch: branch.clone(),
                    field: None,
                },
                Value::Null,
                Value::Object(declared),
                ChangeType::Add,
            ),
            Some(live_rule) => {
                let live_fields = live_rule.declared();
                for (field, want) in &declared {
                    out.compare(
                        SettingPath::BranchProtection {
                            branch: branch.clone(),
                            field: Some(field.clone()),
                        },
                        live_fields.get(field),
                        want,
                    );
                }
            }
        }
    }

    if target.is_exclusive(KeyedCollection::BranchProtection) {
        for (branch, live_rule) in live {
            if !target.security.branch_protection.contains_key(branch) {
                out.push(
                    SettingPath::BranchProtection {
                        branch: branch.clone(),
                        field: None,
                    },
                    Value::Object(live_rule.declared()),
                    Value::Null,
                    ChangeType::Remove,
                );
            }
        }
    }
}

fn diff_webhooks(out: &mut DiffCollector<'_>, target: &ResolvedTemplate, state: &RepositoryState) {
    for hook in &target.webhooks {
        let declared = hook.declared();
        match state.webhook(&hook.url) {
            None => out.push(
                SettingPath::Webhook {
                    url: hook.url.clone(),
                    field: None,
                },
                Value::Null,
                Value::Object(declared),
                ChangeType::Add,
            ),
            Some(live) => {
                let live_fields = live.declared();
                for (field, want) in &declared {
                    out.compare(
                        SettingPath::Webhook {
                            url: hook.url.clone(),
                            field: Some(field.clone()),
                        },
                        live_fields.get(field),
                        want,
                    );
                }
            }
        }
    }

    if target.is_exclusive(KeyedCollection::Webhooks) {
        for live in &state.webhooks {
            if target.webhook(&live.url).is_none() {
                out.push(
                    SettingPath::Webhook {
                        url: live.url.clone(),
                        field: None,
                    },
                    Value::Object(live.declared()),
                    Value::Null,
                    ChangeType::Remove,
                );
            }
        }
    }
}

fn diff_permissions(
    out: &mut DiffCollector<'_>,
    declared: &BTreeMap<String, String>,
    live: &BTreeMap<String, String>,
    exclusive: bool,
    path: fn(String) -> SettingPath,
) {
    for (name, level) in declared {
        let want = Value::String(level.clone());
        let have = live.get(name).map(|l| Value::String(l.clone()));
        out.compare(path(name.clone()), have.as_ref(), &want);
    }
    if exclusive {
        for (name, level) in live {
            if !declared.contains_key(name) {
                out.push(
                    path(name.clone()),
                    Value::String(level.clone()),
                    Value::Null,
                    ChangeType::Remove,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BranchProtectionRule, Impact, Webhook};
    use serde_json::json;

    fn target() -> ResolvedTemplate {
        ResolvedTemplate {
            id: "secure".into(),
            lineage: vec!["secure".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_undeclared_live_fields_are_ignored() {
        let mut t = target();
        t.settings.insert("has_issues".into(), json!(true));

        let mut state = RepositoryState::new("svc");
        state.settings.insert("has_issues".into(), json!(true));
        state.settings.insert("has_wiki".into(), json!(true));
        state.settings.insert("homepage".into(), json!("https://x"));

        assert!(diff_repository("svc", &t, &state).is_empty());
    }

    #[test]
    fn test_missing_branch_rule_is_one_add() {
        let mut t = target();
        t.security.branch_protection.insert(
            "main".into(),
            BranchProtectionRule {
                required_reviews: Some(2),
                enforce_admins: Some(true),
                ..Default::default()
            },
        );
        let entries = diff_repository("svc", &t, &RepositoryState::new("svc"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].setting_path, "branch_protection.main");
        assert_eq!(entries[0].change_type, ChangeType::Add);
        assert_eq!(entries[0].impact, Impact::High);
        assert_eq!(
            entries[0].target_value,
            json!({"enforce_admins": true, "required_reviews": 2})
        );
    }

    #[test]
    fn test_branch_subfield_update() {
        let mut t = target();
        t.security.branch_protection.insert(
            "main".into(),
            BranchProtectionRule {
                required_reviews: Some(2),
                ..Default::default()
            },
        );
        let mut state = RepositoryState::new("svc");
        state.security.branch_protection.insert(
            "main".into(),
            BranchProtectionRule {
                required_reviews: Some(1),
                allow_force_pushes: Some(true),
                ..Default::default()
            },
        );
        let entries = diff_repository("svc", &t, &state);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].setting_path, "branch_protection.main.required_reviews");
        assert_eq!(entries[0].change_type, ChangeType::Update);
        assert_eq!(entries[0].current_value, json!(1));
        assert_eq!(entries[0].impact, Impact::Medium);
    }

    #[test]
    fn test_exclusive_webhooks_report_removals() {
        let mut t = target();
        t.webhooks.push(Webhook::new("https://ci.example.com/a"));
        let mut state = RepositoryState::new("svc");
        state.webhooks.push(Webhook::new("https://ci.example.com/a"));
        state.webhooks.push(Webhook::new("https://old.example.com/b"));

        assert!(diff_repository("svc", &t, &state).is_empty());

        t.exclusive.insert(KeyedCollection::Webhooks);
        let entries = diff_repository("svc", &t, &state);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].change_type, ChangeType::Remove);
        assert_eq!(entries[0].setting_path, "webhooks.https://old.example.com/b");
    }

    #[test]
    fn test_output_ordered_by_impact() {
        let mut t = target();
        t.settings.insert("description".into(), json!("payments"));
        t.settings.insert("visibility".into(), json!("private"));
        t.settings.insert("allow_squash_merge".into(), json!(true));
        t.permissions.teams.insert("platform".into(), "admin".into());

        let mut state = RepositoryState::new("svc");
        state.settings.insert("description".into(), json!(""));
        state.settings.insert("visibility".into(), json!("public"));
        state.settings.insert("allow_squash_merge".into(), json!(false));

        let impacts: Vec<Impact> = diff_repository("svc", &t, &state)
            .iter()
            .map(|e| e.impact)
            .collect();
        assert_eq!(
            impacts,
            vec![Impact::High, Impact::Medium, Impact::Medium, Impact::Low]
        );
    }

    #[test]
    fn test_permission_add_and_update() {
        let mut t = target();
        t.permissions.teams.insert("platform".into(), "admin".into());
        t.permissions.users.insert("octocat".into(), "push".into());
        let mut state = RepositoryState::new("svc");
        state.permissions.teams.insert("platform".into(), "pull".into());

        let entries = diff_repository("svc", &t, &state);
        let by_path: BTreeMap<_, _> = entries
            .iter()
            .map(|e| (e.setting_path.as_str(), e.change_type))
            .collect();
        assert_eq!(by_path["permissions.teams.platform"], ChangeType::Update);
        assert_eq!(by_path["permissions.users.octocat"], ChangeType::Add);
    }
}
