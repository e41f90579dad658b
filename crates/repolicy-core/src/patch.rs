//! Patch planning
//!
//! Groups one repository's diff entries into the write payloads the remote
//! accepts: a single repository-level partial update plus one partial
//! update per protected branch. Every entry lands in exactly one group, so
//! apply can report outcomes per setting path.

use crate::model::{
    BranchProtectionRule, ChangeType, DiffEntry, RepositoryState, ResolvedTemplate, SettingPath,
    Webhook,
};
use repolicy_core_types::Sensitive;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Name of the repository-level write group
pub const REPOSITORY_GROUP: &str = "repository";

/// A change to one webhook, keyed by URL
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookChange {
    pub url: String,
    pub change: ChangeType,
    /// Declared fields to set; empty for removals
    pub fields: Map<String, Value>,
    /// Only present when the template declares one for a new hook
    #[serde(skip)]
    pub secret: Option<Sensitive<String>>,
}

/// Repository-level partial update
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepositoryPatch {
    pub settings: BTreeMap<String, Value>,
    pub security: BTreeMap<String, Value>,
    /// `None` revokes access
    pub team_permissions: BTreeMap<String, Option<String>>,
    pub user_permissions: BTreeMap<String, Option<String>>,
    pub webhooks: Vec<WebhookChange>,
    pub setting_paths: Vec<String>,
}

impl RepositoryPatch {
    pub fn is_empty(&self) -> bool {
        self.setting_paths.is_empty()
    }

    fn webhook_mut(&mut self, url: &str, change: ChangeType) -> &mut WebhookChange {
        let idx = match self.webhooks.iter().position(|w| w.url == url) {
            Some(idx) => idx,
            None => {
                self.webhooks.push(WebhookChange {
                    url: url.to_string(),
                    change,
                    fields: Map::new(),
                    secret: None,
                });
                self.webhooks.len() - 1
            }
        };
        &mut self.webhooks[idx]
    }
}

/// Partial update of one branch's protection rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchProtectionPatch {
    pub branch: String,
    /// `Add` creates the rule, `Update` overlays fields, `Remove` deletes it
    pub change: ChangeType,
    pub settings: Map<String, Value>,
    pub setting_paths: Vec<String>,
}

impl BranchProtectionPatch {
    pub fn group(&self) -> String {
        format!("branch_protection.{}", self.branch)
    }
}

/// Everything apply will send for one repository
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchPlan {
    pub repo: String,
    pub repository: Option<RepositoryPatch>,
    /// Ordered by branch name
    pub branches: Vec<BranchProtectionPatch>,
    pub entries: Vec<DiffEntry>,
}

impl PatchPlan {
    /// Build a plan from one repository's entries
    ///
    /// `target` supplies webhook secrets for hooks being created; diff
    /// entries never carry them.
    pub fn from_entries(
        repo: &str,
        entries: Vec<DiffEntry>,
        target: Option<&ResolvedTemplate>,
    ) -> Self {
        let mut repository = RepositoryPatch::default();
        let mut branches: BTreeMap<String, BranchProtectionPatch> = BTreeMap::new();

        for entry in entries.iter().filter(|e| e.repo == repo) {
            let path = entry.setting_path.clone();
            match SettingPath::parse(&entry.setting_path) {
                SettingPath::Setting(key) => {
                    repository.settings.insert(key, entry.target_value.clone());
                    repository.setting_paths.push(path);
                }
                SettingPath::Security(name) => {
                    repository.security.insert(name, entry.target_value.clone());
                    repository.setting_paths.push(path);
                }
                SettingPath::TeamPermission(team) => {
                    repository
                        .team_permissions
                        .insert(team, entry.target_value.as_str().map(str::to_string));
                    repository.setting_paths.push(path);
                }
                SettingPath::UserPermission(user) => {
                    repository
                        .user_permissions
                        .insert(user, entry.target_value.as_str().map(str::to_string));
                    repository.setting_paths.push(path);
                }
                SettingPath::Webhook { url, field } => {
                    let change = repository.webhook_mut(&url, entry.change_type);
                    match field {
                        Some(field) => {
                            change.fields.insert(field, entry.target_value.clone());
                        }
                        None => {
                            change.change = entry.change_type;
                            change.fields = object_of(&entry.target_value);
                            if entry.change_type == ChangeType::Add {
                                change.secret = target
                                    .and_then(|t| t.webhook(&url))
                                    .and_then(|hook| hook.secret.clone());
                            }
                        }
                    }
                    repository.setting_paths.push(path);
                }
                SettingPath::BranchProtection { branch, field } => {
                    let patch = branches
                        .entry(branch.clone())
                        .or_insert_with(|| BranchProtectionPatch {
                            branch,
                            change: ChangeType::Update,
                            settings: Map::new(),
                            setting_paths: Vec::new(),
                        });
                    match field {
                        Some(field) => {
                            patch.settings.insert(field, entry.target_value.clone());
                        }
                        None => {
                            patch.change = entry.change_type;
                            patch.settings = object_of(&entry.target_value);
                        }
                    }
                    patch.setting_paths.push(path);
                }
            }
        }

        Self {
            repo: repo.to_string(),
            repository: (!repository.is_empty()).then_some(repository),
            branches: branches.into_values().collect(),
            entries: entries.into_iter().filter(|e| e.repo == repo).collect(),
        }
    }

    /// Split a mixed entry list into one plan per repository, ordered by name
    pub fn plan_all<'t>(
        entries: &[DiffEntry],
        target_for: impl Fn(&str) -> Option<&'t ResolvedTemplate>,
    ) -> Vec<PatchPlan> {
        let mut by_repo: BTreeMap<&str, Vec<DiffEntry>> = BTreeMap::new();
        for entry in entries {
            by_repo
                .entry(entry.repo.as_str())
                .or_default()
                .push(entry.clone());
        }
        by_repo
            .into_iter()
            .map(|(repo, entries)| PatchPlan::from_entries(repo, entries, target_for(repo)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.repository.is_none() && self.branches.is_empty()
    }

    /// Number of write calls this plan needs
    pub fn write_groups(&self) -> usize {
        usize::from(self.repository.is_some()) + self.branches.len()
    }
}

fn object_of(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    }
}

/// Apply a repository-level patch to a state snapshot
pub fn apply_repository_patch(state: &mut RepositoryState, patch: &RepositoryPatch) {
    for (key, value) in &patch.settings {
        state.settings.insert(key.clone(), value.clone());
    }
    for (name, value) in &patch.security {
        if let Some(enabled) = value.as_bool() {
            state.security.set_toggle(name, enabled);
        }
    }
    apply_permissions(&mut state.permissions.teams, &patch.team_permissions);
    apply_permissions(&mut state.permissions.users, &patch.user_permissions);

    for change in &patch.webhooks {
        match change.change {
            ChangeType::Remove => state.webhooks.retain(|w| w.url != change.url),
            ChangeType::Add | ChangeType::Update => {
                let idx = match state.webhooks.iter().position(|w| w.url == change.url) {
                    Some(idx) => idx,
                    None => {
                        state.webhooks.push(Webhook::new(change.url.clone()));
                        state.webhooks.len() - 1
                    }
                };
                let hook = &mut state.webhooks[idx];
                hook.apply_fields(&change.fields);
                if change.secret.is_some() {
                    hook.secret = change.secret.clone();
                }
            }
        }
    }
}

/// Apply one branch protection patch to a state snapshot
pub fn apply_branch_patch(state: &mut RepositoryState, patch: &BranchProtectionPatch) {
    let rules = &mut state.security.branch_protection;
    match patch.change {
        ChangeType::Remove => {
            rules.remove(&patch.branch);
        }
        ChangeType::Add => {
            let mut rule = BranchProtectionRule::default();
            rule.apply_fields(&patch.settings);
            rules.insert(patch.branch.clone(), rule);
        }
        ChangeType::Update => {
            rules
                .entry(patch.branch.clone())
                .or_default()
                .apply_fields(&patch.settings);
        }
    }
}

fn apply_permissions(
    live: &mut BTreeMap<String, String>,
    changes: &BTreeMap<String, Option<String>>,
) {
    for (name, level) in changes {
        match level {
            Some(level) => {
                live.insert(name.clone(), level.clone());
            }
            None => {
                live.remove(name);
            }
        }
    }
}
