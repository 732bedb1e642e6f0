//! Role derivation and convergence.
//!
//! Three concerns live here:
//!
//! - deriving each user's effective role set from their habilitation level,
//!   geography and explicit tags;
//! - planning role creates (applied before user provisioning) and role
//!   deletes (deferred until after it);
//! - converging the remote composite-role graph onto the injected
//!   [`RoleGraph`], best-effort per entry.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use rostersync_core::SyncResult;
use rostersync_directory::traits::{DirectoryMutation, DirectoryQuery};
use rostersync_directory::types::{
    ClientHandle, DesiredUser, HabilitationTable, RoleGraph, RoleName,
};

use crate::partition::partition;

/// Effective role set of one desired user.
///
/// Base roles come from the habilitation table; the geography tag and the
/// explicit scope/extra roles are appended verbatim. An unknown or empty
/// habilitation level yields an empty base set with a warning, never a
/// failure: the roster row may still carry valid explicit roles.
pub fn effective_roles(user: &DesiredUser, table: &HabilitationTable) -> BTreeSet<RoleName> {
    let mut set: BTreeSet<RoleName> = match table.base_roles(&user.habilitation) {
        Some(base) => base.iter().cloned().collect(),
        None => {
            warn!(
                username = %user.username,
                habilitation = %user.habilitation,
                "unknown habilitation level, deriving no base roles"
            );
            BTreeSet::new()
        }
    };
    if let Some(geo) = &user.geography {
        if !geo.is_empty() {
            set.insert(RoleName::from(geo.as_str()));
        }
    }
    set.extend(user.scope_tags.iter().cloned());
    set.extend(user.extra_roles.iter().cloned());
    set
}

/// Union of all users' effective role sets.
///
/// A pure function of the user population: identical input yields identical
/// output.
pub fn needed_roles(users: &[DesiredUser], table: &HabilitationTable) -> BTreeSet<RoleName> {
    let mut needed = BTreeSet::new();
    for user in users {
        needed.extend(effective_roles(user, table));
    }
    needed
}

/// Planned role creates and deferred deletes for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePlan {
    /// Roles required by the desired state but missing remotely.
    pub to_create: Vec<RoleName>,
    /// Remote roles no user (and no graph entry) references any more.
    /// Deleted only after user provisioning completes.
    pub to_delete: Vec<RoleName>,
}

/// Diff the needed role set against the remote role set.
///
/// `protected` names roles that must survive even when no user derives
/// them — the composite-role graph's composites and members are desired
/// state in their own right.
pub fn plan_roles(
    needed: &BTreeSet<RoleName>,
    actual: &BTreeSet<RoleName>,
    protected: &BTreeSet<RoleName>,
) -> RolePlan {
    let p = partition(needed.iter().cloned(), actual.iter().cloned());
    RolePlan {
        to_create: p.only_desired,
        to_delete: p
            .only_actual
            .into_iter()
            .filter(|role| !protected.contains(role))
            .collect(),
    }
}

/// Outcome counters for the composite-role graph sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompositeStats {
    /// Entries whose remote mirror was examined (and converged if needed).
    pub synced: usize,
    /// Entries skipped because zero member roles resolved remotely.
    pub skipped: usize,
    /// Composite roles created because they were missing remotely.
    pub created: usize,
    /// Per-entry remote failures that were logged and skipped.
    pub failures: usize,
}

/// Applies role plans and the composite-role graph against the directory.
pub struct RoleReconciler<'a, D: ?Sized> {
    directory: &'a D,
    client: &'a ClientHandle,
    dry_run: bool,
}

impl<'a, D> RoleReconciler<'a, D>
where
    D: DirectoryQuery + DirectoryMutation + ?Sized,
{
    /// Binds the reconciler to a directory and resolved client.
    pub fn new(directory: &'a D, client: &'a ClientHandle, dry_run: bool) -> Self {
        Self {
            directory,
            client,
            dry_run,
        }
    }

    /// Create the missing roles from a plan.
    ///
    /// Per-role failures are logged and counted, never fatal: one broken
    /// role must not block the rest of the pass.
    pub async fn create_roles(&self, plan: &RolePlan) -> (usize, usize) {
        let mut created = 0;
        let mut failed = 0;
        for role in &plan.to_create {
            if self.dry_run {
                info!(role = %role, "dry-run: would create role");
                created += 1;
                continue;
            }
            match self.directory.create_role(self.client, role).await {
                Ok(()) => {
                    info!(role = %role, "created role");
                    created += 1;
                }
                Err(err) => {
                    warn!(role = %role, error = %err, "role creation failed, continuing");
                    failed += 1;
                }
            }
        }
        (created, failed)
    }

    /// Delete the roles a plan marked obsolete.
    ///
    /// Called only after user provisioning so no live assignment still
    /// references them. Per-role failures are logged and counted.
    pub async fn delete_roles(&self, plan: &RolePlan) -> (usize, usize) {
        let mut deleted = 0;
        let mut failed = 0;
        for role in &plan.to_delete {
            if self.dry_run {
                info!(role = %role, "dry-run: would delete role");
                deleted += 1;
                continue;
            }
            match self.directory.delete_role(self.client, role).await {
                Ok(()) => {
                    info!(role = %role, "deleted obsolete role");
                    deleted += 1;
                }
                Err(err) => {
                    warn!(role = %role, error = %err, "role deletion failed, continuing");
                    failed += 1;
                }
            }
        }
        (deleted, failed)
    }

    /// Converge the remote composite-role mirror onto the desired graph.
    ///
    /// For each entry: members that do not exist remotely are skipped with
    /// a log line; if none resolve, no write is issued for the entry at
    /// all. Members present remotely but absent from the desired set are
    /// pruned. Running this twice with unchanged inputs performs zero
    /// writes the second time.
    pub async fn sync_composites(&self, graph: &RoleGraph) -> SyncResult<CompositeStats> {
        let mut stats = CompositeStats::default();
        let existing = self.directory.list_roles(self.client).await?;

        for (composite, desired_members) in graph.iter() {
            let resolvable: BTreeSet<RoleName> = desired_members
                .iter()
                .filter(|member| {
                    let found = existing.contains(*member);
                    if !found {
                        debug!(
                            composite = %composite,
                            member = %member,
                            "member role does not exist remotely, skipping"
                        );
                    }
                    found
                })
                .cloned()
                .collect();

            if resolvable.is_empty() {
                debug!(composite = %composite, "no member roles resolve, skipping composite");
                stats.skipped += 1;
                continue;
            }

            let composite_exists = existing.contains(composite);
            if !composite_exists {
                if self.dry_run {
                    info!(composite = %composite, "dry-run: would create composite role");
                } else if let Err(err) = self.directory.create_role(self.client, composite).await {
                    warn!(
                        composite = %composite,
                        error = %err,
                        "composite role creation failed, skipping entry"
                    );
                    stats.failures += 1;
                    continue;
                }
                stats.created += 1;
            }

            // A composite that did not exist a moment ago has no members.
            let current = if composite_exists {
                match self
                    .directory
                    .list_composite_members(self.client, composite)
                    .await
                {
                    Ok(members) => members,
                    Err(err) => {
                        warn!(
                            composite = %composite,
                            error = %err,
                            "listing composite members failed, skipping entry"
                        );
                        stats.failures += 1;
                        continue;
                    }
                }
            } else {
                BTreeSet::new()
            };

            let p = partition(resolvable.iter().cloned(), current.iter().cloned());

            if !p.only_desired.is_empty() {
                if self.dry_run {
                    info!(
                        composite = %composite,
                        members = p.only_desired.len(),
                        "dry-run: would add composite members"
                    );
                } else if let Err(err) = self
                    .directory
                    .add_composite_members(self.client, composite, &p.only_desired)
                    .await
                {
                    warn!(
                        composite = %composite,
                        error = %err,
                        "adding composite members failed, continuing"
                    );
                    stats.failures += 1;
                }
            }

            if !p.only_actual.is_empty() {
                if self.dry_run {
                    info!(
                        composite = %composite,
                        members = p.only_actual.len(),
                        "dry-run: would prune composite members"
                    );
                } else if let Err(err) = self
                    .directory
                    .remove_composite_members(self.client, composite, &p.only_actual)
                    .await
                {
                    warn!(
                        composite = %composite,
                        error = %err,
                        "pruning composite members failed, continuing"
                    );
                    stats.failures += 1;
                }
            }

            stats.synced += 1;
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rostersync_directory::types::Username;

    fn user(habilitation: &str, geography: Option<&str>, scope: &[&str]) -> DesiredUser {
        DesiredUser {
            username: Username::new("test@example.org"),
            first_name: "Test".into(),
            last_name: "User".into(),
            organization: "org".into(),
            geography: geography.map(String::from),
            function: "dev".into(),
            habilitation: habilitation.into(),
            scope_tags: scope.iter().map(|s| RoleName::from(*s)).collect(),
            extra_roles: vec![],
            boards: vec![],
        }
    }

    #[test]
    fn level_a_derives_full_base_set_plus_tags() {
        let table = HabilitationTable::default();
        let roles = effective_roles(&user("a", Some("35"), &["crp"]), &table);
        for expected in ["bdf", "detection", "dgefp", "pge", "score", "urssaf", "35", "crp"] {
            assert!(roles.contains(&RoleName::from(expected)), "missing {expected}");
        }
        assert_eq!(roles.len(), 8);
    }

    #[test]
    fn unknown_level_yields_only_tags() {
        let table = HabilitationTable::default();
        let roles = effective_roles(&user("x", Some("29"), &[]), &table);
        assert_eq!(roles.len(), 1);
        assert!(roles.contains(&RoleName::from("29")));

        let roles = effective_roles(&user("", None, &[]), &table);
        assert!(roles.is_empty());
    }

    #[test]
    fn needed_roles_is_deterministic() {
        let table = HabilitationTable::default();
        let users = vec![
            user("a", Some("35"), &[]),
            user("b", Some("22"), &["urssaf"]),
        ];
        let first = needed_roles(&users, &table);
        let second = needed_roles(&users, &table);
        assert_eq!(first, second);
        assert!(first.contains(&RoleName::from("22")));
        assert!(first.contains(&RoleName::from("urssaf")));
    }

    #[test]
    fn plan_roles_defers_protected_deletions() {
        let needed: BTreeSet<RoleName> = [RoleName::from("score")].into_iter().collect();
        let actual: BTreeSet<RoleName> = [
            RoleName::from("score"),
            RoleName::from("obsolete"),
            RoleName::from("Bretagne"),
        ]
        .into_iter()
        .collect();
        let protected: BTreeSet<RoleName> = [RoleName::from("Bretagne")].into_iter().collect();

        let plan = plan_roles(&needed, &actual, &protected);
        assert!(plan.to_create.is_empty());
        assert_eq!(plan.to_delete, vec![RoleName::from("obsolete")]);
    }

    #[test]
    fn plan_roles_creates_missing() {
        let needed: BTreeSet<RoleName> = [RoleName::from("pge"), RoleName::from("35")]
            .into_iter()
            .collect();
        let actual = BTreeSet::new();
        let plan = plan_roles(&needed, &actual, &BTreeSet::new());
        assert_eq!(plan.to_create.len(), 2);
        assert!(plan.to_delete.is_empty());
    }
}
