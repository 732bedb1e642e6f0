//! Account lifecycle and per-user convergence.
//!
//! The lifecycle diff classifies every username into exactly one of:
//! create, enable, disable, current, or no-op (already disabled and no
//! longer desired). For `current` accounts, attributes are compared
//! order-insensitively and the role assignment is diffed into at most one
//! batched add and one batched remove call per user.
//!
//! Account lifecycle remote errors are fatal: partial application there
//! risks an inconsistent security posture and must surface immediately.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info};

use rostersync_core::SyncResult;
use rostersync_directory::traits::{DirectoryMutation, DirectoryQuery};
use rostersync_directory::types::{
    ActualAccount, ChangeSet, ClientHandle, DesiredUser, HabilitationTable, RoleName, Username,
    MANAGED_ATTRIBUTES,
};

use crate::partition::partition;
use crate::roles::effective_roles;

/// Classify the whole user population into a [`ChangeSet`].
///
/// Keyed by case-insensitive username. Accounts that are both absent from
/// the desired state and already disabled are a stable steady state and
/// appear in no list.
pub fn lifecycle_diff(desired: &[DesiredUser], actual: &[ActualAccount]) -> ChangeSet {
    let desired_by_name: HashMap<&Username, &DesiredUser> =
        desired.iter().map(|u| (&u.username, u)).collect();
    let actual_by_name: HashMap<&Username, &ActualAccount> =
        actual.iter().map(|a| (&a.username, a)).collect();

    let p = partition(
        desired_by_name.keys().map(|u| (*u).clone()),
        actual_by_name.keys().map(|u| (*u).clone()),
    );

    let mut set = ChangeSet::default();

    for name in &p.only_desired {
        set.to_create.push((*desired_by_name[name]).clone());
    }

    for name in &p.only_actual {
        let account = actual_by_name[name];
        if account.enabled {
            set.to_disable.push(account.clone());
        } else {
            debug!(username = %account.username, "obsolete account already disabled");
        }
    }

    for name in &p.both {
        let account = actual_by_name[name];
        let user = desired_by_name[name];
        if account.enabled {
            set.current.push((account.clone(), user.clone()));
        } else {
            set.to_enable.push((account.clone(), user.clone()));
        }
    }

    set
}

fn normalize(bag: &BTreeMap<String, Vec<String>>) -> BTreeMap<String, Vec<String>> {
    bag.iter()
        .map(|(k, v)| {
            let mut values = v.clone();
            values.sort();
            (k.clone(), values)
        })
        .collect()
}

fn managed_attributes(account: &ActualAccount) -> BTreeMap<String, Vec<String>> {
    account
        .attributes
        .iter()
        .filter(|(k, _)| MANAGED_ATTRIBUTES.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// The full attribute bag to write when updating a `current` account.
///
/// The remote write replaces the whole bag, so unmanaged keys written by
/// other tools are carried over verbatim next to the desired managed
/// values. A managed key absent from the desired bag is dropped.
fn merged_attributes(account: &ActualAccount, user: &DesiredUser) -> BTreeMap<String, Vec<String>> {
    let mut bag: BTreeMap<String, Vec<String>> = account
        .attributes
        .iter()
        .filter(|(k, _)| !MANAGED_ATTRIBUTES.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    bag.extend(user.attribute_bag());
    bag
}

/// Whether a `current` account needs an attribute/name update.
///
/// Comparison is order-insensitive (values sorted before compare) and
/// restricted to the managed attribute keys; a missing remote bag and an
/// empty desired bag compare equal.
pub fn needs_update(account: &ActualAccount, user: &DesiredUser) -> bool {
    if account.first_name.as_deref().unwrap_or("") != user.first_name {
        return true;
    }
    if account.last_name.as_deref().unwrap_or("") != user.last_name {
        return true;
    }
    normalize(&managed_attributes(account)) != normalize(&user.attribute_bag())
}

/// Applies the account lifecycle and per-user role convergence.
pub struct UserReconciler<'a, D: ?Sized> {
    directory: &'a D,
    client: &'a ClientHandle,
    table: &'a HabilitationTable,
    dry_run: bool,
}

impl<'a, D> UserReconciler<'a, D>
where
    D: DirectoryQuery + DirectoryMutation + ?Sized,
{
    /// Binds the reconciler to a directory, client and habilitation table.
    pub fn new(
        directory: &'a D,
        client: &'a ClientHandle,
        table: &'a HabilitationTable,
        dry_run: bool,
    ) -> Self {
        Self {
            directory,
            client,
            table,
            dry_run,
        }
    }

    /// Create every missing account, enabled and with its effective role
    /// set assigned in one batched call.
    ///
    /// Freshly created accounts receive the directory's default
    /// self-service roles, so each one is stripped right here rather than
    /// waiting for the next pass. Returns `(created, strips)` counters.
    pub async fn create_accounts(&self, set: &ChangeSet) -> SyncResult<(usize, usize)> {
        let mut created = 0;
        let mut strips = 0;
        for user in &set.to_create {
            if self.dry_run {
                info!(username = %user.username, "dry-run: would create account");
                created += 1;
                continue;
            }
            let id = self.directory.create_user(user).await?;
            let roles: Vec<RoleName> = effective_roles(user, self.table).into_iter().collect();
            if !roles.is_empty() {
                self.directory.add_user_roles(self.client, &id, &roles).await?;
            }
            if self.strip_account(&id, &user.username).await? {
                strips += 1;
            }
            info!(username = %user.username, roles = roles.len(), "created account");
            created += 1;
        }
        Ok((created, strips))
    }

    /// Disable obsolete accounts, stripping every assigned client role
    /// first so no orphaned privilege survives on a dormant account.
    pub async fn disable_accounts(&self, set: &ChangeSet) -> SyncResult<usize> {
        let mut disabled = 0;
        for account in &set.to_disable {
            if self.dry_run {
                info!(username = %account.username, "dry-run: would disable account");
                disabled += 1;
                continue;
            }
            let assigned = self
                .directory
                .list_user_roles(self.client, &account.id)
                .await?;
            if !assigned.is_empty() {
                let roles: Vec<RoleName> = assigned.into_iter().collect();
                self.directory
                    .remove_user_roles(self.client, &account.id, &roles)
                    .await?;
            }
            self.directory.set_enabled(&account.id, false).await?;
            info!(username = %account.username, "disabled obsolete account");
            disabled += 1;
        }
        Ok(disabled)
    }

    /// Re-enable accounts that re-appeared in the desired state.
    ///
    /// Disabling stripped their roles, so enabling restores the effective
    /// role set in the same batched call shape as account creation.
    pub async fn enable_accounts(&self, set: &ChangeSet) -> SyncResult<usize> {
        let mut enabled = 0;
        for (account, user) in &set.to_enable {
            if self.dry_run {
                info!(username = %account.username, "dry-run: would enable account");
                enabled += 1;
                continue;
            }
            self.directory.set_enabled(&account.id, true).await?;
            let roles: Vec<RoleName> = effective_roles(user, self.table).into_iter().collect();
            if !roles.is_empty() {
                self.directory
                    .add_user_roles(self.client, &account.id, &roles)
                    .await?;
            }
            info!(username = %account.username, "re-enabled account");
            enabled += 1;
        }
        Ok(enabled)
    }

    /// Converge attributes and role assignments of accounts present on
    /// both sides.
    ///
    /// Returns `(updated, role_grants, role_revocations)` counters. Role
    /// changes are applied as one batched add and one batched remove per
    /// user, bounding remote calls to O(users).
    pub async fn reconcile_current(&self, set: &ChangeSet) -> SyncResult<(usize, usize, usize)> {
        let mut updated = 0;
        let mut grants = 0;
        let mut revocations = 0;

        for (account, user) in &set.current {
            if needs_update(account, user) {
                if self.dry_run {
                    info!(username = %account.username, "dry-run: would update attributes");
                } else {
                    self.directory
                        .update_user(&account.id, user, &merged_attributes(account, user))
                        .await?;
                    info!(username = %account.username, "updated account attributes");
                }
                updated += 1;
            }

            let assigned = self
                .directory
                .list_user_roles(self.client, &account.id)
                .await?;
            let wanted = effective_roles(user, self.table);
            let p = partition(wanted.iter().cloned(), assigned.iter().cloned());

            if !p.only_desired.is_empty() {
                if self.dry_run {
                    info!(
                        username = %account.username,
                        roles = p.only_desired.len(),
                        "dry-run: would grant roles"
                    );
                } else {
                    self.directory
                        .add_user_roles(self.client, &account.id, &p.only_desired)
                        .await?;
                }
                grants += p.only_desired.len();
            }

            if !p.only_actual.is_empty() {
                if self.dry_run {
                    info!(
                        username = %account.username,
                        roles = p.only_actual.len(),
                        "dry-run: would revoke roles"
                    );
                } else {
                    self.directory
                        .remove_user_roles(self.client, &account.id, &p.only_actual)
                        .await?;
                }
                revocations += p.only_actual.len();
            }
        }

        Ok((updated, grants, revocations))
    }

    /// Standing hardening pass: strip the self-service account-management
    /// roles the directory grants by default, for every account and
    /// regardless of desired state.
    pub async fn strip_self_service_roles(&self, accounts: &[ActualAccount]) -> SyncResult<usize> {
        let mut stripped = 0;
        for account in accounts {
            if self.strip_account(&account.id, &account.username).await? {
                stripped += 1;
            }
        }
        Ok(stripped)
    }

    /// Strip one account's residual self-service roles, if any.
    async fn strip_account(&self, user_id: &str, username: &Username) -> SyncResult<bool> {
        let residual = self.directory.list_self_service_roles(user_id).await?;
        if residual.is_empty() {
            return Ok(false);
        }
        if self.dry_run {
            info!(
                username = %username,
                roles = residual.len(),
                "dry-run: would strip self-service roles"
            );
            return Ok(true);
        }
        let roles: Vec<RoleName> = residual.into_iter().collect();
        self.directory
            .remove_self_service_roles(user_id, &roles)
            .await?;
        info!(username = %username, "stripped self-service roles");
        Ok(true)
    }
}
