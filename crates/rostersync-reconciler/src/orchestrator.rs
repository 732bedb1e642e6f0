//! Ordered reconciliation pass.
//!
//! The phase order is an invariant, never reordered:
//!
//! 1. sync client settings
//! 2. create missing roles
//! 3. change guard on the user diff (abort here if tripped)
//! 4. composite-role graph
//! 5. create accounts with role assignment
//! 6. disable obsolete accounts (strips roles)
//! 7. enable re-appeared accounts
//! 8. reconcile roles/attributes of current accounts
//! 9. delete roles no longer needed (planned in phase 2, deferred to here)
//!
//! This guarantees no account is ever assigned a role that does not yet
//! exist, and no role is deleted while still referenced by a live
//! assignment.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use rostersync_core::{RunId, SyncResult};
use rostersync_directory::traits::{Directory, DirectoryMutation, DirectoryQuery};
use rostersync_directory::types::{ClientSettings, DesiredUser, HabilitationTable, RoleGraph};

use crate::guard::ChangeGuard;
use crate::roles::{needed_roles, plan_roles, RoleReconciler};
use crate::users::{lifecycle_diff, UserReconciler};

/// Configuration for one reconciliation pass.
#[derive(Debug, Clone)]
pub struct PassConfig {
    /// Human-facing id of the target client.
    pub client_id: String,
    /// Desired client settings, applied in phase 1.
    pub settings: ClientSettings,
    /// Change guard threshold; zero or below disables the guard.
    pub accepted_changes: i64,
    /// Plan and log everything, write nothing.
    pub dry_run: bool,
}

/// What one pass did, per phase.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Identifier attached to every log line of the pass.
    pub run_id: RunId,
    /// Target client.
    pub client_id: String,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Pass start time.
    pub started_at: DateTime<Utc>,
    /// Pass end time.
    pub finished_at: DateTime<Utc>,
    /// Roles created in phase 2.
    pub roles_created: usize,
    /// Per-role creation failures (logged, non-fatal).
    pub role_create_failures: usize,
    /// Composite entries converged in phase 4.
    pub composites_synced: usize,
    /// Composite entries skipped because no member resolved.
    pub composites_skipped: usize,
    /// Accounts created in phase 5.
    pub users_created: usize,
    /// Accounts disabled in phase 6.
    pub users_disabled: usize,
    /// Accounts re-enabled in phase 7.
    pub users_enabled: usize,
    /// Accounts whose attributes were updated in phase 8.
    pub users_updated: usize,
    /// Roles granted in phase 8.
    pub role_grants: usize,
    /// Roles revoked in phase 8.
    pub role_revocations: usize,
    /// Accounts stripped of self-service roles.
    pub self_service_strips: usize,
    /// Roles deleted in phase 9.
    pub roles_deleted: usize,
    /// Per-role deletion failures (logged, non-fatal).
    pub role_delete_failures: usize,
}

/// Run one full reconciliation pass against the directory.
///
/// Fatal errors (client resolution, tripped guard, account lifecycle
/// failures) abort the pass; per-role and per-composite failures are
/// logged, counted in the summary and skipped.
pub async fn run_pass<D>(
    directory: &D,
    config: &PassConfig,
    table: &HabilitationTable,
    graph: &RoleGraph,
    desired: &[DesiredUser],
) -> SyncResult<RunSummary>
where
    D: Directory + ?Sized,
{
    let run_id = RunId::new();
    let started_at = Utc::now();
    info!(
        run_id = %run_id,
        client_id = %config.client_id,
        desired_users = desired.len(),
        dry_run = config.dry_run,
        "starting reconciliation pass"
    );

    // Phase 1: resolve the target client (fatal on miss) and sync settings.
    let client = directory.resolve_client(&config.client_id).await?;
    if config.dry_run {
        info!(run_id = %run_id, "dry-run: would sync client settings");
    } else {
        directory
            .update_client_settings(&client, &config.settings)
            .await?;
    }

    let role_reconciler = RoleReconciler::new(directory, &client, config.dry_run);
    let user_reconciler = UserReconciler::new(directory, &client, table, config.dry_run);

    // Phase 2: plan roles and create the missing ones. Deletions are
    // planned now but deferred to phase 9.
    let actual_roles = directory.list_roles(&client).await?;
    let needed = needed_roles(desired, table);
    let protected = graph.referenced_roles();
    let role_plan = plan_roles(&needed, &actual_roles, &protected);
    info!(
        run_id = %run_id,
        to_create = role_plan.to_create.len(),
        to_delete = role_plan.to_delete.len(),
        "role plan computed"
    );
    let (roles_created, role_create_failures) = role_reconciler.create_roles(&role_plan).await;

    // Phase 3: evaluate the change guard before any account write.
    let actual_users = directory.list_users().await?;
    let change_set = lifecycle_diff(desired, &actual_users);
    info!(
        run_id = %run_id,
        to_create = change_set.to_create.len(),
        to_enable = change_set.to_enable.len(),
        to_disable = change_set.to_disable.len(),
        current = change_set.current.len(),
        "account lifecycle diff computed"
    );
    ChangeGuard::new(config.accepted_changes).check_change_set(&change_set)?;

    // Phase 4: composite-role graph.
    let composite_stats = role_reconciler.sync_composites(graph).await?;

    // Phases 5-8: account lifecycle and per-user convergence. New accounts
    // are stripped of default self-service roles at creation time; the
    // standing strip below covers the accounts listed in phase 3.
    let (users_created, created_strips) = user_reconciler.create_accounts(&change_set).await?;
    let users_disabled = user_reconciler.disable_accounts(&change_set).await?;
    let users_enabled = user_reconciler.enable_accounts(&change_set).await?;
    let (users_updated, role_grants, role_revocations) =
        user_reconciler.reconcile_current(&change_set).await?;
    let self_service_strips = created_strips
        + user_reconciler
            .strip_self_service_roles(&actual_users)
            .await?;

    // Phase 9: deferred role deletions.
    let (roles_deleted, role_delete_failures) = role_reconciler.delete_roles(&role_plan).await;

    let summary = RunSummary {
        run_id,
        client_id: config.client_id.clone(),
        dry_run: config.dry_run,
        started_at,
        finished_at: Utc::now(),
        roles_created,
        role_create_failures,
        composites_synced: composite_stats.synced,
        composites_skipped: composite_stats.skipped,
        users_created,
        users_disabled,
        users_enabled,
        users_updated,
        role_grants,
        role_revocations,
        self_service_strips,
        roles_deleted,
        role_delete_failures,
    };

    info!(
        run_id = %run_id,
        roles_created = summary.roles_created,
        users_created = summary.users_created,
        users_disabled = summary.users_disabled,
        users_enabled = summary.users_enabled,
        users_updated = summary.users_updated,
        roles_deleted = summary.roles_deleted,
        "reconciliation pass finished"
    );

    Ok(summary)
}
