//! Directory capability traits.
//!
//! Split into a read side and a write side so tests and dry runs can hold a
//! query-only view. All operations are single remote calls with binary
//! success; no partial-batch semantics are assumed by callers.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

use rostersync_core::SyncResult;

use crate::types::{ActualAccount, ClientHandle, ClientSettings, DesiredUser, RoleName};

/// Read-only view of the remote directory.
///
/// Every method returns a current snapshot and is idempotent.
#[async_trait]
pub trait DirectoryQuery: Send + Sync {
    /// Resolve the target client by its human-facing client id.
    ///
    /// A miss here is fatal for the whole pass ([`rostersync_core::SyncError::LookupMiss`]);
    /// it is the one lookup the engine cannot treat as "nothing to do".
    async fn resolve_client(&self, client_id: &str) -> SyncResult<ClientHandle>;

    /// List the roles currently defined for the client.
    async fn list_roles(&self, client: &ClientHandle) -> SyncResult<BTreeSet<RoleName>>;

    /// List all user accounts in the realm.
    async fn list_users(&self) -> SyncResult<Vec<ActualAccount>>;

    /// List the client roles currently assigned to a user.
    async fn list_user_roles(
        &self,
        client: &ClientHandle,
        user_id: &str,
    ) -> SyncResult<BTreeSet<RoleName>>;

    /// List the member roles of a composite role.
    async fn list_composite_members(
        &self,
        client: &ClientHandle,
        role: &RoleName,
    ) -> SyncResult<BTreeSet<RoleName>>;

    /// List the self-service account-management roles the directory grants
    /// a user by default.
    async fn list_self_service_roles(&self, user_id: &str) -> SyncResult<BTreeSet<RoleName>>;
}

/// Write side of the remote directory.
#[async_trait]
pub trait DirectoryMutation: Send + Sync {
    /// Apply the desired client settings.
    async fn update_client_settings(
        &self,
        client: &ClientHandle,
        settings: &ClientSettings,
    ) -> SyncResult<()>;

    /// Create a client role.
    async fn create_role(&self, client: &ClientHandle, role: &RoleName) -> SyncResult<()>;

    /// Delete a client role.
    async fn delete_role(&self, client: &ClientHandle, role: &RoleName) -> SyncResult<()>;

    /// Create an enabled account for a desired user. Returns the new
    /// remote account id.
    async fn create_user(&self, user: &DesiredUser) -> SyncResult<String>;

    /// Overwrite names and the attribute bag of an account.
    ///
    /// The write replaces the whole remote bag, so `attributes` must be the
    /// complete bag to store, including any unmanaged keys the caller wants
    /// preserved.
    async fn update_user(
        &self,
        user_id: &str,
        user: &DesiredUser,
        attributes: &BTreeMap<String, Vec<String>>,
    ) -> SyncResult<()>;

    /// Enable or disable an account.
    async fn set_enabled(&self, user_id: &str, enabled: bool) -> SyncResult<()>;

    /// Assign client roles to a user in one batched call.
    async fn add_user_roles(
        &self,
        client: &ClientHandle,
        user_id: &str,
        roles: &[RoleName],
    ) -> SyncResult<()>;

    /// Remove client roles from a user in one batched call.
    async fn remove_user_roles(
        &self,
        client: &ClientHandle,
        user_id: &str,
        roles: &[RoleName],
    ) -> SyncResult<()>;

    /// Remove self-service account-management roles from a user in one
    /// batched call.
    async fn remove_self_service_roles(
        &self,
        user_id: &str,
        roles: &[RoleName],
    ) -> SyncResult<()>;

    /// Add member roles to a composite role in one batched call.
    async fn add_composite_members(
        &self,
        client: &ClientHandle,
        role: &RoleName,
        members: &[RoleName],
    ) -> SyncResult<()>;

    /// Remove member roles from a composite role in one batched call.
    async fn remove_composite_members(
        &self,
        client: &ClientHandle,
        role: &RoleName,
        members: &[RoleName],
    ) -> SyncResult<()>;
}

/// Convenience bound for adapters implementing both sides.
pub trait Directory: DirectoryQuery + DirectoryMutation {}

impl<T: DirectoryQuery + DirectoryMutation + ?Sized> Directory for T {}
