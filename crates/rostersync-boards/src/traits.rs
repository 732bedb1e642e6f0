//! Board system capability traits.
//!
//! Mirrors the directory trait split: a read side returning snapshots and a
//! write side issuing single-call transitions. Memberships are deactivated,
//! never deleted, so the write side has no removal operation at all.

use async_trait::async_trait;

use rostersync_core::SyncResult;
use rostersync_directory::types::Username;

use crate::types::{Board, BoardMember};

/// Read-only view of the board system.
#[async_trait]
pub trait BoardQuery: Send + Sync {
    /// List all boards.
    async fn list_boards(&self) -> SyncResult<Vec<Board>>;

    /// List the membership records of a board (active and inactive).
    async fn list_members(&self, board: &Board) -> SyncResult<Vec<BoardMember>>;
}

/// Write side of the board system.
#[async_trait]
pub trait BoardMutation: Send + Sync {
    /// Insert a new membership record in the active state.
    async fn insert_active(&self, board: &Board, username: &Username) -> SyncResult<()>;

    /// Reactivate an existing inactive membership.
    async fn activate(&self, board: &Board, username: &Username) -> SyncResult<()>;

    /// Deactivate an active membership. The record is kept.
    async fn deactivate(&self, board: &Board, username: &Username) -> SyncResult<()>;

    /// Assert that the user is an active member with admin rights.
    ///
    /// Idempotent: implementations must tolerate the user already being an
    /// active admin.
    async fn ensure_admin(&self, board: &Board, username: &Username) -> SyncResult<()>;
}

/// Convenience bound for adapters implementing both sides.
pub trait BoardService: BoardQuery + BoardMutation {}

impl<T: BoardQuery + BoardMutation + ?Sized> BoardService for T {}
