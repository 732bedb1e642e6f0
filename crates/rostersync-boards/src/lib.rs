//! Board membership reconciliation.
//!
//! The same desired-vs-actual partition as the directory engine, applied to
//! (board, user) pairs, with a three-state membership machine instead of a
//! binary create/delete:
//!
//! ```text
//! Absent ──insert──► Active ◄──reactivate── Inactive
//!                      │
//!                      └──deactivate──► Inactive   (never deleted)
//! ```
//!
//! The privileged administrative identity is forced Active with admin
//! rights asserted on every board, every pass, regardless of prior state.

pub mod reconciler;
pub mod traits;
pub mod types;

pub use reconciler::{desired_memberships, BoardReconciler, BoardSummary};
pub use traits::{BoardMutation, BoardQuery, BoardService};
pub use types::{Board, BoardMember, MembershipState};
