//! # Reconciliation engine
//!
//! Computes and applies the minimal set of operations that converge the
//! remote directory to the desired state, in an order that never assigns a
//! role before it exists and never deletes a role while it is still
//! referenced.
//!
//! ```text
//! desired state ──┐
//!                 ├──► partition ──► plans ──► guard ──► ordered apply
//! remote state ───┘
//! ```
//!
//! # Modules
//!
//! - [`partition`] - generic three-way set difference, the one diff
//!   primitive every reconciler uses
//! - [`roles`] - effective-role derivation, role create/delete planning and
//!   composite-role graph convergence
//! - [`users`] - account lifecycle diff, attribute sync, batched role
//!   assignment sync
//! - [`guard`] - the change-volume circuit breaker
//! - [`orchestrator`] - the nine-phase ordered pass

pub mod guard;
pub mod orchestrator;
pub mod partition;
pub mod roles;
pub mod users;

pub use guard::ChangeGuard;
pub use orchestrator::{run_pass, PassConfig, RunSummary};
pub use partition::{partition, Partition};
pub use roles::{effective_roles, needed_roles, plan_roles, RolePlan, RoleReconciler};
pub use users::{lifecycle_diff, needs_update, UserReconciler};
