//! Directory domain model
//!
//! Value types describing the desired and actual state of the identity
//! directory, and the capability traits that adapters implement to expose
//! it to the reconciliation engine.
//!
//! # Modules
//!
//! - [`types`] - DesiredUser, ActualAccount, RoleGraph, ChangeSet and the
//!   case-insensitive [`types::Username`] key
//! - [`traits`] - `DirectoryQuery` / `DirectoryMutation` capability traits

pub mod traits;
pub mod types;

pub use traits::{Directory, DirectoryMutation, DirectoryQuery};
pub use types::{
    ActualAccount, ChangeSet, ClientHandle, ClientSettings, DesiredUser, HabilitationTable,
    RoleGraph, RoleName, Username,
};
