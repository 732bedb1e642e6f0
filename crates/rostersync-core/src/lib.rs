//! rostersync core library
//!
//! Shared types for the rostersync workspace.
//!
//! # Modules
//!
//! - [`error`] - Error taxonomy (`SyncError`) and the `SyncResult` alias
//! - [`ids`] - Strongly typed run identifier

pub mod error;
pub mod ids;

pub use error::{SyncError, SyncResult};
pub use ids::RunId;
