//! REST admin-API adapter.
//!
//! Implements the directory capability traits over the identity server's
//! admin REST API with bearer-token authentication. Contains no
//! reconciliation logic: every method is one remote operation with binary
//! success, classified into the shared error taxonomy.

pub mod auth;
pub mod boards;
pub mod client;

pub use auth::RestConfig;
pub use boards::{BoardRestConfig, RestBoards};
pub use client::RestDirectory;
