//! Desired-state supplier.
//!
//! Turns the operator-maintained inputs into the value objects the
//! reconciliation engine consumes:
//!
//! - [`roster`] - the people spreadsheet (CSV) into `DesiredUser` records
//! - [`definition`] - the realm/client definition file (TOML)
//! - [`geography`] - the static region→départements reference table and
//!   the [`rostersync_directory::types::RoleGraph`] built from it

pub mod definition;
pub mod geography;
pub mod roster;

pub use definition::{load_definition, Definition};
pub use geography::build_role_graph;
pub use roster::load_roster;
