//! Board value types.

use serde::{Deserialize, Serialize};

use rostersync_directory::types::Username;

/// Membership state of one (board, user) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipState {
    /// No membership record exists.
    Absent,
    /// A membership record exists but the user is deactivated.
    Inactive,
    /// The user is an active member.
    Active,
}

/// One remote board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// Remote identifier (opaque to the engine).
    pub id: String,
    /// Slug referenced by roster board tags.
    pub slug: String,
    /// Display title.
    pub title: String,
}

/// One remote membership record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardMember {
    /// Account key of the member.
    pub username: Username,
    /// Whether the membership is currently active.
    pub active: bool,
    /// Whether the member holds board admin rights.
    pub is_admin: bool,
}

impl BoardMember {
    /// The state this record represents. A record never means `Absent`.
    #[must_use]
    pub fn state(&self) -> MembershipState {
        if self.active {
            MembershipState::Active
        } else {
            MembershipState::Inactive
        }
    }
}
