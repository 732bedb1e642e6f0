//! Directory value types.
//!
//! Everything here is an owned value object: reconcilers build and consume
//! these per pass, the only durable owner of truth is the remote directory.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Attribute keys the engine manages on remote accounts.
///
/// Attribute comparison is restricted to these keys so that attributes
/// written by other tools on the same directory are left alone.
pub const MANAGED_ATTRIBUTES: &[&str] = &["segment", "fonction", "departement", "boards"];

/// Opaque access-role identifier, unique within a client.
///
/// The engine interprets no internal structure beyond equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleName(String);

impl RoleName {
    /// Returns the role name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RoleName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RoleName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for RoleName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Case-insensitive email-like account key.
///
/// The raw value is stored verbatim; case folding happens at comparison
/// time only. Two usernames differing only in case are the same key for
/// `Eq`, `Ord` and `Hash`, which is what every map and partition in the
/// engine relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    /// Wraps a raw username without altering it.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the username exactly as it was provided.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn folded(&self) -> String {
        self.0.to_lowercase()
    }
}

impl PartialEq for Username {
    fn eq(&self, other: &Self) -> bool {
        self.folded() == other.folded()
    }
}

impl Eq for Username {}

impl Hash for Username {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded().hash(state);
    }
}

impl PartialOrd for Username {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Username {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded().cmp(&other.folded())
    }
}

impl Display for Username {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Username {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One person from the roster, with everything needed to derive their
/// target directory account and board memberships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredUser {
    /// Unique account key.
    pub username: Username,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Organization segment (stored as the `segment` attribute).
    pub organization: String,
    /// Département code, doubles as a geography role tag.
    pub geography: Option<String>,
    /// Job function (stored as the `fonction` attribute).
    pub function: String,
    /// Habilitation level ("a", "b", ...) driving the base role set.
    pub habilitation: String,
    /// Scope tags appended verbatim to the effective role set.
    #[serde(default)]
    pub scope_tags: Vec<RoleName>,
    /// Explicit extra roles appended verbatim to the effective role set.
    #[serde(default)]
    pub extra_roles: Vec<RoleName>,
    /// Board slugs this user should be an active member of.
    #[serde(default)]
    pub boards: Vec<String>,
}

impl DesiredUser {
    /// The attribute bag this user should carry on the remote account.
    ///
    /// Only non-empty values are emitted; an account with no managed data
    /// gets an empty bag, which compares equal to a missing remote bag.
    #[must_use]
    pub fn attribute_bag(&self) -> BTreeMap<String, Vec<String>> {
        let mut bag = BTreeMap::new();
        if !self.organization.is_empty() {
            bag.insert("segment".to_string(), vec![self.organization.clone()]);
        }
        if !self.function.is_empty() {
            bag.insert("fonction".to_string(), vec![self.function.clone()]);
        }
        if let Some(geo) = &self.geography {
            if !geo.is_empty() {
                bag.insert("departement".to_string(), vec![geo.clone()]);
            }
        }
        if !self.boards.is_empty() {
            bag.insert("boards".to_string(), self.boards.clone());
        }
        bag
    }
}

/// Remote snapshot of a directory account. Read-only input: the engine only
/// ever describes the operations needed to converge it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActualAccount {
    /// Remote identifier (opaque to the engine).
    pub id: String,
    /// Account key.
    pub username: Username,
    /// Whether the account can currently log in.
    pub enabled: bool,
    /// First name as stored remotely.
    pub first_name: Option<String>,
    /// Last name as stored remotely.
    pub last_name: Option<String>,
    /// Remote attribute bag.
    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,
}

/// Resolved handle on the remote client the pass targets.
///
/// Resolution failure for this handle is fatal for the whole pass; every
/// other lookup miss is a per-entity skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientHandle {
    /// Remote identifier of the client.
    pub id: String,
    /// Human-facing client id ("clientId").
    pub client_id: String,
}

/// Desired settings for the target client, synced once per pass before any
/// role or account work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Client description.
    #[serde(default)]
    pub description: Option<String>,
    /// Allowed redirect URIs.
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// Allowed web origins.
    #[serde(default)]
    pub web_origins: Vec<String>,
}

/// Habilitation level to base role set table.
///
/// Immutable configuration injected into role derivation; shipped defaults
/// can be overridden from the realm definition file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabilitationTable(BTreeMap<String, Vec<RoleName>>);

impl HabilitationTable {
    /// Builds a table from explicit level entries.
    #[must_use]
    pub fn new(levels: BTreeMap<String, Vec<RoleName>>) -> Self {
        Self(levels)
    }

    /// Base roles for a habilitation level, if the level is known.
    ///
    /// Lookup is case-insensitive and whitespace-tolerant.
    #[must_use]
    pub fn base_roles(&self, level: &str) -> Option<&[RoleName]> {
        let key = level.trim().to_lowercase();
        self.0.get(&key).map(Vec::as_slice)
    }
}

impl Default for HabilitationTable {
    fn default() -> Self {
        let full: Vec<RoleName> = ["bdf", "detection", "dgefp", "pge", "score", "urssaf"]
            .iter()
            .map(|r| RoleName::from(*r))
            .collect();
        let restricted: Vec<RoleName> = ["detection", "score"]
            .iter()
            .map(|r| RoleName::from(*r))
            .collect();
        let mut levels = BTreeMap::new();
        levels.insert("a".to_string(), full);
        levels.insert("b".to_string(), restricted);
        Self(levels)
    }
}

/// Mapping from composite role names to their desired member roles.
///
/// Built once at startup from the geographic reference table merged with
/// per-region aliases, then injected immutably into the reconciler. The
/// graph itself is desired state; only its remote mirror is reconciled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleGraph {
    entries: BTreeMap<RoleName, BTreeSet<RoleName>>,
}

impl RoleGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or extends) a composite entry.
    pub fn insert(&mut self, composite: RoleName, members: impl IntoIterator<Item = RoleName>) {
        self.entries.entry(composite).or_default().extend(members);
    }

    /// Iterates entries in composite-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&RoleName, &BTreeSet<RoleName>)> {
        self.entries.iter()
    }

    /// Every role name the graph references, composites and members alike.
    ///
    /// Roles named here are desired state and must be protected from the
    /// deferred role deletion phase even when no user derives them.
    #[must_use]
    pub fn referenced_roles(&self) -> BTreeSet<RoleName> {
        let mut all = BTreeSet::new();
        for (composite, members) in &self.entries {
            all.insert(composite.clone());
            all.extend(members.iter().cloned());
        }
        all
    }

    /// Number of composite entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the graph has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Account lifecycle diff for one pass.
///
/// The four lists are disjoint by construction (each username lands in
/// exactly one). Constructed once, drained by the orchestrator, never
/// persisted.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Present in desired, absent remotely.
    pub to_create: Vec<DesiredUser>,
    /// Present on both sides but currently disabled.
    pub to_enable: Vec<(ActualAccount, DesiredUser)>,
    /// Enabled remotely but no longer desired.
    pub to_disable: Vec<ActualAccount>,
    /// Present and enabled on both sides; subject to attribute/role sync.
    pub current: Vec<(ActualAccount, DesiredUser)>,
}

impl ChangeSet {
    /// Destructive change volume, as evaluated by the change guard.
    #[must_use]
    pub fn changes(&self) -> usize {
        self.to_disable.len() + self.to_create.len()
    }

    /// Retained population, as evaluated by the change guard.
    #[must_use]
    pub fn keeps(&self) -> usize {
        self.current.len() + self.to_enable.len()
    }

    /// Whether the diff requires no lifecycle operation at all.
    #[must_use]
    pub fn is_steady(&self) -> bool {
        self.to_create.is_empty() && self.to_enable.is_empty() && self.to_disable.is_empty()
    }
}
