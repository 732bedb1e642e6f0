//! Realm/client definition file (TOML).
//!
//! Everything an operator tunes per deployment lives here: the target
//! client, the change-guard threshold, the administrative board identity,
//! habilitation table overrides and composite-role aliases. Absent
//! sections fall back to shipped defaults.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use rostersync_core::{SyncError, SyncResult};
use rostersync_directory::types::{ClientSettings, HabilitationTable, RoleName, Username};

fn default_accepted_changes() -> i64 {
    0
}

/// `[realm]` section: mandatory identity of the deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct RealmSection {
    /// Realm the managed users and client live in.
    pub name: String,
    /// Human-facing id of the target client.
    pub client_id: String,
    /// Change-guard threshold; zero or below means unbounded.
    #[serde(default = "default_accepted_changes")]
    pub accepted_changes: i64,
    /// Privileged administrative board identity.
    pub admin: String,
}

/// `[habilitation]` section: per-level base role overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HabilitationSection {
    /// Level name to base role list. Empty means shipped defaults.
    #[serde(default)]
    pub levels: BTreeMap<String, Vec<String>>,
}

/// `[regions]` section: composite-role naming.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegionSection {
    /// Canonical region name to composite role name override.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

/// Parsed realm/client definition.
#[derive(Debug, Clone, Deserialize)]
pub struct Definition {
    /// Deployment identity.
    pub realm: RealmSection,
    /// Desired client settings.
    #[serde(default)]
    pub client: ClientSettings,
    /// Habilitation overrides.
    #[serde(default)]
    pub habilitation: HabilitationSection,
    /// Region aliases.
    #[serde(default)]
    pub regions: RegionSection,
}

impl Definition {
    /// Validate the mandatory fields beyond what serde enforces.
    pub fn validate(&self) -> SyncResult<()> {
        if self.realm.name.trim().is_empty() {
            return Err(SyncError::Config("realm.name must not be empty".into()));
        }
        if self.realm.client_id.trim().is_empty() {
            return Err(SyncError::Config("realm.client_id must not be empty".into()));
        }
        if self.realm.admin.trim().is_empty() {
            return Err(SyncError::Config("realm.admin must not be empty".into()));
        }
        Ok(())
    }

    /// The habilitation table: overrides when present, shipped defaults
    /// otherwise.
    #[must_use]
    pub fn habilitation_table(&self) -> HabilitationTable {
        if self.habilitation.levels.is_empty() {
            return HabilitationTable::default();
        }
        let levels = self
            .habilitation
            .levels
            .iter()
            .map(|(level, roles)| {
                (
                    level.trim().to_lowercase(),
                    roles.iter().map(|r| RoleName::from(r.as_str())).collect(),
                )
            })
            .collect();
        HabilitationTable::new(levels)
    }

    /// The administrative board identity.
    #[must_use]
    pub fn admin_identity(&self) -> Username {
        Username::new(self.realm.admin.as_str())
    }
}

/// Parse a definition from TOML text.
pub fn parse_definition(text: &str) -> SyncResult<Definition> {
    let definition: Definition = toml::from_str(text)
        .map_err(|e| SyncError::Config(format!("realm definition: {e}")))?;
    definition.validate()?;
    Ok(definition)
}

/// Load and parse the definition file.
pub fn load_definition(path: &Path) -> SyncResult<Definition> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        SyncError::Config(format!("cannot read definition {}: {e}", path.display()))
    })?;
    parse_definition(&text)
}
