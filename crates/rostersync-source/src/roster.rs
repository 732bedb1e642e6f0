//! Roster CSV parsing.
//!
//! One row per person. Multi-valued cells (boards, scope, roles) are
//! semicolon-separated. Rows without a username are skipped with a
//! warning; duplicate usernames keep the last row seen, also with a
//! warning, so a roster edit lower in the file wins.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use rostersync_core::{SyncError, SyncResult};
use rostersync_directory::types::{DesiredUser, RoleName, Username};

#[derive(Debug, Deserialize)]
struct RosterRow {
    username: String,
    #[serde(default)]
    prenom: String,
    #[serde(default)]
    nom: String,
    #[serde(default)]
    segment: String,
    #[serde(default)]
    fonction: String,
    #[serde(default)]
    departement: String,
    #[serde(default)]
    niveau: String,
    #[serde(default)]
    boards: String,
    #[serde(default)]
    scope: String,
    #[serde(default)]
    roles: String,
}

fn split_multi(cell: &str) -> Vec<String> {
    cell.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl RosterRow {
    fn into_user(self) -> DesiredUser {
        let geography = {
            let dep = self.departement.trim();
            if dep.is_empty() {
                None
            } else {
                Some(dep.to_string())
            }
        };
        DesiredUser {
            username: Username::new(self.username.trim()),
            first_name: self.prenom.trim().to_string(),
            last_name: self.nom.trim().to_string(),
            organization: self.segment.trim().to_string(),
            geography,
            function: self.fonction.trim().to_string(),
            habilitation: self.niveau.trim().to_string(),
            scope_tags: split_multi(&self.scope).into_iter().map(RoleName::from).collect(),
            extra_roles: split_multi(&self.roles).into_iter().map(RoleName::from).collect(),
            boards: split_multi(&self.boards),
        }
    }
}

/// Parse a roster from any reader.
pub fn parse_roster<R: Read>(reader: R) -> SyncResult<Vec<DesiredUser>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut users: Vec<DesiredUser> = Vec::new();
    let mut index: HashMap<Username, usize> = HashMap::new();

    for (line, record) in csv_reader.deserialize::<RosterRow>().enumerate() {
        let row = record.map_err(|e| SyncError::Config(format!("roster row {}: {e}", line + 2)))?;
        if row.username.trim().is_empty() {
            warn!(line = line + 2, "roster row without username, skipping");
            continue;
        }
        let user = row.into_user();
        match index.get(&user.username) {
            Some(&existing) => {
                warn!(
                    username = %user.username,
                    "duplicate roster entry, keeping the last one"
                );
                users[existing] = user;
            }
            None => {
                index.insert(user.username.clone(), users.len());
                users.push(user);
            }
        }
    }

    Ok(users)
}

/// Load and parse the roster file.
pub fn load_roster(path: &Path) -> SyncResult<Vec<DesiredUser>> {
    let file = std::fs::File::open(path)
        .map_err(|e| SyncError::Config(format!("cannot open roster {}: {e}", path.display())))?;
    parse_roster(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "username,prenom,nom,segment,fonction,departement,niveau,boards,scope,roles\n";

    fn parse(body: &str) -> Vec<DesiredUser> {
        let csv = format!("{HEADER}{body}");
        parse_roster(csv.as_bytes()).unwrap()
    }

    #[test]
    fn parses_a_full_row() {
        let users = parse(
            "jean@example.org,Jean,Dupont,DGFIP,analyste,35,a,crp;tableau-35,urssaf,extra\n",
        );
        assert_eq!(users.len(), 1);
        let u = &users[0];
        assert_eq!(u.username, Username::new("jean@example.org"));
        assert_eq!(u.first_name, "Jean");
        assert_eq!(u.geography.as_deref(), Some("35"));
        assert_eq!(u.habilitation, "a");
        assert_eq!(u.boards, vec!["crp".to_string(), "tableau-35".to_string()]);
        assert_eq!(u.scope_tags, vec![RoleName::from("urssaf")]);
        assert_eq!(u.extra_roles, vec![RoleName::from("extra")]);
    }

    #[test]
    fn skips_rows_without_username() {
        let users = parse(",X,Y,,,,a,,,\njean@example.org,Jean,Dupont,,,,a,,,\n");
        assert_eq!(users.len(), 1);
    }

    #[test]
    fn duplicate_username_keeps_last_row() {
        let users = parse(
            "jean@example.org,Jean,Dupont,,,,a,,,\nJEAN@example.org,Second,Version,,,,b,,,\n",
        );
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].first_name, "Second");
        assert_eq!(users[0].habilitation, "b");
    }

    #[test]
    fn empty_multi_cells_yield_empty_lists() {
        let users = parse("jean@example.org,Jean,Dupont,,,,a,,,\n");
        assert!(users[0].boards.is_empty());
        assert!(users[0].scope_tags.is_empty());
        assert!(users[0].geography.is_none());
    }

    #[test]
    fn malformed_row_is_a_config_error() {
        // A row with too few columns cannot deserialize.
        let csv = format!("{HEADER}only-one-column\n");
        let err = parse_roster(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }
}
