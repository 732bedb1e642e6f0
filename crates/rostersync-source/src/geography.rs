//! Geographic reference table and role graph construction.
//!
//! The region→départements table is a compiled-in constant: it changes on
//! administrative reform, not per deployment. Per-deployment naming is
//! handled by the alias map from the definition file, which renames the
//! composite role a region produces.

use std::collections::BTreeMap;

use rostersync_directory::types::{RoleGraph, RoleName};

/// Metropolitan regions and their département codes.
const REGIONS: &[(&str, &[&str])] = &[
    (
        "Auvergne-Rhône-Alpes",
        &["01", "03", "07", "15", "26", "38", "42", "43", "63", "69", "73", "74"],
    ),
    (
        "Bourgogne-Franche-Comté",
        &["21", "25", "39", "58", "70", "71", "89", "90"],
    ),
    ("Bretagne", &["22", "29", "35", "56"]),
    ("Centre-Val de Loire", &["18", "28", "36", "37", "41", "45"]),
    ("Corse", &["2A", "2B"]),
    (
        "Grand Est",
        &["08", "10", "51", "52", "54", "55", "57", "67", "68", "88"],
    ),
    ("Hauts-de-France", &["02", "59", "60", "62", "80"]),
    (
        "Île-de-France",
        &["75", "77", "78", "91", "92", "93", "94", "95"],
    ),
    ("Normandie", &["14", "27", "50", "61", "76"]),
    (
        "Nouvelle-Aquitaine",
        &["16", "17", "19", "23", "24", "33", "40", "47", "64", "79", "86", "87"],
    ),
    (
        "Occitanie",
        &["09", "11", "12", "30", "31", "32", "34", "46", "48", "65", "66", "81", "82"],
    ),
    ("Pays de la Loire", &["44", "49", "53", "72", "85"]),
    (
        "Provence-Alpes-Côte d'Azur",
        &["04", "05", "06", "13", "83", "84"],
    ),
];

/// Build the composite-role graph from the reference table.
///
/// Each region becomes one composite whose members are its département
/// roles; `aliases` renames the composite for deployments that use short
/// region codes as role names. The result is desired-state input, built
/// once and never mutated by reconciliation.
#[must_use]
pub fn build_role_graph(aliases: &BTreeMap<String, String>) -> RoleGraph {
    let mut graph = RoleGraph::new();
    for (region, departements) in REGIONS {
        let composite = aliases
            .get(*region)
            .map(String::as_str)
            .unwrap_or(region);
        graph.insert(
            RoleName::from(composite),
            departements.iter().map(|d| RoleName::from(*d)),
        );
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_region_becomes_a_composite() {
        let graph = build_role_graph(&BTreeMap::new());
        assert_eq!(graph.len(), REGIONS.len());
        let all = graph.referenced_roles();
        assert!(all.contains(&RoleName::from("Bretagne")));
        assert!(all.contains(&RoleName::from("2A")));
    }

    #[test]
    fn aliases_rename_composites() {
        let mut aliases = BTreeMap::new();
        aliases.insert("Bretagne".to_string(), "bzh".to_string());
        let graph = build_role_graph(&aliases);
        let all = graph.referenced_roles();
        assert!(all.contains(&RoleName::from("bzh")));
        assert!(!all.contains(&RoleName::from("Bretagne")));
        // Members are untouched by aliasing.
        assert!(all.contains(&RoleName::from("56")));
    }

    #[test]
    fn building_twice_yields_identical_graphs() {
        let aliases = BTreeMap::new();
        assert_eq!(build_role_graph(&aliases), build_role_graph(&aliases));
    }
}
