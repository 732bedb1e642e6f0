//! Three-way set difference.
//!
//! Every reconciler in the engine diffs desired against actual through this
//! one primitive, so the edge cases (empty sides, duplicates, ordering) are
//! decided exactly once.

use std::collections::BTreeSet;

/// Result of partitioning a desired set against an actual set.
///
/// Every input key appears in exactly one field. All three fields are
/// always present (empty, never missing) and sorted, so output order is
/// deterministic for a given pair of inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition<K> {
    /// Keys present in desired only: the things to create.
    pub only_desired: Vec<K>,
    /// Keys present on both sides: the things to converge in place.
    pub both: Vec<K>,
    /// Keys present in actual only: the candidates for removal.
    pub only_actual: Vec<K>,
}

impl<K> Partition<K> {
    /// Whether both sides already agree.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.only_desired.is_empty() && self.only_actual.is_empty()
    }
}

/// Partition `desired` against `actual`.
///
/// Pure and side-effect free. Duplicate keys within one input collapse to
/// a single key. Guarantees:
///
/// - `only_desired ∪ both = desired`
/// - `both ∪ only_actual = actual`
/// - the three outputs are pairwise disjoint
pub fn partition<K, D, A>(desired: D, actual: A) -> Partition<K>
where
    K: Ord + Clone,
    D: IntoIterator<Item = K>,
    A: IntoIterator<Item = K>,
{
    let desired: BTreeSet<K> = desired.into_iter().collect();
    let actual: BTreeSet<K> = actual.into_iter().collect();

    Partition {
        only_desired: desired.difference(&actual).cloned().collect(),
        both: desired.intersection(&actual).cloned().collect(),
        only_actual: actual.difference(&desired).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn keys(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn splits_into_three_disjoint_parts() {
        let p = partition(keys(&["a", "b", "c"]), keys(&["b", "c", "d"]));
        assert_eq!(p.only_desired, keys(&["a"]));
        assert_eq!(p.both, keys(&["b", "c"]));
        assert_eq!(p.only_actual, keys(&["d"]));
    }

    #[test]
    fn union_laws_hold() {
        let desired = keys(&["u1", "u2", "u3", "u5"]);
        let actual = keys(&["u2", "u4", "u5"]);
        let p = partition(desired.clone(), actual.clone());

        let mut d: BTreeSet<_> = p.only_desired.iter().cloned().collect();
        d.extend(p.both.iter().cloned());
        assert_eq!(d, desired.into_iter().collect::<BTreeSet<_>>());

        let mut a: BTreeSet<_> = p.both.iter().cloned().collect();
        a.extend(p.only_actual.iter().cloned());
        assert_eq!(a, actual.into_iter().collect::<BTreeSet<_>>());

        let only_d: BTreeSet<_> = p.only_desired.iter().collect();
        let both: BTreeSet<_> = p.both.iter().collect();
        assert!(only_d.is_disjoint(&both));
    }

    #[test]
    fn tolerates_empty_sides() {
        let p = partition(Vec::<String>::new(), keys(&["x"]));
        assert!(p.only_desired.is_empty());
        assert!(p.both.is_empty());
        assert_eq!(p.only_actual, keys(&["x"]));

        let p = partition(keys(&["x"]), Vec::<String>::new());
        assert_eq!(p.only_desired, keys(&["x"]));

        let p = partition(Vec::<String>::new(), Vec::<String>::new());
        assert!(p.is_converged());
        assert!(p.both.is_empty());
    }

    #[test]
    fn deterministic_and_idempotent() {
        let desired = keys(&["z", "a", "m"]);
        let actual = keys(&["m", "q"]);
        let first = partition(desired.clone(), actual.clone());
        let second = partition(desired, actual);
        assert_eq!(first, second);
        // Sorted output regardless of input order.
        assert_eq!(first.only_desired, keys(&["a", "z"]));
    }

    #[test]
    fn duplicates_collapse() {
        let p = partition(keys(&["a", "a", "b"]), keys(&["b", "b"]));
        assert_eq!(p.only_desired, keys(&["a"]));
        assert_eq!(p.both, keys(&["b"]));
        assert!(p.only_actual.is_empty());
    }

    #[test]
    fn identical_sides_are_converged() {
        let p = partition(keys(&["a", "b"]), keys(&["b", "a"]));
        assert!(p.is_converged());
        assert_eq!(p.both, keys(&["a", "b"]));
    }
}
