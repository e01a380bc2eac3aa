//! The committed-match side table.
//!
//! Matching never mutates the program graphs; all mutable state lives here,
//! keyed by entity id in both directions. The table is the only structure
//! shared across rounds, and scoring only ever sees it through a read-only
//! [`MatchSnapshot`], so the parallel scoring sweep observes one consistent
//! version per round.

use std::collections::BTreeMap;
use std::fmt::Debug;

use graft_graph::{ClassId, FieldId, MethodId};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
struct PairMap<I: Ord> {
    fwd: BTreeMap<I, I>,
    rev: BTreeMap<I, I>,
}

// Derived `Default` would demand `I: Default`, which the id newtypes
// deliberately do not implement.
impl<I: Ord> Default for PairMap<I> {
    fn default() -> Self {
        PairMap {
            fwd: BTreeMap::new(),
            rev: BTreeMap::new(),
        }
    }
}

impl<I: Copy + Ord + Debug> PairMap<I> {
    /// Inserts a pair, rejecting any contradiction. Re-inserting an existing
    /// pair is a no-op so seeding a table twice is harmless.
    fn insert(&mut self, old: I, new: I) -> Result<bool> {
        match (self.fwd.get(&old), self.rev.get(&new)) {
            (Some(&mapped), _) if mapped == new => Ok(false),
            (Some(_), _) => Err(Error::Conflict {
                side: "old",
                entity: format!("{old:?}"),
            }),
            (None, Some(_)) => Err(Error::Conflict {
                side: "new",
                entity: format!("{new:?}"),
            }),
            (None, None) => {
                self.fwd.insert(old, new);
                self.rev.insert(new, old);
                Ok(true)
            }
        }
    }

    fn of_old(&self, old: I) -> Option<I> {
        self.fwd.get(&old).copied()
    }

    fn of_new(&self, new: I) -> Option<I> {
        self.rev.get(&new).copied()
    }

    /// True unless one endpoint is committed away from the other. A pair
    /// committed to each other is still allowed.
    fn allows(&self, old: I, new: I) -> bool {
        match self.fwd.get(&old) {
            Some(&mapped) => mapped == new,
            None => self.rev.get(&new).is_none(),
        }
    }
}

/// Bidirectional committed mapping over all three entity kinds, with a
/// version that increases on every new commitment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchTable {
    version: u64,
    classes: PairMap<ClassId>,
    methods: PairMap<MethodId>,
    fields: PairMap<FieldId>,
}

impl MatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.fwd.len() + self.methods.fwd.len() + self.fields.fwd.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn commit_class(&mut self, old: ClassId, new: ClassId) -> Result<()> {
        if self.classes.insert(old, new)? {
            self.version += 1;
        }
        Ok(())
    }

    pub fn commit_method(&mut self, old: MethodId, new: MethodId) -> Result<()> {
        if self.methods.insert(old, new)? {
            self.version += 1;
        }
        Ok(())
    }

    pub fn commit_field(&mut self, old: FieldId, new: FieldId) -> Result<()> {
        if self.fields.insert(old, new)? {
            self.version += 1;
        }
        Ok(())
    }

    pub fn class_of_old(&self, old: ClassId) -> Option<ClassId> {
        self.classes.of_old(old)
    }

    pub fn class_of_new(&self, new: ClassId) -> Option<ClassId> {
        self.classes.of_new(new)
    }

    pub fn method_of_old(&self, old: MethodId) -> Option<MethodId> {
        self.methods.of_old(old)
    }

    pub fn method_of_new(&self, new: MethodId) -> Option<MethodId> {
        self.methods.of_new(new)
    }

    pub fn field_of_old(&self, old: FieldId) -> Option<FieldId> {
        self.fields.of_old(old)
    }

    pub fn field_of_new(&self, new: FieldId) -> Option<FieldId> {
        self.fields.of_new(new)
    }

    /// Committed class pairs in old-id order.
    pub fn class_pairs(&self) -> impl Iterator<Item = (ClassId, ClassId)> + '_ {
        self.classes.fwd.iter().map(|(&a, &b)| (a, b))
    }

    pub fn method_pairs(&self) -> impl Iterator<Item = (MethodId, MethodId)> + '_ {
        self.methods.fwd.iter().map(|(&a, &b)| (a, b))
    }

    pub fn field_pairs(&self) -> impl Iterator<Item = (FieldId, FieldId)> + '_ {
        self.fields.fwd.iter().map(|(&a, &b)| (a, b))
    }

    pub fn snapshot(&self) -> MatchSnapshot<'_> {
        MatchSnapshot { table: self }
    }
}

/// Read-only view of a [`MatchTable`] handed to the scoring sweep.
#[derive(Debug, Clone, Copy)]
pub struct MatchSnapshot<'a> {
    table: &'a MatchTable,
}

impl MatchSnapshot<'_> {
    /// Whether a cross-build class pair may still contribute to a score:
    /// false once either side is committed to some other counterpart.
    pub fn allows_class(&self, old: ClassId, new: ClassId) -> bool {
        self.table.classes.allows(old, new)
    }

    pub fn allows_method(&self, old: MethodId, new: MethodId) -> bool {
        self.table.methods.allows(old, new)
    }

    pub fn allows_field(&self, old: FieldId, new: FieldId) -> bool {
        self.table.fields.allows(old, new)
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.table.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_graph::GraphBuilder;

    fn ids() -> (ClassId, ClassId, ClassId) {
        // Ids are opaque; mint some through a throwaway builder.
        let mut b = GraphBuilder::new();
        let x = b.add_class("x", None).unwrap();
        let y = b.add_class("y", None).unwrap();
        let z = b.add_class("z", None).unwrap();
        (x, y, z)
    }

    #[test]
    fn fresh_table_is_empty_for_every_kind() {
        // The ids carry no `Default`; an empty table must not require one.
        let table = MatchTable::new();
        assert!(table.is_empty());
        assert_eq!(table.version(), 0);
        assert_eq!(table.class_pairs().count(), 0);
        assert_eq!(table.method_pairs().count(), 0);
        assert_eq!(table.field_pairs().count(), 0);
    }

    #[test]
    fn contradictory_commitments_are_rejected() {
        let (x, y, z) = ids();
        let mut table = MatchTable::new();
        table.commit_class(x, y).unwrap();
        assert_eq!(
            table.commit_class(x, z).unwrap_err(),
            Error::Conflict {
                side: "old",
                entity: format!("{x:?}")
            }
        );
        assert!(table.commit_class(z, y).is_err());
        // The accepted pair survives intact.
        assert_eq!(table.class_of_old(x), Some(y));
        assert_eq!(table.class_of_new(y), Some(x));
    }

    #[test]
    fn reinserting_a_pair_is_a_noop() {
        let (x, y, _) = ids();
        let mut table = MatchTable::new();
        table.commit_class(x, y).unwrap();
        let version = table.version();
        table.commit_class(x, y).unwrap();
        assert_eq!(table.version(), version);
    }

    #[test]
    fn snapshot_allows_tracks_commitments() {
        let (x, y, z) = ids();
        let mut table = MatchTable::new();
        assert!(table.snapshot().allows_class(x, y));

        table.commit_class(x, y).unwrap();
        let snap = table.snapshot();
        // Committed to each other: still allowed.
        assert!(snap.allows_class(x, y));
        // Committed elsewhere: excluded from both directions.
        assert!(!snap.allows_class(x, z));
        assert!(!snap.allows_class(z, y));
        // Uninvolved pair: allowed.
        assert!(snap.allows_class(z, z));
    }
}
