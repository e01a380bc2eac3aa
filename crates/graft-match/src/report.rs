//! Output of a matching run, keyed by stable identity tuples so the report
//! survives independently of the in-memory graphs and can be serialized for
//! the downstream renaming tool.

use serde::{Deserialize, Serialize};

use graft_graph::{MemberRef, ProgramGraph};

use crate::error::{Error, Result};
use crate::table::MatchTable;

/// An entity that ended with tied top candidates. Reported for manual
/// adjudication instead of guessing; a wrong guess would poison the
/// constraint tightening of any later seeded run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ambiguity<K> {
    pub entity: K,
    pub candidates: Vec<K>,
}

/// Terminal classification of one entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindReport<K> {
    /// Committed old -> new correspondences. A partial injection: no key or
    /// value appears twice.
    pub committed: Vec<(K, K)>,
    /// Old-build entities with surviving candidates but no unique winner.
    pub ambiguous_old: Vec<Ambiguity<K>>,
    /// New-build entities in the same situation, with their old candidates.
    pub ambiguous_new: Vec<Ambiguity<K>>,
    /// Old-build entities with no surviving compatible counterpart.
    pub unresolved_old: Vec<K>,
    /// New-build entities nothing in the old build corresponds to.
    pub unresolved_new: Vec<K>,
}

impl<K> Default for KindReport<K> {
    fn default() -> Self {
        KindReport {
            committed: Vec::new(),
            ambiguous_old: Vec::new(),
            ambiguous_new: Vec::new(),
            unresolved_old: Vec::new(),
            unresolved_new: Vec::new(),
        }
    }
}

impl<K> KindReport<K> {
    /// True when every entity of this kind on both sides was committed.
    #[must_use]
    pub fn is_total(&self) -> bool {
        self.ambiguous_old.is_empty()
            && self.ambiguous_new.is_empty()
            && self.unresolved_old.is_empty()
            && self.unresolved_new.is_empty()
    }
}

/// Full result of a matching run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Scoring rounds executed, including the final round that committed
    /// nothing.
    pub rounds: usize,
    pub classes: KindReport<String>,
    pub methods: KindReport<MemberRef>,
    pub fields: KindReport<MemberRef>,
}

impl MatchReport {
    #[must_use]
    pub fn committed_count(&self) -> usize {
        self.classes.committed.len() + self.methods.committed.len() + self.fields.committed.len()
    }

    #[must_use]
    pub fn is_total(&self) -> bool {
        self.classes.is_total() && self.methods.is_total() && self.fields.is_total()
    }

    /// Rebuilds a committed-match table from this report, for seeding a
    /// later run (parameter tuning, re-runs after manual correction).
    ///
    /// Fails with [`Error::UnknownEntity`] when the report names an identity
    /// the given graphs do not contain.
    pub fn to_table(&self, old: &ProgramGraph, new: &ProgramGraph) -> Result<MatchTable> {
        let unknown = |entity: String| Error::UnknownEntity { entity };
        let mut table = MatchTable::new();
        for (a, b) in &self.classes.committed {
            let a_id = old.class_by_name(a).ok_or_else(|| unknown(a.clone()))?;
            let b_id = new.class_by_name(b).ok_or_else(|| unknown(b.clone()))?;
            table.commit_class(a_id, b_id)?;
        }
        for (a, b) in &self.methods.committed {
            let a_id = old
                .method_by_key(&a.owner, &a.name, &a.descriptor)
                .ok_or_else(|| unknown(a.to_string()))?;
            let b_id = new
                .method_by_key(&b.owner, &b.name, &b.descriptor)
                .ok_or_else(|| unknown(b.to_string()))?;
            table.commit_method(a_id, b_id)?;
        }
        for (a, b) in &self.fields.committed {
            let a_id = old
                .field_by_key(&a.owner, &a.name, &a.descriptor)
                .ok_or_else(|| unknown(a.to_string()))?;
            let b_id = new
                .field_by_key(&b.owner, &b.name, &b.descriptor)
                .ok_or_else(|| unknown(b.to_string()))?;
            table.commit_field(a_id, b_id)?;
        }
        Ok(table)
    }
}
