//! The matching driver: round-based fixed-point refinement over the
//! candidate space of two program graphs.
//!
//! Each round scores every surviving candidate pair and commits the pairs
//! that are the strict top choice from *both* sides, which avoids one-sided
//! greedy assignment errors. Committed pairs leave the candidate pools and
//! become hard constraints for the next round's scores, so earlier ties
//! tighten progressively. The loop stops when a round commits nothing (or
//! at the round cap, a safety bound); what remains is classified as
//! ambiguous or unresolved and reported, never guessed.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use graft_graph::{ClassId, FieldId, MethodId, ProgramGraph};

use crate::compat::{classes_compatible, fields_compatible, methods_compatible};
use crate::error::{Error, Result};
use crate::report::{Ambiguity, KindReport, MatchReport};
use crate::score::{score_classes, score_fields, score_methods};
use crate::table::MatchTable;

/// Which owner-class pairs member candidates are drawn from. The naive full
/// cross product is quadratic in program size, so some pruning is required,
/// not optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberScope {
    /// Compare methods and fields only inside owner-class pairs that are
    /// already committed. Members of classes that never commit end
    /// unresolved.
    CommittedOwners,
    /// Compare members across every compatible owner pair. Much more
    /// expensive; useful on small inputs or when members migrate between
    /// classes across builds.
    AllCompatibleOwners,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Hard cap on refinement rounds. Convergence normally takes far fewer;
    /// the cap only bounds pathological inputs.
    pub max_rounds: usize,
    pub member_scope: MemberScope,
    /// Optional class-level fast-reject: skip class pairs whose member
    /// counts differ by more than this factor. `None` disables it, which
    /// only costs scoring time, never correctness.
    pub class_size_ratio: Option<f64>,
    /// Score candidate pairs on the rayon thread pool. The commit phase is
    /// sequential either way.
    pub parallel: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        MatcherConfig {
            max_rounds: 64,
            member_scope: MemberScope::CommittedOwners,
            class_size_ratio: None,
            parallel: true,
        }
    }
}

/// Matches the entities of an old build against a new build.
///
/// Both graphs are read-only for the whole run; all matching state lives in
/// a [`MatchTable`], so the same graphs can be reused across runs.
pub struct Matcher<'a> {
    old: &'a ProgramGraph,
    new: &'a ProgramGraph,
    config: MatcherConfig,
}

impl<'a> Matcher<'a> {
    pub fn new(old: &'a ProgramGraph, new: &'a ProgramGraph, config: MatcherConfig) -> Self {
        Matcher { old, new, config }
    }

    /// Runs matching from scratch.
    pub fn run(&self) -> Result<MatchReport> {
        self.run_from(MatchTable::new())
    }

    /// Runs matching on top of pre-seeded commitments, e.g. a prior run's
    /// accepted result plus manual corrections.
    pub fn run_with_seed(&self, seed: &MatchTable) -> Result<MatchReport> {
        self.validate_seed(seed)?;
        self.run_from(seed.clone())
    }

    fn run_from(&self, mut table: MatchTable) -> Result<MatchReport> {
        let mut rounds = 0;
        loop {
            rounds += 1;
            let committed = self.round(&mut table)?;
            tracing::debug!(
                round = rounds,
                committed,
                total = table.len(),
                "matching round finished"
            );
            if committed == 0 {
                break;
            }
            if rounds >= self.config.max_rounds {
                tracing::debug!(rounds, "round cap reached before convergence");
                break;
            }
        }
        let report = self.build_report(&table, rounds);
        tracing::info!(
            rounds,
            committed = report.committed_count(),
            total_old = self.old.class_count() + self.old.method_count() + self.old.field_count(),
            total_new = self.new.class_count() + self.new.method_count() + self.new.field_count(),
            "matching converged"
        );
        Ok(report)
    }

    fn round(&self, table: &mut MatchTable) -> Result<usize> {
        let (classes, methods, fields) = {
            let snap = table.snapshot();
            let parallel = self.config.parallel;
            let class_scored = score_candidates(
                self.class_candidates(table),
                |a, b| score_classes(self.old, self.new, a, b, &snap),
                parallel,
            );
            let method_scored = score_candidates(
                self.method_candidates(table),
                |a, b| score_methods(self.old, self.new, a, b, &snap),
                parallel,
            );
            let field_scored = score_candidates(
                self.field_candidates(table),
                |a, b| score_fields(self.old, self.new, a, b, &snap),
                parallel,
            );
            (
                mutual_top1(&class_scored),
                mutual_top1(&method_scored),
                mutual_top1(&field_scored),
            )
        };

        let committed = classes.len() + methods.len() + fields.len();
        for (a, b) in classes {
            table.commit_class(a, b)?;
        }
        for (a, b) in methods {
            table.commit_method(a, b)?;
        }
        for (a, b) in fields {
            table.commit_field(a, b)?;
        }
        Ok(committed)
    }

    fn class_candidates(&self, table: &MatchTable) -> Vec<(ClassId, Vec<ClassId>)> {
        let new_pool: Vec<ClassId> = self
            .new
            .classes()
            .map(|(id, _)| id)
            .filter(|&b| table.class_of_new(b).is_none())
            .collect();
        self.old
            .classes()
            .map(|(id, _)| id)
            .filter(|&a| table.class_of_old(a).is_none())
            .map(|a| {
                let candidates = new_pool
                    .iter()
                    .copied()
                    .filter(|&b| classes_compatible(self.old, self.new, a, b))
                    .filter(|&b| self.class_sizes_ok(a, b))
                    .collect();
                (a, candidates)
            })
            .collect()
    }

    fn class_sizes_ok(&self, a: ClassId, b: ClassId) -> bool {
        let Some(ratio) = self.config.class_size_ratio else {
            return true;
        };
        let ca = self.old.class(a);
        let cb = self.new.class(b);
        let sa = ca.methods.len() + ca.fields.len();
        let sb = cb.methods.len() + cb.fields.len();
        let (lo, hi) = if sa <= sb { (sa, sb) } else { (sb, sa) };
        hi as f64 <= lo as f64 * ratio
    }

    fn method_candidates(&self, table: &MatchTable) -> Vec<(MethodId, Vec<MethodId>)> {
        match self.config.member_scope {
            MemberScope::CommittedOwners => {
                let mut out = Vec::new();
                for (oc, nc) in table.class_pairs() {
                    let new_pool: Vec<MethodId> = self
                        .new
                        .class(nc)
                        .methods
                        .iter()
                        .copied()
                        .filter(|&b| table.method_of_new(b).is_none())
                        .collect();
                    for &a in &self.old.class(oc).methods {
                        if table.method_of_old(a).is_some() {
                            continue;
                        }
                        let candidates = new_pool
                            .iter()
                            .copied()
                            .filter(|&b| methods_compatible(self.old, self.new, a, b))
                            .collect();
                        out.push((a, candidates));
                    }
                }
                out
            }
            MemberScope::AllCompatibleOwners => {
                let new_pool: Vec<MethodId> = self
                    .new
                    .methods()
                    .map(|(id, _)| id)
                    .filter(|&b| table.method_of_new(b).is_none())
                    .collect();
                self.old
                    .methods()
                    .map(|(id, _)| id)
                    .filter(|&a| table.method_of_old(a).is_none())
                    .map(|a| {
                        let candidates = new_pool
                            .iter()
                            .copied()
                            .filter(|&b| methods_compatible(self.old, self.new, a, b))
                            .collect();
                        (a, candidates)
                    })
                    .collect()
            }
        }
    }

    fn field_candidates(&self, table: &MatchTable) -> Vec<(FieldId, Vec<FieldId>)> {
        match self.config.member_scope {
            MemberScope::CommittedOwners => {
                let mut out = Vec::new();
                for (oc, nc) in table.class_pairs() {
                    let new_pool: Vec<FieldId> = self
                        .new
                        .class(nc)
                        .fields
                        .iter()
                        .copied()
                        .filter(|&b| table.field_of_new(b).is_none())
                        .collect();
                    for &a in &self.old.class(oc).fields {
                        if table.field_of_old(a).is_some() {
                            continue;
                        }
                        let candidates = new_pool
                            .iter()
                            .copied()
                            .filter(|&b| fields_compatible(self.old, self.new, a, b))
                            .collect();
                        out.push((a, candidates));
                    }
                }
                out
            }
            MemberScope::AllCompatibleOwners => {
                let new_pool: Vec<FieldId> = self
                    .new
                    .fields()
                    .map(|(id, _)| id)
                    .filter(|&b| table.field_of_new(b).is_none())
                    .collect();
                self.old
                    .fields()
                    .map(|(id, _)| id)
                    .filter(|&a| table.field_of_old(a).is_none())
                    .map(|a| {
                        let candidates = new_pool
                            .iter()
                            .copied()
                            .filter(|&b| fields_compatible(self.old, self.new, a, b))
                            .collect();
                        (a, candidates)
                    })
                    .collect()
            }
        }
    }

    fn build_report(&self, table: &MatchTable, rounds: usize) -> MatchReport {
        // Score the survivors once more against the final table so the
        // tied candidate sets reflect every committed constraint.
        let snap = table.snapshot();
        let parallel = self.config.parallel;

        let class_scored = score_candidates(
            self.class_candidates(table),
            |a, b| score_classes(self.old, self.new, a, b, &snap),
            parallel,
        );
        let method_scored = score_candidates(
            self.method_candidates(table),
            |a, b| score_methods(self.old, self.new, a, b, &snap),
            parallel,
        );
        let field_scored = score_candidates(
            self.field_candidates(table),
            |a, b| score_fields(self.old, self.new, a, b, &snap),
            parallel,
        );

        let classes = classify(
            &class_scored,
            &self.unmatched(self.old.classes().map(|(id, _)| id), |a| {
                table.class_of_old(a).is_some()
            }),
            &self.unmatched(self.new.classes().map(|(id, _)| id), |b| {
                table.class_of_new(b).is_some()
            }),
        );
        let methods = classify(
            &method_scored,
            &self.unmatched(self.old.methods().map(|(id, _)| id), |a| {
                table.method_of_old(a).is_some()
            }),
            &self.unmatched(self.new.methods().map(|(id, _)| id), |b| {
                table.method_of_new(b).is_some()
            }),
        );
        let fields = classify(
            &field_scored,
            &self.unmatched(self.old.fields().map(|(id, _)| id), |a| {
                table.field_of_old(a).is_some()
            }),
            &self.unmatched(self.new.fields().map(|(id, _)| id), |b| {
                table.field_of_new(b).is_some()
            }),
        );

        let class_name = |graph: &ProgramGraph, id: ClassId| graph.class(id).name.clone();

        MatchReport {
            rounds,
            classes: KindReport {
                committed: table
                    .class_pairs()
                    .map(|(a, b)| (class_name(self.old, a), class_name(self.new, b)))
                    .collect(),
                ambiguous_old: classes
                    .ambiguous_old
                    .into_iter()
                    .map(|(a, cands)| Ambiguity {
                        entity: class_name(self.old, a),
                        candidates: cands.into_iter().map(|b| class_name(self.new, b)).collect(),
                    })
                    .collect(),
                ambiguous_new: classes
                    .ambiguous_new
                    .into_iter()
                    .map(|(b, cands)| Ambiguity {
                        entity: class_name(self.new, b),
                        candidates: cands.into_iter().map(|a| class_name(self.old, a)).collect(),
                    })
                    .collect(),
                unresolved_old: classes
                    .unresolved_old
                    .into_iter()
                    .map(|a| class_name(self.old, a))
                    .collect(),
                unresolved_new: classes
                    .unresolved_new
                    .into_iter()
                    .map(|b| class_name(self.new, b))
                    .collect(),
            },
            methods: KindReport {
                committed: table
                    .method_pairs()
                    .map(|(a, b)| (self.old.method_ref(a), self.new.method_ref(b)))
                    .collect(),
                ambiguous_old: methods
                    .ambiguous_old
                    .into_iter()
                    .map(|(a, cands)| Ambiguity {
                        entity: self.old.method_ref(a),
                        candidates: cands.into_iter().map(|b| self.new.method_ref(b)).collect(),
                    })
                    .collect(),
                ambiguous_new: methods
                    .ambiguous_new
                    .into_iter()
                    .map(|(b, cands)| Ambiguity {
                        entity: self.new.method_ref(b),
                        candidates: cands.into_iter().map(|a| self.old.method_ref(a)).collect(),
                    })
                    .collect(),
                unresolved_old: methods
                    .unresolved_old
                    .into_iter()
                    .map(|a| self.old.method_ref(a))
                    .collect(),
                unresolved_new: methods
                    .unresolved_new
                    .into_iter()
                    .map(|b| self.new.method_ref(b))
                    .collect(),
            },
            fields: KindReport {
                committed: table
                    .field_pairs()
                    .map(|(a, b)| (self.old.field_ref(a), self.new.field_ref(b)))
                    .collect(),
                ambiguous_old: fields
                    .ambiguous_old
                    .into_iter()
                    .map(|(a, cands)| Ambiguity {
                        entity: self.old.field_ref(a),
                        candidates: cands.into_iter().map(|b| self.new.field_ref(b)).collect(),
                    })
                    .collect(),
                ambiguous_new: fields
                    .ambiguous_new
                    .into_iter()
                    .map(|(b, cands)| Ambiguity {
                        entity: self.new.field_ref(b),
                        candidates: cands.into_iter().map(|a| self.old.field_ref(a)).collect(),
                    })
                    .collect(),
                unresolved_old: fields
                    .unresolved_old
                    .into_iter()
                    .map(|a| self.old.field_ref(a))
                    .collect(),
                unresolved_new: fields
                    .unresolved_new
                    .into_iter()
                    .map(|b| self.new.field_ref(b))
                    .collect(),
            },
        }
    }

    fn unmatched<I>(&self, all: impl Iterator<Item = I>, matched: impl Fn(I) -> bool) -> Vec<I>
    where
        I: Copy,
    {
        all.filter(|&id| !matched(id)).collect()
    }

    fn validate_seed(&self, seed: &MatchTable) -> Result<()> {
        let unknown = |entity: String| Error::UnknownEntity { entity };
        for (a, b) in seed.class_pairs() {
            if a.idx() >= self.old.class_count() {
                return Err(unknown(format!("{a:?}")));
            }
            if b.idx() >= self.new.class_count() {
                return Err(unknown(format!("{b:?}")));
            }
        }
        for (a, b) in seed.method_pairs() {
            if a.idx() >= self.old.method_count() {
                return Err(unknown(format!("{a:?}")));
            }
            if b.idx() >= self.new.method_count() {
                return Err(unknown(format!("{b:?}")));
            }
        }
        for (a, b) in seed.field_pairs() {
            if a.idx() >= self.old.field_count() {
                return Err(unknown(format!("{a:?}")));
            }
            if b.idx() >= self.new.field_count() {
                return Err(unknown(format!("{b:?}")));
            }
        }
        Ok(())
    }
}

fn score_candidates<I, F>(
    candidates: Vec<(I, Vec<I>)>,
    score: F,
    parallel: bool,
) -> Vec<(I, Vec<(I, u32)>)>
where
    I: Copy + Send + Sync,
    F: Fn(I, I) -> u32 + Sync,
{
    let eval = |(a, list): (I, Vec<I>)| {
        let scored: Vec<(I, u32)> = list.into_iter().map(|b| (b, score(a, b))).collect();
        (a, scored)
    };
    if parallel {
        candidates.into_par_iter().map(eval).collect()
    } else {
        candidates.into_iter().map(eval).collect()
    }
}

/// The single candidate attaining a strictly highest score, if any.
fn unique_max<I: Copy>(scored: &[(I, u32)]) -> Option<I> {
    let mut best: Option<(I, u32)> = None;
    let mut tied = false;
    for &(b, s) in scored {
        match best {
            None => {
                best = Some((b, s));
            }
            Some((_, bs)) if s > bs => {
                best = Some((b, s));
                tied = false;
            }
            Some((_, bs)) if s == bs => tied = true,
            Some(_) => {}
        }
    }
    match best {
        Some((b, _)) if !tied => Some(b),
        _ => None,
    }
}

/// Pairs that are the strict top choice from both sides. The result is a
/// matching by construction: each old and each new entity appears at most
/// once.
fn mutual_top1<I: Copy + Eq + Ord>(scored: &[(I, Vec<(I, u32)>)]) -> Vec<(I, I)> {
    let mut best_old: BTreeMap<I, (u32, Option<I>)> = BTreeMap::new();
    for (a, list) in scored {
        for &(b, s) in list {
            match best_old.entry(b) {
                Entry::Vacant(entry) => {
                    entry.insert((s, Some(*a)));
                }
                Entry::Occupied(mut entry) => {
                    let slot = entry.get_mut();
                    if s > slot.0 {
                        *slot = (s, Some(*a));
                    } else if s == slot.0 {
                        slot.1 = None;
                    }
                }
            }
        }
    }

    let mut pairs = Vec::new();
    for (a, list) in scored {
        let Some(b) = unique_max(list) else { continue };
        if best_old.get(&b).and_then(|slot| slot.1) == Some(*a) {
            pairs.push((*a, b));
        }
    }
    pairs
}

struct Classification<I> {
    ambiguous_old: Vec<(I, Vec<I>)>,
    ambiguous_new: Vec<(I, Vec<I>)>,
    unresolved_old: Vec<I>,
    unresolved_new: Vec<I>,
}

/// Terminal classification of the entities a converged run left unmatched:
/// ambiguous when compatible candidates survive (listing the tied top set),
/// unresolved when none do.
fn classify<I: Copy + Eq + Ord>(
    scored: &[(I, Vec<(I, u32)>)],
    unmatched_old: &[I],
    unmatched_new: &[I],
) -> Classification<I> {
    let by_old: BTreeMap<I, &Vec<(I, u32)>> = scored.iter().map(|(a, list)| (*a, list)).collect();
    let mut by_new: BTreeMap<I, Vec<(I, u32)>> = BTreeMap::new();
    for (a, list) in scored {
        for &(b, s) in list {
            by_new.entry(b).or_default().push((*a, s));
        }
    }

    let mut out = Classification {
        ambiguous_old: Vec::new(),
        ambiguous_new: Vec::new(),
        unresolved_old: Vec::new(),
        unresolved_new: Vec::new(),
    };
    for &a in unmatched_old {
        match by_old.get(&a) {
            Some(list) if !list.is_empty() => out.ambiguous_old.push((a, top_set(list))),
            _ => out.unresolved_old.push(a),
        }
    }
    for &b in unmatched_new {
        match by_new.get(&b) {
            Some(list) if !list.is_empty() => out.ambiguous_new.push((b, top_set(list))),
            _ => out.unresolved_new.push(b),
        }
    }
    out
}

fn top_set<I: Copy>(list: &[(I, u32)]) -> Vec<I> {
    let max = list.iter().map(|&(_, s)| s).max().unwrap_or(0);
    list.iter()
        .filter(|&&(_, s)| s == max)
        .map(|&(b, _)| b)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{mutual_top1, top_set, unique_max};

    #[test]
    fn unique_max_requires_a_strict_winner() {
        assert_eq!(unique_max::<u32>(&[]), None);
        assert_eq!(unique_max(&[(1u32, 5)]), Some(1));
        assert_eq!(unique_max(&[(1u32, 5), (2, 3)]), Some(1));
        assert_eq!(unique_max(&[(1u32, 5), (2, 5)]), None);
        // A later higher score clears an earlier tie.
        assert_eq!(unique_max(&[(1u32, 5), (2, 5), (3, 6)]), Some(3));
    }

    #[test]
    fn mutual_top1_rejects_one_sided_preferences() {
        // Old 1 prefers new 10, but new 10 strictly prefers old 2.
        let scored = vec![
            (1u32, vec![(10u32, 3)]),
            (2, vec![(10, 5), (11, 1)]),
        ];
        assert_eq!(mutual_top1(&scored), vec![(2, 10)]);
    }

    #[test]
    fn mutual_top1_is_a_matching_even_with_shared_candidates() {
        let scored = vec![
            (1u32, vec![(10u32, 4), (11, 2)]),
            (2, vec![(10, 2), (11, 4)]),
        ];
        assert_eq!(mutual_top1(&scored), vec![(1, 10), (2, 11)]);
    }

    #[test]
    fn top_set_lists_all_tied_candidates() {
        assert_eq!(top_set(&[(1u32, 2), (2, 4), (3, 4)]), vec![2, 3]);
    }
}
