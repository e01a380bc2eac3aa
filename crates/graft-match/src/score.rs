//! The similarity scorer.
//!
//! A score is the number of cross-compatible pairs across the relation
//! channels of two entities, summed with equal weight. Raw cross-product
//! counting rewards entities that sit in analogous positions in analogous
//! graphs without needing any other match to already be known, which is
//! what lets the driver bootstrap from zero prior knowledge.
//!
//! Scores are unnormalized and only comparable between candidates for the
//! same source entity. Committed matches tighten later rounds: a relation
//! pair whose endpoint is already committed to a different counterpart is
//! excluded from the count.

use graft_graph::{ClassId, FieldId, MethodId, ProgramGraph};

use crate::compat::{classes_compatible, fields_compatible, methods_compatible};
use crate::table::MatchSnapshot;

/// Class pair: compatible method pairs plus compatible field pairs, counted
/// over the full Cartesian product of the owned members (deliberately not
/// 1:1 — member-rich mutual compatibility correlates with true
/// correspondence before any member is matched).
pub fn score_classes(
    old: &ProgramGraph,
    new: &ProgramGraph,
    a: ClassId,
    b: ClassId,
    snap: &MatchSnapshot<'_>,
) -> u32 {
    let ca = old.class(a);
    let cb = new.class(b);
    let mut score = 0;
    for &ma in &ca.methods {
        for &mb in &cb.methods {
            if snap.allows_method(ma, mb) && methods_compatible(old, new, ma, mb) {
                score += 1;
            }
        }
    }
    for &fa in &ca.fields {
        for &fb in &cb.fields {
            if snap.allows_field(fa, fb) && fields_compatible(old, new, fa, fb) {
                score += 1;
            }
        }
    }
    score
}

/// Method pair: five equally weighted channels. An empty channel on either
/// side contributes 0, never a penalty.
pub fn score_methods(
    old: &ProgramGraph,
    new: &ProgramGraph,
    a: MethodId,
    b: MethodId,
    snap: &MatchSnapshot<'_>,
) -> u32 {
    let ma = old.method(a);
    let mb = new.method(b);
    let mut score = 0;
    for channel in [
        (&ma.invokes, &mb.invokes),
        (&ma.references, &mb.references),
        (&ma.overrides, &mb.overrides),
    ] {
        score += method_channel(old, new, channel.0, channel.1, snap);
    }
    score += field_channel(old, new, &ma.field_reads, &mb.field_reads, snap);
    score += field_channel(old, new, &ma.field_writes, &mb.field_writes, snap);
    score
}

/// Field pair: owner compatibility (instance fields only, where the owning
/// class is a meaningful signal), the read/write channels, and a bonus when
/// the declared types share a coarse sort and both carry an equal
/// compile-time constant. Two non-constant fields never earn the bonus.
pub fn score_fields(
    old: &ProgramGraph,
    new: &ProgramGraph,
    a: FieldId,
    b: FieldId,
    snap: &MatchSnapshot<'_>,
) -> u32 {
    let fa = old.field(a);
    let fb = new.field(b);
    let mut score = 0;

    if !fa.is_static
        && !fb.is_static
        && snap.allows_class(fa.owner, fb.owner)
        && classes_compatible(old, new, fa.owner, fb.owner)
    {
        score += 1;
    }

    score += method_channel(old, new, &fa.reads, &fb.reads, snap);
    score += method_channel(old, new, &fa.writes, &fb.writes, snap);

    if fa.ty.sort() == fb.ty.sort() {
        if let (Some(va), Some(vb)) = (&fa.value, &fb.value) {
            if va == vb {
                score += 1;
            }
        }
    }

    score
}

fn method_channel(
    old: &ProgramGraph,
    new: &ProgramGraph,
    xs: &[MethodId],
    ys: &[MethodId],
    snap: &MatchSnapshot<'_>,
) -> u32 {
    let mut count = 0;
    for &x in xs {
        for &y in ys {
            if snap.allows_method(x, y) && methods_compatible(old, new, x, y) {
                count += 1;
            }
        }
    }
    count
}

fn field_channel(
    old: &ProgramGraph,
    new: &ProgramGraph,
    xs: &[FieldId],
    ys: &[FieldId],
    snap: &MatchSnapshot<'_>,
) -> u32 {
    let mut count = 0;
    for &x in xs {
        for &y in ys {
            if snap.allows_field(x, y) && fields_compatible(old, new, x, y) {
                count += 1;
            }
        }
    }
    count
}
