//! The compatibility predicate: a cheap, local test of whether two entities
//! from opposite builds are even eligible to correspond.
//!
//! Compatibility looks only at static structural signature (kind,
//! static-ness, descriptor shape), never at names, and never at any global
//! matching state. It is O(descriptor length) per pair and symmetric:
//! `methods_compatible(old, new, a, b) == methods_compatible(new, old, b, a)`.

use graft_graph::{ClassId, FieldId, FieldType, MethodId, ProgramGraph, ReturnType};

/// Class/class eligibility.
///
/// Obfuscated classes carry no cheap structural disqualifier: member counts
/// drift between builds and the name is noise, so every class pair stays
/// eligible and the scorer does the discriminating. A member-count
/// fast-reject can be layered on by the driver (see
/// `MatcherConfig::class_size_ratio`) but is an optimization, never a
/// correctness requirement.
pub fn classes_compatible(
    _old: &ProgramGraph,
    _new: &ProgramGraph,
    _a: ClassId,
    _b: ClassId,
) -> bool {
    true
}

/// Method/method eligibility: static-ness equal, same arity, every
/// parameter slot and the return slot structurally compatible.
pub fn methods_compatible(
    old: &ProgramGraph,
    new: &ProgramGraph,
    a: MethodId,
    b: MethodId,
) -> bool {
    let ma = old.method(a);
    let mb = new.method(b);
    if ma.is_static != mb.is_static {
        return false;
    }
    if ma.descriptor.params.len() != mb.descriptor.params.len() {
        return false;
    }
    let params_ok = ma
        .descriptor
        .params
        .iter()
        .zip(mb.descriptor.params.iter())
        .all(|(pa, pb)| field_types_compatible(old, new, pa, pb));
    params_ok
        && return_types_compatible(
            old,
            new,
            &ma.descriptor.return_type,
            &mb.descriptor.return_type,
        )
}

/// Field/field eligibility: static-ness equal, declared types structurally
/// compatible.
pub fn fields_compatible(old: &ProgramGraph, new: &ProgramGraph, a: FieldId, b: FieldId) -> bool {
    let fa = old.field(a);
    let fb = new.field(b);
    fa.is_static == fb.is_static && field_types_compatible(old, new, &fa.ty, &fb.ty)
}

/// Structural compatibility of two descriptor slots.
///
/// Primitives must match exactly and arrays recurse on the component. An
/// object slot never disqualifies another object slot: the class names are
/// obfuscated, so when both sides resolve inside their graphs eligibility
/// falls back to the class predicate, and an external (library) side is
/// treated as unresolved rather than a mismatch. Object against primitive
/// or array is incompatible.
pub fn field_types_compatible(
    old: &ProgramGraph,
    new: &ProgramGraph,
    a: &FieldType,
    b: &FieldType,
) -> bool {
    match (a, b) {
        (FieldType::Base(pa), FieldType::Base(pb)) => pa == pb,
        (FieldType::Array(ea), FieldType::Array(eb)) => field_types_compatible(old, new, ea, eb),
        (FieldType::Object(na), FieldType::Object(nb)) => {
            match (old.class_by_name(na), new.class_by_name(nb)) {
                (Some(ca), Some(cb)) => classes_compatible(old, new, ca, cb),
                _ => true,
            }
        }
        _ => false,
    }
}

pub fn return_types_compatible(
    old: &ProgramGraph,
    new: &ProgramGraph,
    a: &ReturnType,
    b: &ReturnType,
) -> bool {
    match (a, b) {
        (ReturnType::Void, ReturnType::Void) => true,
        (ReturnType::Type(ta), ReturnType::Type(tb)) => field_types_compatible(old, new, ta, tb),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_graph::GraphBuilder;

    fn graph(layout: &[(&str, &[(&str, &str, bool)], &[(&str, &str, bool)])]) -> ProgramGraph {
        let mut b = GraphBuilder::new();
        for (class, methods, fields) in layout {
            let owner = b.add_class(class, None).unwrap();
            for (name, desc, is_static) in *methods {
                b.add_method(owner, name, desc, *is_static).unwrap();
            }
            for (name, desc, is_static) in *fields {
                b.add_field(owner, name, desc, *is_static, None).unwrap();
            }
        }
        b.finish().unwrap()
    }

    #[test]
    fn static_mismatch_disqualifies() {
        let old = graph(&[("a", &[("m", "()V", false)], &[("f", "I", false)])]);
        let new = graph(&[("x", &[("n", "()V", true)], &[("g", "I", true)])]);
        let (ma, _) = old.methods().next().unwrap();
        let (mb, _) = new.methods().next().unwrap();
        assert!(!methods_compatible(&old, &new, ma, mb));
        let (fa, _) = old.fields().next().unwrap();
        let (fb, _) = new.fields().next().unwrap();
        assert!(!fields_compatible(&old, &new, fa, fb));
    }

    #[test]
    fn arity_and_primitive_slots_must_match() {
        let old = graph(&[(
            "a",
            &[("m", "(IJ)V", false), ("p", "(I)V", false)],
            &[],
        )]);
        let new = graph(&[(
            "x",
            &[("n", "(IJ)V", false), ("q", "(II)V", false)],
            &[],
        )]);
        let m = old.method_by_key("a", "m", "(IJ)V").unwrap();
        let p = old.method_by_key("a", "p", "(I)V").unwrap();
        let n = new.method_by_key("x", "n", "(IJ)V").unwrap();
        let q = new.method_by_key("x", "q", "(II)V").unwrap();
        assert!(methods_compatible(&old, &new, m, n));
        // Same arity, wrong primitive kind in slot two.
        assert!(!methods_compatible(&old, &new, m, q));
        // Wrong arity.
        assert!(!methods_compatible(&old, &new, p, n));
    }

    #[test]
    fn obfuscated_reference_slots_never_disqualify() {
        // `a` resolves in the old graph, `x` in the new one; the renamed
        // reference types must not block eligibility.
        let old = graph(&[("a", &[], &[("f", "La;", false)])]);
        let new = graph(&[("x", &[], &[("g", "Lx;", false)])]);
        let (fa, _) = old.fields().next().unwrap();
        let (fb, _) = new.fields().next().unwrap();
        assert!(fields_compatible(&old, &new, fa, fb));
    }

    #[test]
    fn external_reference_slots_are_compatible() {
        let old = graph(&[("a", &[], &[("f", "Ljava/lang/String;", false)])]);
        let new = graph(&[("x", &[], &[("g", "Lx;", false)])]);
        let (fa, _) = old.fields().next().unwrap();
        let (fb, _) = new.fields().next().unwrap();
        assert!(fields_compatible(&old, &new, fa, fb));
    }

    #[test]
    fn object_never_matches_primitive_or_array() {
        let old = graph(&[(
            "a",
            &[],
            &[("f", "La;", false), ("g", "[La;", false)],
        )]);
        let new = graph(&[("x", &[], &[("h", "I", false), ("i", "Lx;", false)])]);
        let f = old.field_by_key("a", "f", "La;").unwrap();
        let g = old.field_by_key("a", "g", "[La;").unwrap();
        let h = new.field_by_key("x", "h", "I").unwrap();
        let i = new.field_by_key("x", "i", "Lx;").unwrap();
        assert!(!fields_compatible(&old, &new, f, h));
        assert!(!fields_compatible(&old, &new, g, i));
    }

    #[test]
    fn predicate_is_symmetric() {
        let old = graph(&[(
            "a",
            &[("m", "(I[Lb;)J", false), ("s", "()V", true)],
            &[("f", "[[D", false)],
        ), ("b", &[], &[])]);
        let new = graph(&[(
            "x",
            &[("n", "(I[Ly;)J", false), ("t", "()V", false)],
            &[("g", "[[D", false), ("h", "J", true)],
        ), ("y", &[], &[])]);

        for (ma, _) in old.methods() {
            for (mb, _) in new.methods() {
                assert_eq!(
                    methods_compatible(&old, &new, ma, mb),
                    methods_compatible(&new, &old, mb, ma),
                );
            }
        }
        for (fa, _) in old.fields() {
            for (fb, _) in new.fields() {
                assert_eq!(
                    fields_compatible(&old, &new, fa, fb),
                    fields_compatible(&new, &old, fb, fa),
                );
            }
        }
    }
}
