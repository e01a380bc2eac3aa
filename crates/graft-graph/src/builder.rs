use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::descriptor::{parse_field_descriptor, parse_method_descriptor};
use crate::error::{Error, Result};
use crate::graph::{Class, ClassId, ConstValue, Field, FieldId, Method, MethodId, ProgramGraph};

/// Identity tuple of a method or field: owning class name, member name and
/// raw descriptor. This is how relation edges are recorded by the upstream
/// body analyzer and how entities are named in reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MemberRef {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} {}", self.owner, self.name, self.descriptor)
    }
}

#[derive(Debug, Clone, Copy)]
enum Channel {
    Invoke,
    Reference,
    FieldRead,
    FieldWrite,
    Override,
}

impl Channel {
    fn name(self) -> &'static str {
        match self {
            Channel::Invoke => "invokes",
            Channel::Reference => "references",
            Channel::FieldRead => "fieldReads",
            Channel::FieldWrite => "fieldWrites",
            Channel::Override => "overrides",
        }
    }
}

/// Write-side API for populating one build's [`ProgramGraph`].
///
/// Entities are registered up front; relation edges are recorded by
/// [`MemberRef`] in any order and resolved in [`GraphBuilder::finish`], so
/// the caller never has to topologically sort a cyclic call graph. An edge
/// whose target is absent from the graph fails `finish` with
/// [`Error::MalformedGraph`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    classes: Vec<Class>,
    methods: Vec<Method>,
    fields: Vec<Field>,
    class_index: HashMap<String, ClassId>,
    method_index: HashMap<(ClassId, String, String), MethodId>,
    field_index: HashMap<(ClassId, String, String), FieldId>,
    pending: Vec<(Channel, MethodId, MemberRef)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(&mut self, name: &str, super_name: Option<&str>) -> Result<ClassId> {
        if self.class_index.contains_key(name) {
            return Err(Error::DuplicateClass {
                name: name.to_string(),
            });
        }
        let id = ClassId::from_raw(self.classes.len() as u32);
        self.classes.push(Class {
            name: name.to_string(),
            super_name: super_name.map(str::to_string),
            methods: Vec::new(),
            fields: Vec::new(),
        });
        self.class_index.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn add_method(
        &mut self,
        owner: ClassId,
        name: &str,
        descriptor: &str,
        is_static: bool,
    ) -> Result<MethodId> {
        let parsed = parse_method_descriptor(descriptor)?;
        let key = (owner, name.to_string(), descriptor.to_string());
        if self.method_index.contains_key(&key) {
            return Err(self.duplicate_member(owner, name, descriptor));
        }
        let id = MethodId::from_raw(self.methods.len() as u32);
        self.methods.push(Method {
            owner,
            name: name.to_string(),
            raw_descriptor: descriptor.to_string(),
            descriptor: parsed,
            is_static,
            invokes: Vec::new(),
            references: Vec::new(),
            field_reads: Vec::new(),
            field_writes: Vec::new(),
            overrides: Vec::new(),
        });
        self.classes[owner.idx()].methods.push(id);
        self.method_index.insert(key, id);
        Ok(id)
    }

    pub fn add_field(
        &mut self,
        owner: ClassId,
        name: &str,
        descriptor: &str,
        is_static: bool,
        value: Option<ConstValue>,
    ) -> Result<FieldId> {
        let ty = parse_field_descriptor(descriptor)?;
        let key = (owner, name.to_string(), descriptor.to_string());
        if self.field_index.contains_key(&key) {
            return Err(self.duplicate_member(owner, name, descriptor));
        }
        let id = FieldId::from_raw(self.fields.len() as u32);
        self.fields.push(Field {
            owner,
            name: name.to_string(),
            raw_descriptor: descriptor.to_string(),
            ty,
            is_static,
            value,
            reads: Vec::new(),
            writes: Vec::new(),
        });
        self.classes[owner.idx()].fields.push(id);
        self.field_index.insert(key, id);
        Ok(id)
    }

    /// Records that `from` calls the method named by `to`.
    pub fn record_invoke(&mut self, from: MethodId, to: MemberRef) {
        self.pending.push((Channel::Invoke, from, to));
    }

    /// Records a non-call reference from `from` to the method named by `to`.
    pub fn record_reference(&mut self, from: MethodId, to: MemberRef) {
        self.pending.push((Channel::Reference, from, to));
    }

    pub fn record_field_read(&mut self, from: MethodId, to: MemberRef) {
        self.pending.push((Channel::FieldRead, from, to));
    }

    pub fn record_field_write(&mut self, from: MethodId, to: MemberRef) {
        self.pending.push((Channel::FieldWrite, from, to));
    }

    /// Records that `from` overrides the superclass/interface method `to`.
    pub fn record_override(&mut self, from: MethodId, to: MemberRef) {
        self.pending.push((Channel::Override, from, to));
    }

    /// Resolves every recorded relation edge, derives the fields' inverse
    /// read/write sets, and freezes the graph.
    pub fn finish(mut self) -> Result<ProgramGraph> {
        let pending = std::mem::take(&mut self.pending);
        for (channel, from, to) in pending {
            match channel {
                Channel::Invoke | Channel::Reference | Channel::Override => {
                    let target = self.resolve_method(&to).ok_or_else(|| {
                        self.malformed(channel, from, &to)
                    })?;
                    if matches!(channel, Channel::Override) && target == from {
                        return Err(Error::ReflexiveOverride {
                            method: self.method_display(from),
                        });
                    }
                    let method = &mut self.methods[from.idx()];
                    match channel {
                        Channel::Invoke => method.invokes.push(target),
                        Channel::Reference => method.references.push(target),
                        _ => method.overrides.push(target),
                    }
                }
                Channel::FieldRead | Channel::FieldWrite => {
                    let target = self.resolve_field(&to).ok_or_else(|| {
                        self.malformed(channel, from, &to)
                    })?;
                    let method = &mut self.methods[from.idx()];
                    if matches!(channel, Channel::FieldRead) {
                        method.field_reads.push(target);
                    } else {
                        method.field_writes.push(target);
                    }
                }
            }
        }

        // Relation sets are sets: dedupe, and keep them sorted so iteration
        // order is deterministic across runs.
        for method in &mut self.methods {
            for set in [
                &mut method.invokes,
                &mut method.references,
                &mut method.overrides,
            ] {
                set.sort_unstable();
                set.dedup();
            }
            for set in [&mut method.field_reads, &mut method.field_writes] {
                set.sort_unstable();
                set.dedup();
            }
        }

        for (i, method) in self.methods.iter().enumerate() {
            let id = MethodId::from_raw(i as u32);
            for &field in &method.field_reads {
                self.fields[field.idx()].reads.push(id);
            }
            for &field in &method.field_writes {
                self.fields[field.idx()].writes.push(id);
            }
        }

        tracing::debug!(
            classes = self.classes.len(),
            methods = self.methods.len(),
            fields = self.fields.len(),
            "program graph finished"
        );

        Ok(ProgramGraph {
            classes: self.classes,
            methods: self.methods,
            fields: self.fields,
            class_index: self.class_index,
            method_index: self.method_index,
            field_index: self.field_index,
        })
    }

    fn resolve_method(&self, key: &MemberRef) -> Option<MethodId> {
        let owner = self.class_index.get(&key.owner)?;
        self.method_index
            .get(&(*owner, key.name.clone(), key.descriptor.clone()))
            .copied()
    }

    fn resolve_field(&self, key: &MemberRef) -> Option<FieldId> {
        let owner = self.class_index.get(&key.owner)?;
        self.field_index
            .get(&(*owner, key.name.clone(), key.descriptor.clone()))
            .copied()
    }

    fn method_display(&self, id: MethodId) -> String {
        let method = &self.methods[id.idx()];
        format!(
            "{}.{} {}",
            self.classes[method.owner.idx()].name,
            method.name,
            method.raw_descriptor
        )
    }

    fn duplicate_member(&self, owner: ClassId, name: &str, descriptor: &str) -> Error {
        Error::DuplicateMember {
            owner: self.classes[owner.idx()].name.clone(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }

    fn malformed(&self, channel: Channel, from: MethodId, to: &MemberRef) -> Error {
        Error::MalformedGraph {
            channel: channel.name(),
            from: self.method_display(from),
            missing: to.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_resolves_relations() {
        let mut b = GraphBuilder::new();
        let owner = b.add_class("a", Some("java/lang/Object")).unwrap();
        let caller = b.add_method(owner, "m", "()V", false).unwrap();
        let callee = b.add_method(owner, "n", "()I", false).unwrap();
        let counter = b.add_field(owner, "c", "I", false, None).unwrap();
        b.record_invoke(caller, MemberRef::new("a", "n", "()I"));
        b.record_field_write(caller, MemberRef::new("a", "c", "I"));
        b.record_field_read(callee, MemberRef::new("a", "c", "I"));

        let graph = b.finish().unwrap();
        assert_eq!(graph.method(caller).invokes, vec![callee]);
        assert_eq!(graph.method(caller).field_writes, vec![counter]);
        assert_eq!(graph.field(counter).reads, vec![callee]);
        assert_eq!(graph.field(counter).writes, vec![caller]);
        assert_eq!(graph.method_by_key("a", "n", "()I"), Some(callee));
    }

    #[test]
    fn duplicate_edges_collapse_to_a_set() {
        let mut b = GraphBuilder::new();
        let owner = b.add_class("a", None).unwrap();
        let caller = b.add_method(owner, "m", "()V", false).unwrap();
        let callee = b.add_method(owner, "n", "()V", false).unwrap();
        b.record_invoke(caller, MemberRef::new("a", "n", "()V"));
        b.record_invoke(caller, MemberRef::new("a", "n", "()V"));

        let graph = b.finish().unwrap();
        assert_eq!(graph.method(caller).invokes, vec![callee]);
    }

    #[test]
    fn missing_relation_target_is_malformed() {
        let mut b = GraphBuilder::new();
        let owner = b.add_class("a", None).unwrap();
        let caller = b.add_method(owner, "m", "()V", false).unwrap();
        b.record_invoke(caller, MemberRef::new("a", "gone", "()V"));

        let err = b.finish().unwrap_err();
        assert!(matches!(err, Error::MalformedGraph { channel: "invokes", .. }));
    }

    #[test]
    fn missing_field_target_is_malformed() {
        let mut b = GraphBuilder::new();
        let owner = b.add_class("a", None).unwrap();
        let reader = b.add_method(owner, "m", "()V", false).unwrap();
        b.record_field_read(reader, MemberRef::new("a", "gone", "I"));

        let err = b.finish().unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedGraph { channel: "fieldReads", .. }
        ));

        let mut b = GraphBuilder::new();
        let owner = b.add_class("a", None).unwrap();
        let writer = b.add_method(owner, "m", "()V", false).unwrap();
        // The owner resolves but the field identity does not.
        b.add_field(owner, "present", "I", false, None).unwrap();
        b.record_field_write(writer, MemberRef::new("a", "present", "J"));

        let err = b.finish().unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedGraph { channel: "fieldWrites", .. }
        ));
    }

    #[test]
    fn duplicate_identities_are_rejected() {
        let mut b = GraphBuilder::new();
        let owner = b.add_class("a", None).unwrap();
        b.add_method(owner, "m", "()V", false).unwrap();
        assert!(b.add_method(owner, "m", "()V", true).is_err());
        // Same name with a different descriptor is a distinct identity.
        assert!(b.add_method(owner, "m", "(I)V", false).is_ok());
        assert!(b.add_class("a", None).is_err());
    }

    #[test]
    fn self_override_is_rejected() {
        let mut b = GraphBuilder::new();
        let owner = b.add_class("a", None).unwrap();
        let m = b.add_method(owner, "m", "()V", false).unwrap();
        b.record_override(m, MemberRef::new("a", "m", "()V"));

        let err = b.finish().unwrap_err();
        assert!(matches!(err, Error::ReflexiveOverride { .. }));
    }

    #[test]
    fn invalid_descriptor_fails_at_insertion() {
        let mut b = GraphBuilder::new();
        let owner = b.add_class("a", None).unwrap();
        assert!(b.add_method(owner, "m", "(X)V", false).is_err());
        assert!(b.add_field(owner, "f", "Q", false, None).is_err());
    }
}
