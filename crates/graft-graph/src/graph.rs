use std::collections::HashMap;
use std::fmt;

use crate::builder::MemberRef;
use crate::descriptor::{FieldType, MethodDescriptor};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u32);

impl ClassId {
    pub(crate) fn from_raw(raw: u32) -> Self {
        ClassId(raw)
    }

    #[must_use]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(u32);

impl MethodId {
    pub(crate) fn from_raw(raw: u32) -> Self {
        MethodId(raw)
    }

    #[must_use]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodId({})", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(u32);

impl FieldId {
    pub(crate) fn from_raw(raw: u32) -> Self {
        FieldId(raw)
    }

    #[must_use]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldId({})", self.0)
    }
}

/// A compile-time constant attached to a field (the `ConstantValue`
/// attribute). Floats are kept as bit patterns so equality is stable even
/// for NaN constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstValue {
    Int(i64),
    Float(u64),
    Str(String),
}

impl ConstValue {
    pub fn float(value: f64) -> Self {
        ConstValue::Float(value.to_bits())
    }
}

/// One class of the analyzed build.
///
/// The super-class is stored by name only; it may live outside the graph (a
/// library type). Subclass links are derived by lookup, never stored.
#[derive(Debug, Clone)]
pub struct Class {
    pub name: String,
    pub super_name: Option<String>,
    pub methods: Vec<MethodId>,
    pub fields: Vec<FieldId>,
}

/// One method, with the relation sets extracted from its body and the
/// override edges derived from the class hierarchy.
///
/// All relation targets live in the same build's graph; cross-build links
/// exist only inside the matcher, never in the model.
#[derive(Debug, Clone)]
pub struct Method {
    pub owner: ClassId,
    pub name: String,
    pub raw_descriptor: String,
    pub descriptor: MethodDescriptor,
    pub is_static: bool,
    /// Methods this method calls.
    pub invokes: Vec<MethodId>,
    /// Methods referenced without call semantics (e.g. as a value).
    pub references: Vec<MethodId>,
    pub field_reads: Vec<FieldId>,
    pub field_writes: Vec<FieldId>,
    /// Superclass/interface methods this method overrides. Irreflexive.
    pub overrides: Vec<MethodId>,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub owner: ClassId,
    pub name: String,
    pub raw_descriptor: String,
    pub ty: FieldType,
    pub is_static: bool,
    pub value: Option<ConstValue>,
    /// Methods that read this field. Derived from the methods' `field_reads`
    /// during graph finishing, so the two directions cannot disagree.
    pub reads: Vec<MethodId>,
    pub writes: Vec<MethodId>,
}

/// The fully populated, immutable graph of one build.
#[derive(Debug, Clone)]
pub struct ProgramGraph {
    pub(crate) classes: Vec<Class>,
    pub(crate) methods: Vec<Method>,
    pub(crate) fields: Vec<Field>,
    pub(crate) class_index: HashMap<String, ClassId>,
    pub(crate) method_index: HashMap<(ClassId, String, String), MethodId>,
    pub(crate) field_index: HashMap<(ClassId, String, String), FieldId>,
}

impl ProgramGraph {
    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.idx()]
    }

    pub fn method(&self, id: MethodId) -> &Method {
        &self.methods[id.idx()]
    }

    pub fn field(&self, id: FieldId) -> &Field {
        &self.fields[id.idx()]
    }

    pub fn classes(&self) -> impl Iterator<Item = (ClassId, &Class)> {
        self.classes
            .iter()
            .enumerate()
            .map(|(i, c)| (ClassId::from_raw(i as u32), c))
    }

    pub fn methods(&self) -> impl Iterator<Item = (MethodId, &Method)> {
        self.methods
            .iter()
            .enumerate()
            .map(|(i, m)| (MethodId::from_raw(i as u32), m))
    }

    pub fn fields(&self) -> impl Iterator<Item = (FieldId, &Field)> {
        self.fields
            .iter()
            .enumerate()
            .map(|(i, f)| (FieldId::from_raw(i as u32), f))
    }

    #[must_use]
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn class_by_name(&self, name: &str) -> Option<ClassId> {
        self.class_index.get(name).copied()
    }

    /// True when `name` does not resolve inside this graph, i.e. the class is
    /// a library/external type the analyzed build merely references.
    pub fn is_external(&self, name: &str) -> bool {
        !self.class_index.contains_key(name)
    }

    pub fn method_by_key(&self, owner: &str, name: &str, descriptor: &str) -> Option<MethodId> {
        let owner = self.class_by_name(owner)?;
        self.method_index
            .get(&(owner, name.to_string(), descriptor.to_string()))
            .copied()
    }

    pub fn field_by_key(&self, owner: &str, name: &str, descriptor: &str) -> Option<FieldId> {
        let owner = self.class_by_name(owner)?;
        self.field_index
            .get(&(owner, name.to_string(), descriptor.to_string()))
            .copied()
    }

    /// The identity tuple of a method, for reporting and diagnostics.
    pub fn method_ref(&self, id: MethodId) -> MemberRef {
        let method = self.method(id);
        MemberRef {
            owner: self.class(method.owner).name.clone(),
            name: method.name.clone(),
            descriptor: method.raw_descriptor.clone(),
        }
    }

    pub fn field_ref(&self, id: FieldId) -> MemberRef {
        let field = self.field(id);
        MemberRef {
            owner: self.class(field.owner).name.clone(),
            name: field.name.clone(),
            descriptor: field.raw_descriptor.clone(),
        }
    }
}

impl std::ops::Index<ClassId> for ProgramGraph {
    type Output = Class;

    fn index(&self, index: ClassId) -> &Self::Output {
        self.class(index)
    }
}

impl std::ops::Index<MethodId> for ProgramGraph {
    type Output = Method;

    fn index(&self, index: MethodId) -> &Self::Output {
        self.method(index)
    }
}

impl std::ops::Index<FieldId> for ProgramGraph {
    type Output = Field;

    fn index(&self, index: FieldId) -> &Self::Output {
        self.field(index)
    }
}
