//! Structural type encodings in JVM descriptor syntax.
//!
//! Descriptors encode parameter, return and field types by shape, not by
//! source-level name, which makes them the one piece of signature that an
//! obfuscator leaves intact.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Base(BaseType),
    /// Internal binary name of a class, e.g. `java/lang/String`. The named
    /// class may live outside the analyzed graph (a library type).
    Object(String),
    Array(Box<FieldType>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReturnType {
    Void,
    Type(FieldType),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub params: Vec<FieldType>,
    pub return_type: ReturnType,
}

/// Coarse type-kind category of a [`FieldType`].
///
/// Two fields whose declared types share a sort are "the same kind of thing"
/// even when the precise reference type differs; the field scorer uses sort
/// equality as the gate for the constant-value bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeSort {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Object,
    Array,
}

impl FieldType {
    pub fn sort(&self) -> TypeSort {
        match self {
            FieldType::Base(BaseType::Boolean) => TypeSort::Boolean,
            FieldType::Base(BaseType::Byte) => TypeSort::Byte,
            FieldType::Base(BaseType::Char) => TypeSort::Char,
            FieldType::Base(BaseType::Short) => TypeSort::Short,
            FieldType::Base(BaseType::Int) => TypeSort::Int,
            FieldType::Base(BaseType::Long) => TypeSort::Long,
            FieldType::Base(BaseType::Float) => TypeSort::Float,
            FieldType::Base(BaseType::Double) => TypeSort::Double,
            FieldType::Object(_) => TypeSort::Object,
            FieldType::Array(_) => TypeSort::Array,
        }
    }
}

/// Parses a field descriptor such as `I` or `[Ljava/lang/String;`.
///
/// Trailing input is an error: the whole string must be one type.
pub fn parse_field_descriptor(desc: &str) -> Result<FieldType> {
    let (ty, rest) = parse_field_type(desc)
        .ok_or_else(|| Error::InvalidFieldDescriptor(desc.to_string()))?;
    if !rest.is_empty() {
        return Err(Error::InvalidFieldDescriptor(desc.to_string()));
    }
    Ok(ty)
}

/// Parses a method descriptor such as `(ILjava/lang/Object;)[Z`.
pub fn parse_method_descriptor(desc: &str) -> Result<MethodDescriptor> {
    let invalid = || Error::InvalidMethodDescriptor(desc.to_string());

    let mut rest = desc.strip_prefix('(').ok_or_else(invalid)?;
    let mut params = Vec::new();
    loop {
        if let Some(after) = rest.strip_prefix(')') {
            rest = after;
            break;
        }
        let (param, after) = parse_field_type(rest).ok_or_else(invalid)?;
        params.push(param);
        rest = after;
    }

    let return_type = if rest == "V" {
        ReturnType::Void
    } else {
        let (ty, after) = parse_field_type(rest).ok_or_else(invalid)?;
        if !after.is_empty() {
            return Err(invalid());
        }
        ReturnType::Type(ty)
    };

    Ok(MethodDescriptor {
        params,
        return_type,
    })
}

fn parse_field_type(input: &str) -> Option<(FieldType, &str)> {
    let first = *input.as_bytes().first()?;
    let base = match first {
        b'B' => Some(BaseType::Byte),
        b'C' => Some(BaseType::Char),
        b'D' => Some(BaseType::Double),
        b'F' => Some(BaseType::Float),
        b'I' => Some(BaseType::Int),
        b'J' => Some(BaseType::Long),
        b'S' => Some(BaseType::Short),
        b'Z' => Some(BaseType::Boolean),
        _ => None,
    };
    if let Some(base) = base {
        return Some((FieldType::Base(base), &input[1..]));
    }
    match first {
        b'L' => {
            let end = input.find(';')?;
            if end == 1 {
                return None;
            }
            Some((
                FieldType::Object(input[1..end].to_string()),
                &input[end + 1..],
            ))
        }
        b'[' => {
            let (component, rest) = parse_field_type(&input[1..])?;
            Some((FieldType::Array(Box::new(component)), rest))
        }
        _ => None,
    }
}
