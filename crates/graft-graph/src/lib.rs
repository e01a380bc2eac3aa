#![forbid(unsafe_code)]

//! Immutable program-graph model for one build of an obfuscated program.
//!
//! A [`ProgramGraph`] holds the classes, methods and fields of a single
//! compiled build together with the directed structural relations between
//! them (invocation, reference, field read/write, override). It is populated
//! once through a [`GraphBuilder`] by an upstream class-file decoder and body
//! analyzer, validated in [`GraphBuilder::finish`], and never mutated
//! afterwards. The matching engine in `graft-match` only ever reads it.

mod builder;
mod descriptor;
mod error;
mod graph;

pub use crate::builder::{GraphBuilder, MemberRef};
pub use crate::descriptor::{
    parse_field_descriptor, parse_method_descriptor, BaseType, FieldType, MethodDescriptor,
    ReturnType, TypeSort,
};
pub use crate::error::{Error, Result};
pub use crate::graph::{
    Class, ClassId, ConstValue, Field, FieldId, Method, MethodId, ProgramGraph,
};
