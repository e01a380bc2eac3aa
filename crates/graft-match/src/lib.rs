#![forbid(unsafe_code)]

//! Structural correspondence engine between two builds of an obfuscated
//! program.
//!
//! Given the immutable [`graft_graph::ProgramGraph`]s of an "old" and a "new"
//! build, the [`Matcher`] computes a largely 1:1 mapping between their
//! classes, methods and fields using only structural evidence: member
//! signatures, call/reference edges, field accesses and override edges.
//! Names never participate; an obfuscator scrambles them per build.
//!
//! The engine runs round-based fixed-point refinement: each round scores the
//! surviving candidate pairs, commits the mutual top-1 pairs with a strictly
//! highest score on both sides, and lets the committed pairs tighten the
//! scores of the next round. Entities that end without a commitment are
//! reported as ambiguous (with their tied candidates) or unresolved; both
//! are normal outcomes, not errors.

pub mod compat;
pub mod driver;
pub mod report;
pub mod score;
pub mod table;

mod error;

pub use crate::driver::{Matcher, MatcherConfig, MemberScope};
pub use crate::error::{Error, Result};
pub use crate::report::{Ambiguity, KindReport, MatchReport};
pub use crate::table::{MatchSnapshot, MatchTable};
