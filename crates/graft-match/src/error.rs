pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A commitment would map an entity that is already mapped to a
    /// different counterpart. The final mapping must stay a partial
    /// injection, so this is rejected rather than overwritten.
    #[error("contradictory commitment: {side} entity {entity} is already mapped")]
    Conflict { side: &'static str, entity: String },
    /// A seeded match references an identity that does not exist in the
    /// input graphs.
    #[error("seeded match references unknown entity: {entity}")]
    UnknownEntity { entity: String },
}
