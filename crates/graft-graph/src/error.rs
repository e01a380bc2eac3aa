pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid field descriptor: {0}")]
    InvalidFieldDescriptor(String),
    #[error("invalid method descriptor: {0}")]
    InvalidMethodDescriptor(String),
    #[error("duplicate class identity: {name}")]
    DuplicateClass { name: String },
    #[error("duplicate member identity: {owner}.{name} {descriptor}")]
    DuplicateMember {
        owner: String,
        name: String,
        descriptor: String,
    },
    /// A relation recorded by the upstream body analyzer references an
    /// identity that is absent from this build's graph. This is a contract
    /// violation by the caller, not a normal matching outcome.
    #[error("malformed graph: {channel} edge from {from} references missing identity {missing}")]
    MalformedGraph {
        channel: &'static str,
        from: String,
        missing: String,
    },
    #[error("method {method} declared as overriding itself")]
    ReflexiveOverride { method: String },
}
