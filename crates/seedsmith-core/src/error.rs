use thiserror::Error;

/// Core error type shared across seedsmith crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The schema graph violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// A model name could not be found in the graph.
    #[error("unknown model '{0}'")]
    UnknownModel(String),
    /// A field name could not be found on a model.
    #[error("unknown field '{field}' on model '{model}'")]
    UnknownField { model: String, field: String },
}

/// Convenience alias for results returned by seedsmith crates.
pub type Result<T> = std::result::Result<T, Error>;
