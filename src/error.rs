//! Error types for MarkerLens

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// All failure modes surfaced by the evaluator.
///
/// Pattern and embedding failures are non-fatal at evaluation time; the
/// offending marker contributes no evidence and evaluation continues.
#[derive(Debug, Error)]
pub enum Error {
    /// Registry source could not be loaded; the previous snapshot stays valid
    #[error("registry load failed: {0}")]
    RegistryLoad(String),

    /// Registry violates the level-respecting composition invariant
    #[error("registry invalid: {0}")]
    RegistryInvalid(String),

    /// Embedding provider failure for one text/reference pair
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
