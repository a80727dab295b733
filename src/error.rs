//! Engine-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    /// A structural invariant is violated (dangling reference, inconsistent
    /// parent/children, malformed snapshot).
    #[error("validation error: {0}")]
    Validation(String),

    /// A lookup by id or array index failed.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
