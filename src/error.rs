//! # Error Types
//!
//! Structured error handling for relation dispatch, persistence, and the
//! executor boundary, using thiserror instead of `Box<dyn Error>` patterns.
//!
//! Retries are deliberately absent at this layer: executor failures propagate
//! unchanged to the caller, and retry policy belongs to the executor.

use thiserror::Error;

/// Errors surfaced by relation operations and dynamic dispatch
#[derive(Error, Debug)]
pub enum RelationError {
    #[error("no operation `{name}` for target `{target}`")]
    NoSuchOperation { target: String, name: String },

    #[error("validation failed for `{target}`: {reason}")]
    Validation { target: String, reason: String },

    #[error("scope `{scope}` produced a relation for `{found}` but the receiver targets `{expected}`")]
    IncompatibleTarget {
        scope: String,
        expected: String,
        found: String,
    },

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

/// Errors raised by the query executor boundary
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("query execution failed: {message}")]
    Query { message: String },

    #[error("relation `{relation}` does not exist")]
    MissingRelation { relation: String },
}

pub type Result<T> = std::result::Result<T, RelationError>;
