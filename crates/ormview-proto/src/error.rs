//! Protocol error types.

use thiserror::Error;

/// Errors raised while building or (de)serializing shape types.
#[derive(Debug, Error)]
pub enum Error {
    /// A dotted property path could not be parsed.
    #[error("invalid property path '{path}': {reason}")]
    InvalidPathSyntax {
        /// The offending path text.
        path: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}
