//! Error types for composite-key operations.

use thiserror::Error;

/// Errors surfaced to callers by fallible constructors.
///
/// Internal invariant violations (a descent terminating off the trie, a
/// token finalizer racing a trie operation) are bugs in this crate and
/// panic instead of returning a value of this type.
#[derive(Debug, Error)]
pub enum Error {
    /// The record builder was handed two fields with equal keys.
    #[error("duplicate record field: {field}")]
    DuplicateField {
        /// Display form of the offending field key.
        field: String,
    },
}

/// Result type alias using the crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
