//! Error types for name parsing and validation.

use thiserror::Error;

/// Errors that can occur when parsing or validating names.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The name string is empty.
    #[error("{kind} cannot be empty")]
    Empty { kind: &'static str },

    /// The name exceeds the maximum length.
    #[error("{kind} too long: {len} bytes (max {max})")]
    TooLong {
        kind: &'static str,
        len: usize,
        max: usize,
    },

    /// The name contains a character outside the allowed set.
    #[error("invalid character {ch:?} in {kind} '{value}'")]
    InvalidChar {
        kind: &'static str,
        ch: char,
        value: String,
    },

    /// The name starts with a reserved leading character.
    #[error("{kind} '{value}' may not start with {ch:?}")]
    InvalidLeading {
        kind: &'static str,
        ch: char,
        value: String,
    },
}

impl IdError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty { .. })
    }
}
