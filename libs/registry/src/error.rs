//! Registry error types.

use thiserror::Error;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors reported by a registry or a lease.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The registry could not be reached or failed to answer.
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    /// The referenced record does not exist.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// The write conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The lease is no longer held by the caller.
    #[error("lease on role '{role}' lost")]
    LeaseLost { role: String },
}

impl RegistryError {
    /// Returns true if the error indicates the lease is gone.
    pub fn is_lease_lost(&self) -> bool {
        matches!(self, RegistryError::LeaseLost { .. })
    }
}
