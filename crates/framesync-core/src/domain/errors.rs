//! Domain error types
//!
//! Validation failures for domain values. Adapter-level errors (storage,
//! HTTP) stay behind `anyhow` at the port boundaries.

use thiserror::Error;

/// Errors that can occur when constructing domain values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Photo identifier is empty or whitespace-only
    #[error("Invalid photo id: {0:?}")]
    InvalidPhotoId(String),

    /// Provider key is empty or whitespace-only
    #[error("Invalid provider key: {0:?}")]
    InvalidProviderKey(String),

    /// Delta token is empty
    #[error("Invalid delta token")]
    InvalidDeltaToken,

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
