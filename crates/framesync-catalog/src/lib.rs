//! Framesync Catalog - Local state persistence
//!
//! SQLite-backed catalog for:
//! - Photo metadata and view state
//! - Cache payloads (in-row blobs or on-disk file references)
//! - Settings (delta tokens and other string KV pairs)
//!
//! ## Architecture
//!
//! This crate implements the `ICatalog` port from `framesync-core` using
//! SQLite as the storage backend. It is a driven (secondary) adapter in
//! the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`CatalogPool`] - Connection handling with tuning, integrity probe,
//!   and corruption recovery
//! - [`SqliteCatalog`] - Full `ICatalog` implementation
//! - [`CatalogError`] - Error types for catalog operations

pub mod pool;
pub mod repository;

pub use pool::CatalogPool;
pub use repository::SqliteCatalog;

/// Errors that can occur during catalog operations
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be mapped back to a domain value
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for CatalogError {
    fn from(e: sqlx::Error) -> Self {
        CatalogError::QueryFailed(e.to_string())
    }
}
