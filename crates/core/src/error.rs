//! Principal store error model.

use thiserror::Error;

/// Result type used by principal stores.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by a principal store.
///
/// A lookup *miss* is not an error: stores return `Ok(None)` for an unknown
/// token. These variants are for the store itself misbehaving.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing storage could not be reached (or a lock was poisoned).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The principal being persisted no longer exists.
    #[error("principal not found")]
    NotFound,

    /// A uniqueness constraint was violated (e.g. duplicate token or email).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
