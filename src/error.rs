//! Error types for the sync layer
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Sync Error Enum ==
/// Unified error type for cache and backend operations.
///
/// Every failure is one of three kinds: an operation that needs a signed-in
/// user but has none, an explicit rejection reported by the backend, or a
/// failure of the call itself before an answer arrived.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// No current session where one is required
    #[error("User not authenticated")]
    Unauthenticated,

    /// The backend answered with an explicit error
    #[error("{0}")]
    Rejected(String),

    /// The request itself failed
    #[error("Transport failure: {0}")]
    Transport(String),
}

// == Conversions ==
impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Transport(format!("malformed backend payload: {err}"))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the sync layer.
pub type Result<T> = std::result::Result<T, SyncError>;
