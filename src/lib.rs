//! jobtrack - client-side sync layer for a job application tracker
//!
//! Keeps two in-memory caches consistent with a remote backend: the current
//! session and the user's collection of tracked applications. Reads are
//! served from memory after one load; writes go to the backend first and
//! the caches follow on confirmation.

pub mod backend;
pub mod config;
pub mod error;
pub mod guard;
pub mod models;
pub mod stores;

pub use backend::Backend;
pub use config::Config;
pub use error::{Result, SyncError};
pub use stores::{ApplicationsCache, AuthOutcome, IdentityCache};
