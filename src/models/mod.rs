//! Domain models for the sync layer
//!
//! Defines the session/identity types and the tracked application records
//! exchanged with the remote store.

pub mod application;
pub mod session;

// Re-export commonly used types
pub use application::{Application, ApplicationInsert, ApplicationPatch, ApplicationStatus};
pub use session::{Profile, Session};
