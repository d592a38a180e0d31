//! Session and profile models
//!
//! The session identifies the authenticated principal as the client knows it.
//! It is replaced wholesale on every auth event, never partially mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Fallback display name when no profile metadata is available.
pub const DEFAULT_DISPLAY_NAME: &str = "Friend";

// == Session ==
/// The authenticated principal and its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque user id assigned by the identity provider
    pub user_id: Uuid,
    /// Email address the account was registered with
    pub email: Option<String>,
    /// Free-form profile metadata attached at signup
    #[serde(default)]
    pub user_metadata: Value,
}

impl Session {
    /// Creates a session with empty metadata.
    pub fn new(user_id: Uuid, email: Option<String>) -> Self {
        Self {
            user_id,
            email,
            user_metadata: Value::Null,
        }
    }

    /// Returns the `full_name` metadata entry, or a friendly fallback.
    pub fn display_name(&self) -> String {
        self.user_metadata
            .get("full_name")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_DISPLAY_NAME)
            .to_string()
    }
}

// == Profile ==
/// One row of the `profiles` table, keyed by the user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}
