//! Configuration Module
//!
//! Handles loading and managing client configuration from environment variables.

use std::env;

/// Client configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the hosted backend (identity and data endpoints)
    pub backend_url: String,
    /// Publishable API key sent with every request
    pub anon_key: String,
    /// HTTP request timeout in seconds
    pub request_timeout: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `BACKEND_URL` - Base URL of the backend (default: http://localhost:54321)
    /// - `BACKEND_ANON_KEY` - Publishable API key (default: empty)
    /// - `REQUEST_TIMEOUT` - HTTP timeout in seconds (default: 30)
    pub fn from_env() -> Self {
        Self {
            backend_url: env::var("BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:54321".to_string()),
            anon_key: env::var("BACKEND_ANON_KEY").unwrap_or_default(),
            request_timeout: env::var("REQUEST_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            request_timeout: 30,
        }
    }
}
