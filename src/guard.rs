//! Auth Gate
//!
//! Pre-navigation check for protected views. Consults the identity provider
//! directly, so it works before any cache has been initialized. Server-side
//! render passes are skipped and deferred to the client-side check.

use tracing::debug;

use crate::backend::{Backend, IdentityService};
use crate::error::Result;

/// Path of the login view unauthenticated navigation is sent to.
pub const LOGIN_PATH: &str = "/login";

// == Navigation Target ==
/// The navigation being attempted.
#[derive(Debug, Clone)]
pub struct NavigationTarget {
    /// Full requested path, including any query string
    pub full_path: String,
    /// Whether this pass runs server-side, with no session available
    pub server_side: bool,
}

impl NavigationTarget {
    /// A client-side navigation to `full_path`.
    pub fn client(full_path: impl Into<String>) -> Self {
        Self {
            full_path: full_path.into(),
            server_side: false,
        }
    }

    /// A server-side render pass for `full_path`.
    pub fn server(full_path: impl Into<String>) -> Self {
        Self {
            full_path: full_path.into(),
            server_side: true,
        }
    }
}

// == Gate Decision ==
/// Outcome of the gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Navigation may proceed
    Allow,
    /// Navigation is replaced by a redirect to this path
    Redirect(String),
}

// == Evaluate ==
/// Decides whether a navigation may proceed.
///
/// Unauthenticated navigation is sent to the login view with the originally
/// requested path attached, URL-encoded, so the login flow can return the
/// user to their destination. Errors from the session lookup propagate to
/// the routing glue.
pub async fn evaluate(
    identity: &dyn IdentityService,
    target: &NavigationTarget,
) -> Result<GateDecision> {
    if target.server_side {
        return Ok(GateDecision::Allow);
    }

    if identity.current_session().await?.is_some() {
        return Ok(GateDecision::Allow);
    }

    debug!("Unauthenticated navigation to {}", target.full_path);
    Ok(GateDecision::Redirect(format!(
        "{LOGIN_PATH}?redirect={}",
        urlencoding::encode(&target.full_path)
    )))
}

// == Enforce ==
/// Evaluates the gate and applies a redirect decision through the backend's
/// navigator. Returns the decision either way.
pub async fn enforce(backend: &Backend, target: &NavigationTarget) -> Result<GateDecision> {
    let decision = evaluate(backend.identity().as_ref(), target).await?;
    if let GateDecision::Redirect(path) = &decision {
        backend.navigator().redirect(path);
    }
    Ok(decision)
}
