//! Identity Cache
//!
//! Holds the current session and keeps it fresh: once on `initialize`, then
//! continuously through the identity provider's session-change
//! notifications. Auth operations come in two shapes on purpose: `login`
//! and `signup` fold failures into an [`AuthOutcome`], while `logout`
//! propagates them to the caller.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::backend::{Backend, DataStore, IdentityService, Navigator};
use crate::error::Result;
use crate::models::{Profile, Session};

// == Auth Outcome ==
/// Result of a login or signup attempt.
///
/// Failures are part of the value, not raised: callers branch on the
/// outcome instead of handling an error path.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    /// The provider accepted the credentials
    Success(Session),
    /// The provider rejected the attempt, with its own message
    Failure(String),
}

impl AuthOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthOutcome::Success(_))
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthOutcome::Success(session) => Some(session),
            AuthOutcome::Failure(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            AuthOutcome::Success(_) => None,
            AuthOutcome::Failure(message) => Some(message),
        }
    }
}

#[derive(Debug, Default)]
struct IdentityState {
    session: Option<Session>,
    loading: bool,
    last_error: Option<String>,
}

// == Identity Cache ==
/// Client-side cache of the authenticated principal.
///
/// Constructed once per process from the [`Backend`] binding and shared by
/// handle; all interior state sits behind an async lock that is never held
/// across a collaborator call.
pub struct IdentityCache {
    identity: Arc<dyn IdentityService>,
    store: Arc<dyn DataStore>,
    navigator: Arc<dyn Navigator>,
    state: Arc<RwLock<IdentityState>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl IdentityCache {
    /// Creates a cache bound to the backend's collaborators.
    pub fn new(backend: &Backend) -> Self {
        Self {
            identity: Arc::clone(backend.identity()),
            store: Arc::clone(backend.store()),
            navigator: Arc::clone(backend.navigator()),
            state: Arc::new(RwLock::new(IdentityState::default())),
            listener: Mutex::new(None),
        }
    }

    // == Initialize ==
    /// Fetches the current user and installs the standing session listener.
    ///
    /// A refresh failure is recorded and logged but does not clear a
    /// previously valid session. The listener is installed at most once per
    /// cache instance, no matter how often `initialize` runs.
    pub async fn initialize(&self) {
        self.state.write().await.loading = true;

        let fetched = self.identity.current_user().await;
        let succeeded = fetched.is_ok();
        {
            let mut state = self.state.write().await;
            match fetched {
                Ok(session) => state.session = session,
                Err(err) => {
                    error!("Auth initialization error: {err}");
                    state.last_error = Some(err.to_string());
                }
            }
            state.loading = false;
        }

        if succeeded {
            self.ensure_listener().await;
        }
    }

    /// Spawns the session-change listener task unless one is already running.
    async fn ensure_listener(&self) {
        let mut listener = self.listener.lock().await;
        if listener.is_some() {
            return;
        }

        let mut events = self.identity.session_changes();
        let state = Arc::clone(&self.state);
        *listener = Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(session) => {
                        debug!(
                            "Session change notification: signed_in={}",
                            session.is_some()
                        );
                        state.write().await.session = session;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Session listener lagged, skipped {skipped} notifications");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }

    // == Login ==
    /// Exchanges credentials for a session.
    ///
    /// A rejection becomes an [`AuthOutcome::Failure`] carrying the
    /// provider's message; nothing is raised.
    pub async fn login(&self, email: &str, password: &str) -> AuthOutcome {
        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.last_error = None;
        }

        let attempt = self.identity.sign_in_with_password(email, password).await;

        let mut state = self.state.write().await;
        state.loading = false;
        match attempt {
            Ok(session) => {
                state.session = Some(session.clone());
                AuthOutcome::Success(session)
            }
            Err(err) => {
                error!("Login error: {err}");
                let message = err.to_string();
                state.last_error = Some(message.clone());
                AuthOutcome::Failure(message)
            }
        }
    }

    // == Signup ==
    /// Registers an account, forwarding the display name as profile metadata.
    pub async fn signup(&self, email: &str, password: &str, display_name: &str) -> AuthOutcome {
        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.last_error = None;
        }

        let metadata = json!({ "full_name": display_name });
        let attempt = self.identity.sign_up(email, password, metadata).await;

        let mut state = self.state.write().await;
        state.loading = false;
        match attempt {
            Ok(session) => {
                state.session = Some(session.clone());
                AuthOutcome::Success(session)
            }
            Err(err) => {
                error!("Signup error: {err}");
                let message = err.to_string();
                state.last_error = Some(message.clone());
                AuthOutcome::Failure(message)
            }
        }
    }

    // == Logout ==
    /// Ends the current session.
    ///
    /// Unlike `login` and `signup`, a failure here is raised to the caller
    /// and the session stays in place.
    pub async fn logout(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.last_error = None;
        }

        let result = self.identity.sign_out().await;

        let mut state = self.state.write().await;
        state.loading = false;
        match result {
            Ok(()) => {
                state.session = None;
                Ok(())
            }
            Err(err) => {
                error!("Logout error: {err}");
                state.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    // == User Profile ==
    /// Fetches the profile row for the current session, if any.
    ///
    /// Fetch failures are logged and swallowed; callers only see `None`.
    pub async fn user_profile(&self) -> Option<Profile> {
        let user_id = match &self.state.read().await.session {
            Some(session) => session.user_id,
            None => return None,
        };

        match self.store.profile_by_id(user_id).await {
            Ok(profile) => profile,
            Err(err) => {
                warn!("Error fetching user profile: {err}");
                None
            }
        }
    }

    // == Require Auth ==
    /// Redirects to `redirect_path` when no session is present and no
    /// refresh is in flight. Always returns the current session handle.
    pub async fn require_auth(&self, redirect_path: &str) -> Option<Session> {
        let state = self.state.read().await;
        if !state.loading && state.session.is_none() {
            self.navigator.redirect(redirect_path);
        }
        state.session.clone()
    }

    // == Accessors ==
    /// The current session, if any.
    pub async fn session(&self) -> Option<Session> {
        self.state.read().await.session.clone()
    }

    /// Whether a session is present.
    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.session.is_some()
    }

    /// Whether an auth operation is in flight.
    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    /// Message of the most recent failed operation.
    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    /// Display name of the current user, with a friendly fallback.
    pub async fn display_name(&self) -> String {
        match &self.state.read().await.session {
            Some(session) => session.display_name(),
            None => crate::models::session::DEFAULT_DISPLAY_NAME.to_string(),
        }
    }
}
