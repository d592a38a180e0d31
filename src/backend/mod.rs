//! Backend Collaborators
//!
//! Defines the seams to the remote services the sync layer consumes: the
//! identity provider, the structured data store, and the navigation layer.
//! `Backend` bundles one handle to each and is constructed once at process
//! start; everything else borrows from it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::models::{Application, ApplicationInsert, ApplicationPatch, Profile, Session};

pub mod memory;
pub mod rest;

// Re-export the provided implementations
pub use memory::MemoryBackend;
pub use rest::RestBackend;

// == Public Constants ==
/// Capacity of the session-change broadcast channel.
pub const SESSION_CHANNEL_CAPACITY: usize = 16;

// == Identity Service ==
/// Remote identity provider.
///
/// Session-change notifications are delivered through a broadcast
/// subscription that fires on every login and logout from any in-process
/// source, for as long as the subscriber listens.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Returns the current session, if any, without revalidating it.
    async fn current_session(&self) -> Result<Option<Session>>;

    /// Returns the current user, revalidated against the provider.
    async fn current_user(&self) -> Result<Option<Session>>;

    /// Exchanges credentials for a session.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session>;

    /// Registers a new account, forwarding `metadata` as profile metadata.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<Session>;

    /// Ends the current session.
    async fn sign_out(&self) -> Result<()>;

    /// Subscribes to session-change notifications.
    fn session_changes(&self) -> broadcast::Receiver<Option<Session>>;
}

// == Data Store ==
/// Remote structured data store, scoped to the tables the client uses.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Returns every application belonging to `owner`, newest first.
    async fn applications_for(&self, owner: Uuid) -> Result<Vec<Application>>;

    /// Inserts one application row and returns the canonical stored row.
    async fn insert_application(&self, insert: ApplicationInsert) -> Result<Application>;

    /// Updates the supplied fields of the row matching `id`.
    ///
    /// Succeeds even when no row matches, mirroring a filtered SQL update.
    async fn update_application(&self, id: Uuid, patch: &ApplicationPatch) -> Result<()>;

    /// Deletes the row matching `id`, if any.
    async fn delete_application(&self, id: Uuid) -> Result<()>;

    /// Fetches a single profile row by user id.
    async fn profile_by_id(&self, id: Uuid) -> Result<Option<Profile>>;
}

// == Navigator ==
/// Navigation side effects consumed by the auth gate.
pub trait Navigator: Send + Sync {
    /// Redirects the user agent to `path`.
    fn redirect(&self, path: &str);
}

/// Navigator that records redirects in the log only.
///
/// Stands in wherever no real routing layer is wired up, such as the smoke
/// binary and offline development.
#[derive(Debug, Default)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn redirect(&self, path: &str) {
        info!("Redirecting to {path}");
    }
}

// == Backend Binding ==
/// The single handle to the remote backend.
#[derive(Clone)]
pub struct Backend {
    identity: Arc<dyn IdentityService>,
    store: Arc<dyn DataStore>,
    navigator: Arc<dyn Navigator>,
}

impl Backend {
    /// Creates a backend from explicit collaborator handles.
    pub fn new(
        identity: Arc<dyn IdentityService>,
        store: Arc<dyn DataStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            identity,
            store,
            navigator,
        }
    }

    /// Creates a backend bound to the hosted REST service described by `config`.
    pub fn rest(config: &Config) -> Result<Self> {
        let rest = Arc::new(RestBackend::new(config)?);
        Ok(Self {
            identity: rest.clone(),
            store: rest,
            navigator: Arc::new(TracingNavigator),
        })
    }

    /// Creates a backend running entirely in memory, for tests and offline use.
    pub fn in_memory() -> Self {
        let memory = Arc::new(MemoryBackend::new());
        Self {
            identity: memory.clone(),
            store: memory,
            navigator: Arc::new(TracingNavigator),
        }
    }

    /// The identity provider handle.
    pub fn identity(&self) -> &Arc<dyn IdentityService> {
        &self.identity
    }

    /// The data store handle.
    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    /// The navigation handle.
    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }
}
