//! Applications Collection Cache
//!
//! Single in-memory source of truth for one user's tracked applications,
//! synchronized with the remote store through explicit CRUD calls. Reads
//! come from memory after the first successful fetch; writes go to the
//! store first and mutate the cache only on confirmation, so a failed write
//! never leaves the sequence half-changed.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error};
use uuid::Uuid;

use crate::backend::{Backend, DataStore, IdentityService};
use crate::error::{Result, SyncError};
use crate::models::{Application, ApplicationInsert, ApplicationPatch, ApplicationStatus};

#[derive(Debug, Default)]
struct CollectionState {
    applications: Vec<Application>,
    loaded: bool,
    loading: bool,
    last_error: Option<String>,
}

// == Applications Cache ==
/// Client-side cache of the authenticated user's application records.
///
/// The sequence is kept newest first. Two concurrent first-time fetches
/// both reach the store and the last writer wins; once `loaded` is set,
/// further fetches are answered from memory.
pub struct ApplicationsCache {
    identity: Arc<dyn IdentityService>,
    store: Arc<dyn DataStore>,
    state: Arc<RwLock<CollectionState>>,
}

impl ApplicationsCache {
    /// Creates a cache bound to the backend's collaborators.
    pub fn new(backend: &Backend) -> Self {
        Self {
            identity: Arc::clone(backend.identity()),
            store: Arc::clone(backend.store()),
            state: Arc::new(RwLock::new(CollectionState::default())),
        }
    }

    /// Resolves the owner of the collection from the identity provider.
    ///
    /// A failed lookup counts as no user, the same as the remote contract.
    async fn owner_id(&self) -> Result<Uuid> {
        let user = self.identity.current_user().await.ok().flatten();
        user.map(|session| session.user_id)
            .ok_or(SyncError::Unauthenticated)
    }

    // == Fetch All ==
    /// Returns the full collection, fetching it at most once.
    ///
    /// After a successful load the in-memory sequence is returned without
    /// contacting the store. A failed fetch records the error, returns an
    /// empty sequence, and leaves `loaded` untouched so the next call
    /// retries.
    pub async fn fetch_all(&self) -> Vec<Application> {
        {
            let state = self.state.read().await;
            if state.loaded && !state.loading {
                return state.applications.clone();
            }
        }

        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.last_error = None;
        }

        let fetched = self.load_from_store().await;

        let mut state = self.state.write().await;
        state.loading = false;
        match fetched {
            Ok(rows) => {
                debug!("Loaded {} applications", rows.len());
                state.applications = rows.clone();
                state.loaded = true;
                rows
            }
            Err(err) => {
                error!("Error fetching applications: {err}");
                state.last_error = Some(err.to_string());
                Vec::new()
            }
        }
    }

    async fn load_from_store(&self) -> Result<Vec<Application>> {
        let owner = self.owner_id().await?;
        self.store.applications_for(owner).await
    }

    // == Add ==
    /// Inserts a record for the current user and prepends the canonical
    /// row the store returns.
    ///
    /// The cache is only mutated after remote confirmation; failures are
    /// recorded and raised to the caller.
    pub async fn add(&self, fields: ApplicationPatch) -> Result<Application> {
        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.last_error = None;
        }

        let inserted = self.insert_remote(fields).await;

        let mut state = self.state.write().await;
        state.loading = false;
        match inserted {
            Ok(application) => {
                state.applications.insert(0, application.clone());
                Ok(application)
            }
            Err(err) => {
                error!("Error adding application: {err}");
                state.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    async fn insert_remote(&self, fields: ApplicationPatch) -> Result<Application> {
        let owner = self.owner_id().await?;
        self.store
            .insert_application(ApplicationInsert {
                user_id: owner,
                fields,
            })
            .await
    }

    // == Update ==
    /// Writes the supplied fields for `id`, then merges them into the
    /// cached record in place.
    ///
    /// When `id` is not cached the merge is a no-op even though the remote
    /// write succeeded; the cache stays scoped to what it has fetched.
    pub async fn update(&self, id: Uuid, patch: ApplicationPatch) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.last_error = None;
        }

        let result = self.store.update_application(id, &patch).await;

        let mut state = self.state.write().await;
        state.loading = false;
        match result {
            Ok(()) => {
                if let Some(application) =
                    state.applications.iter_mut().find(|app| app.id == id)
                {
                    patch.apply_to(application);
                }
                Ok(())
            }
            Err(err) => {
                error!("Error updating application: {err}");
                state.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    // == Delete ==
    /// Deletes the row for `id` and drops it from the cache.
    ///
    /// Deleting an id that is gone already is a no-op on both sides.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.last_error = None;
        }

        let result = self.store.delete_application(id).await;

        let mut state = self.state.write().await;
        state.loading = false;
        match result {
            Ok(()) => {
                state.applications.retain(|app| app.id != id);
                Ok(())
            }
            Err(err) => {
                error!("Error deleting application: {err}");
                state.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    // == By Status ==
    /// Filters the cached sequence by status, preserving relative order.
    ///
    /// Reflects whatever is cached at call time; never touches the store.
    pub async fn by_status(&self, status: ApplicationStatus) -> Vec<Application> {
        self.state
            .read()
            .await
            .applications
            .iter()
            .filter(|app| app.status == status)
            .cloned()
            .collect()
    }

    // == Accessors ==
    /// Whether a successful full fetch has occurred.
    pub async fn is_loaded(&self) -> bool {
        self.state.read().await.loaded
    }

    /// Whether a fetch or write is in flight.
    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    /// Message of the most recent failed operation.
    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    /// Number of cached records.
    pub async fn len(&self) -> usize {
        self.state.read().await.applications.len()
    }

    /// Whether the cache holds no records.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.applications.is_empty()
    }
}
