//! Integration Tests for the Sync Layer
//!
//! Exercises the identity and collection caches end to end against the
//! in-memory backend, including the consistency rules: at most one fetch
//! per cache lifetime, confirmed-only writes, and error-path state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use jobtrack::backend::{Backend, DataStore, IdentityService, MemoryBackend, TracingNavigator};
use jobtrack::error::{Result, SyncError};
use jobtrack::models::{
    Application, ApplicationInsert, ApplicationPatch, ApplicationStatus, Profile,
};
use jobtrack::{ApplicationsCache, IdentityCache};

// == Helper Functions ==

async fn signed_in_memory() -> Arc<MemoryBackend> {
    let memory = Arc::new(MemoryBackend::new());
    memory
        .seed_account("ada@example.com", "hunter2", Value::Null)
        .await;
    memory
        .sign_in_with_password("ada@example.com", "hunter2")
        .await
        .unwrap();
    memory
}

fn backend_around(
    identity: Arc<dyn IdentityService>,
    store: Arc<dyn DataStore>,
) -> Backend {
    Backend::new(identity, store, Arc::new(TracingNavigator))
}

fn draft(title: &str, status: ApplicationStatus) -> ApplicationPatch {
    ApplicationPatch {
        title: Some(title.to_string()),
        company: Some("Initech".to_string()),
        status: Some(status),
        ..Default::default()
    }
}

/// Data store wrapper that counts calls on its way through.
struct CountingStore {
    inner: Arc<MemoryBackend>,
    list_calls: AtomicUsize,
    insert_calls: AtomicUsize,
}

impl CountingStore {
    fn new(inner: Arc<MemoryBackend>) -> Self {
        Self {
            inner,
            list_calls: AtomicUsize::new(0),
            insert_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DataStore for CountingStore {
    async fn applications_for(&self, owner: Uuid) -> Result<Vec<Application>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.applications_for(owner).await
    }

    async fn insert_application(&self, insert: ApplicationInsert) -> Result<Application> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_application(insert).await
    }

    async fn update_application(&self, id: Uuid, patch: &ApplicationPatch) -> Result<()> {
        self.inner.update_application(id, patch).await
    }

    async fn delete_application(&self, id: Uuid) -> Result<()> {
        self.inner.delete_application(id).await
    }

    async fn profile_by_id(&self, id: Uuid) -> Result<Option<Profile>> {
        self.inner.profile_by_id(id).await
    }
}

/// Data store wrapper whose first list calls fail at the transport level.
struct FlakyStore {
    inner: Arc<MemoryBackend>,
    failures_left: AtomicUsize,
}

#[async_trait]
impl DataStore for FlakyStore {
    async fn applications_for(&self, owner: Uuid) -> Result<Vec<Application>> {
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(SyncError::Transport("network unreachable".to_string()));
        }
        self.inner.applications_for(owner).await
    }

    async fn insert_application(&self, insert: ApplicationInsert) -> Result<Application> {
        self.inner.insert_application(insert).await
    }

    async fn update_application(&self, id: Uuid, patch: &ApplicationPatch) -> Result<()> {
        self.inner.update_application(id, patch).await
    }

    async fn delete_application(&self, id: Uuid) -> Result<()> {
        self.inner.delete_application(id).await
    }

    async fn profile_by_id(&self, id: Uuid) -> Result<Option<Profile>> {
        self.inner.profile_by_id(id).await
    }
}

// == Single-Flight Fetch ==

#[tokio::test]
async fn test_fetch_all_hits_the_store_at_most_once() {
    let memory = signed_in_memory().await;
    let counting = Arc::new(CountingStore::new(memory.clone()));
    let backend = backend_around(memory, counting.clone());
    let cache = ApplicationsCache::new(&backend);

    let first = cache.fetch_all().await;
    let second = cache.fetch_all().await;
    let third = cache.fetch_all().await;

    assert_eq!(counting.list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(first, second);
    assert_eq!(second, third);
    assert!(cache.is_loaded().await);
}

#[tokio::test]
async fn test_fetch_all_orders_newest_first() {
    let memory = signed_in_memory().await;
    let backend = backend_around(memory.clone(), memory);
    let cache = ApplicationsCache::new(&backend);

    for title in ["first", "second", "third"] {
        cache
            .add(draft(title, ApplicationStatus::Applied))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let rows = cache.fetch_all().await;
    let titles: Vec<&str> = rows.iter().map(|app| app.title.as_str()).collect();
    assert_eq!(titles, ["third", "second", "first"]);
}

// == Confirmed-Only Writes ==

#[tokio::test]
async fn test_add_prepends_the_canonical_row() {
    let memory = signed_in_memory().await;
    let backend = backend_around(memory.clone(), memory);
    let cache = ApplicationsCache::new(&backend);

    cache
        .add(draft("existing", ApplicationStatus::Saved))
        .await
        .unwrap();
    cache.fetch_all().await;

    let added = cache
        .add(draft("Systems Engineer", ApplicationStatus::Applied))
        .await
        .unwrap();

    let rows = cache.fetch_all().await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, added.id);
    assert_eq!(rows[0].title, "Systems Engineer");
}

#[tokio::test]
async fn test_unauthenticated_add_makes_no_store_call() {
    let memory = Arc::new(MemoryBackend::new());
    let counting = Arc::new(CountingStore::new(memory.clone()));
    let backend = backend_around(memory, counting.clone());
    let cache = ApplicationsCache::new(&backend);

    let result = cache.add(draft("Engineer", ApplicationStatus::Saved)).await;
    assert!(matches!(result, Err(SyncError::Unauthenticated)));
    assert_eq!(counting.insert_calls.load(Ordering::SeqCst), 0);
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_rejected_insert_leaves_cache_unchanged() {
    let memory = signed_in_memory().await;
    let backend = backend_around(memory.clone(), memory);
    let cache = ApplicationsCache::new(&backend);

    cache
        .add(draft("existing", ApplicationStatus::Saved))
        .await
        .unwrap();

    // Missing required columns, rejected by the store
    let result = cache
        .add(ApplicationPatch {
            notes: Some("no title".to_string()),
            ..Default::default()
        })
        .await;

    assert!(matches!(result, Err(SyncError::Rejected(_))));
    assert_eq!(cache.len().await, 1);
    assert!(cache.last_error().await.is_some());
}

#[tokio::test]
async fn test_update_of_uncached_id_diverges_silently() {
    let memory = signed_in_memory().await;
    let owner = memory.current_user().await.unwrap().unwrap().user_id;
    let backend = backend_around(memory.clone(), memory.clone());
    let cache = ApplicationsCache::new(&backend);

    cache.fetch_all().await;
    assert!(cache.is_loaded().await);

    // Another client inserts a row the cache has never seen
    let foreign = memory
        .insert_application(ApplicationInsert {
            user_id: owner,
            fields: draft("out of band", ApplicationStatus::Saved),
        })
        .await
        .unwrap();

    cache
        .update(
            foreign.id,
            ApplicationPatch {
                status: Some(ApplicationStatus::Offer),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Remote row changed, cached sequence did not
    assert!(cache.is_empty().await);
    let remote = memory.applications_for(owner).await.unwrap();
    assert_eq!(remote[0].status, ApplicationStatus::Offer);
}

#[tokio::test]
async fn test_delete_removes_row_and_repeats_are_noops() {
    let memory = signed_in_memory().await;
    let backend = backend_around(memory.clone(), memory);
    let cache = ApplicationsCache::new(&backend);

    let added = cache
        .add(draft("Engineer", ApplicationStatus::Applied))
        .await
        .unwrap();
    let kept = cache
        .add(draft("Kept", ApplicationStatus::Saved))
        .await
        .unwrap();

    cache.delete(added.id).await.unwrap();
    let rows = cache.fetch_all().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, kept.id);

    cache.delete(added.id).await.unwrap();
    assert_eq!(cache.len().await, 1);
}

// == Error Paths ==

#[tokio::test]
async fn test_failed_fetch_reports_and_retries() {
    let memory = signed_in_memory().await;
    memory
        .insert_application(ApplicationInsert {
            user_id: memory.current_user().await.unwrap().unwrap().user_id,
            fields: draft("row", ApplicationStatus::Applied),
        })
        .await
        .unwrap();

    let flaky = Arc::new(FlakyStore {
        inner: memory.clone(),
        failures_left: AtomicUsize::new(1),
    });
    let backend = backend_around(memory, flaky);
    let cache = ApplicationsCache::new(&backend);

    let rows = cache.fetch_all().await;
    assert!(rows.is_empty());
    assert!(!cache.is_loaded().await);
    assert!(cache
        .last_error()
        .await
        .unwrap()
        .contains("network unreachable"));

    // The short-circuit must not swallow the retry
    let rows = cache.fetch_all().await;
    assert_eq!(rows.len(), 1);
    assert!(cache.is_loaded().await);
    assert!(cache.last_error().await.is_none());
}

// == Session Lifecycle ==

#[tokio::test]
async fn test_full_account_lifecycle() {
    let memory = Arc::new(MemoryBackend::new());
    let backend = backend_around(memory.clone(), memory);
    let identity = IdentityCache::new(&backend);
    let applications = ApplicationsCache::new(&backend);

    let outcome = identity
        .signup("grace@example.com", "password", "Grace Hopper")
        .await;
    assert!(outcome.is_success());

    applications
        .add(draft("Compiler Engineer", ApplicationStatus::Applied))
        .await
        .unwrap();
    let applied = applications.by_status(ApplicationStatus::Applied).await;
    assert_eq!(applied.len(), 1);

    identity.logout().await.unwrap();
    assert!(!identity.is_authenticated().await);

    // Writes require a session again
    let result = applications
        .add(draft("Another", ApplicationStatus::Saved))
        .await;
    assert!(matches!(result, Err(SyncError::Unauthenticated)));
}

#[tokio::test]
async fn test_collection_cache_survives_session_change() {
    let memory = Arc::new(MemoryBackend::new());
    memory
        .seed_account("ada@example.com", "hunter2", Value::Null)
        .await;
    memory
        .seed_account("grace@example.com", "password", Value::Null)
        .await;
    let backend = backend_around(memory.clone(), memory.clone());
    let identity = IdentityCache::new(&backend);
    let applications = ApplicationsCache::new(&backend);

    identity.login("ada@example.com", "hunter2").await;
    applications
        .add(draft("Ada's role", ApplicationStatus::Applied))
        .await
        .unwrap();
    applications.fetch_all().await;

    identity.logout().await.unwrap();
    identity.login("grace@example.com", "password").await;

    // The collection is not invalidated on session change: the previous
    // user's rows remain visible until an explicit reload
    let rows = applications.fetch_all().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "Ada's role");
}
