//! In-Memory Backend
//!
//! Implements both collaborator traits against process-local state, for
//! tests and offline development. Mirrors the hosted service's behavior
//! where callers can observe it: rejection messages, server-assigned ids
//! and timestamps, newest-first ordering, and not-null column checks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::backend::{DataStore, IdentityService, SESSION_CHANNEL_CAPACITY};
use crate::error::{Result, SyncError};
use crate::models::{Application, ApplicationInsert, ApplicationPatch, Profile, Session};

/// One registered account.
#[derive(Debug, Clone)]
struct Account {
    id: Uuid,
    email: String,
    password: String,
    metadata: Value,
}

impl Account {
    fn session(&self) -> Session {
        Session {
            user_id: self.id,
            email: Some(self.email.clone()),
            user_metadata: self.metadata.clone(),
        }
    }
}

// == Memory Backend ==
/// Process-local identity provider and data store.
pub struct MemoryBackend {
    accounts: RwLock<Vec<Account>>,
    current: RwLock<Option<Session>>,
    applications: RwLock<Vec<Application>>,
    profiles: RwLock<HashMap<Uuid, Profile>>,
    events: broadcast::Sender<Option<Session>>,
    fail_next_sign_out: AtomicBool,
}

impl MemoryBackend {
    /// Creates an empty backend with no accounts and no session.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(SESSION_CHANNEL_CAPACITY);
        Self {
            accounts: RwLock::new(Vec::new()),
            current: RwLock::new(None),
            applications: RwLock::new(Vec::new()),
            profiles: RwLock::new(HashMap::new()),
            events,
            fail_next_sign_out: AtomicBool::new(false),
        }
    }

    /// Registers an account without signing it in. Returns the new user id.
    pub async fn seed_account(&self, email: &str, password: &str, metadata: Value) -> Uuid {
        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password: password.to_string(),
            metadata,
        };
        let id = account.id;
        self.accounts.write().await.push(account);
        id
    }

    /// Stores a profile row.
    pub async fn seed_profile(&self, profile: Profile) {
        self.profiles.write().await.insert(profile.id, profile);
    }

    /// Inserts an application row directly, bypassing the client path.
    ///
    /// Stands in for writes made by another client against the same store.
    pub async fn seed_application(&self, application: Application) {
        self.applications.write().await.push(application);
    }

    /// Makes the next `sign_out` call fail with a transport error.
    pub fn fail_next_sign_out(&self) {
        self.fail_next_sign_out.store(true, Ordering::SeqCst);
    }

    /// Number of live session-change subscriptions.
    pub fn session_listener_count(&self) -> usize {
        self.events.receiver_count()
    }

    fn publish(&self, session: Option<Session>) {
        // Nobody listening is fine
        let _ = self.events.send(session);
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityService for MemoryBackend {
    async fn current_session(&self) -> Result<Option<Session>> {
        Ok(self.current.read().await.clone())
    }

    async fn current_user(&self) -> Result<Option<Session>> {
        Ok(self.current.read().await.clone())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let accounts = self.accounts.read().await;
        let account = accounts
            .iter()
            .find(|account| account.email == email && account.password == password)
            .ok_or_else(|| SyncError::Rejected("Invalid login credentials".to_string()))?;

        let session = account.session();
        drop(accounts);

        *self.current.write().await = Some(session.clone());
        self.publish(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<Session> {
        let mut accounts = self.accounts.write().await;
        if accounts.iter().any(|account| account.email == email) {
            return Err(SyncError::Rejected("User already registered".to_string()));
        }

        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password: password.to_string(),
            metadata,
        };
        let session = account.session();
        accounts.push(account);
        drop(accounts);

        *self.current.write().await = Some(session.clone());
        self.publish(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        if self.fail_next_sign_out.swap(false, Ordering::SeqCst) {
            return Err(SyncError::Transport("network unreachable".to_string()));
        }

        *self.current.write().await = None;
        self.publish(None);
        Ok(())
    }

    fn session_changes(&self) -> broadcast::Receiver<Option<Session>> {
        self.events.subscribe()
    }
}

#[async_trait]
impl DataStore for MemoryBackend {
    async fn applications_for(&self, owner: Uuid) -> Result<Vec<Application>> {
        let mut rows: Vec<Application> = self
            .applications
            .read()
            .await
            .iter()
            .filter(|row| row.user_id == owner)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert_application(&self, insert: ApplicationInsert) -> Result<Application> {
        let fields = insert.fields;
        let title = fields
            .title
            .ok_or_else(|| not_null_violation("title"))?;
        let company = fields
            .company
            .ok_or_else(|| not_null_violation("company"))?;
        let status = fields
            .status
            .ok_or_else(|| not_null_violation("status"))?;

        let now = Utc::now();
        let row = Application {
            id: Uuid::new_v4(),
            user_id: insert.user_id,
            title,
            company,
            url: fields.url,
            status,
            salary_min: fields.salary_min,
            salary_max: fields.salary_max,
            location: fields.location,
            remote: fields.remote,
            applied_date: fields.applied_date,
            description: fields.description,
            notes: fields.notes,
            created_at: now,
            updated_at: now,
        };

        self.applications.write().await.push(row.clone());
        Ok(row)
    }

    async fn update_application(&self, id: Uuid, patch: &ApplicationPatch) -> Result<()> {
        let mut applications = self.applications.write().await;
        // A filtered update over zero rows still succeeds
        if let Some(row) = applications.iter_mut().find(|row| row.id == id) {
            patch.apply_to(row);
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_application(&self, id: Uuid) -> Result<()> {
        self.applications.write().await.retain(|row| row.id != id);
        Ok(())
    }

    async fn profile_by_id(&self, id: Uuid) -> Result<Option<Profile>> {
        Ok(self.profiles.read().await.get(&id).cloned())
    }
}

fn not_null_violation(column: &str) -> SyncError {
    SyncError::Rejected(format!(
        "null value in column \"{column}\" violates not-null constraint"
    ))
}
