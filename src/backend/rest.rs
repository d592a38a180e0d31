//! REST Backend
//!
//! Binding to the hosted backend over HTTP: password-grant auth endpoints
//! under `auth/v1`, filtered table CRUD under `rest/v1`. The bearer token is
//! held locally; `current_session` answers from local state while
//! `current_user` revalidates against the server.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::backend::{DataStore, IdentityService, SESSION_CHANNEL_CAPACITY};
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::models::{Application, ApplicationInsert, ApplicationPatch, Profile, Session};

/// User object as the identity endpoints return it.
#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Uuid,
    email: Option<String>,
    #[serde(default)]
    user_metadata: Value,
}

impl AuthUser {
    fn into_session(self) -> Session {
        Session {
            user_id: self.id,
            email: self.email,
            user_metadata: self.user_metadata,
        }
    }
}

/// Successful password-grant or signup answer carrying a token.
#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    user: AuthUser,
}

#[derive(Debug, Clone)]
struct AuthState {
    access_token: String,
    session: Session,
}

// == REST Backend ==
/// HTTP implementation of both collaborator traits.
pub struct RestBackend {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    auth: RwLock<Option<AuthState>>,
    events: broadcast::Sender<Option<Session>>,
}

impl RestBackend {
    /// Creates a backend from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout))
            .build()?;
        let (events, _) = broadcast::channel(SESSION_CHANNEL_CAPACITY);

        Ok(Self {
            http,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            auth: RwLock::new(None),
            events,
        })
    }

    fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/auth/v1/{endpoint}", self.base_url)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    /// Token sent as the bearer credential: the session token when signed
    /// in, the publishable key otherwise.
    async fn bearer(&self) -> String {
        self.auth
            .read()
            .await
            .as_ref()
            .map(|state| state.access_token.clone())
            .unwrap_or_else(|| self.anon_key.clone())
    }

    async fn install(&self, access_token: String, session: Session) {
        *self.auth.write().await = Some(AuthState {
            access_token,
            session: session.clone(),
        });
        self.publish(Some(session));
    }

    fn publish(&self, session: Option<Session>) {
        let _ = self.events.send(session);
    }
}

#[async_trait::async_trait]
impl IdentityService for RestBackend {
    async fn current_session(&self) -> Result<Option<Session>> {
        Ok(self
            .auth
            .read()
            .await
            .as_ref()
            .map(|state| state.session.clone()))
    }

    async fn current_user(&self) -> Result<Option<Session>> {
        let token = match self.auth.read().await.as_ref() {
            Some(state) => state.access_token.clone(),
            None => return Ok(None),
        };

        let response = self
            .http
            .get(self.auth_url("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await?;
        let user: AuthUser = check_status(response).await?.json().await?;
        Ok(Some(user.into_session()))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let response = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let grant: TokenGrant = check_status(response).await?.json().await?;
        let session = grant.user.into_session();
        self.install(grant.access_token, session.clone()).await;
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<Session> {
        let response = self
            .http
            .post(self.auth_url("signup"))
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password, "data": metadata }))
            .send()
            .await?;

        // Instances with autoconfirm answer with a token grant; otherwise the
        // bare user comes back and no session starts until confirmation.
        let payload: Value = check_status(response).await?.json().await?;
        if payload.get("access_token").is_some() {
            let grant: TokenGrant = serde_json::from_value(payload)?;
            let session = grant.user.into_session();
            self.install(grant.access_token, session.clone()).await;
            Ok(session)
        } else {
            let user: AuthUser = serde_json::from_value(payload)?;
            Ok(user.into_session())
        }
    }

    async fn sign_out(&self) -> Result<()> {
        let token = match self.auth.read().await.as_ref() {
            Some(state) => state.access_token.clone(),
            None => return Ok(()),
        };

        let response = self
            .http
            .post(self.auth_url("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await?;
        check_status(response).await?;

        *self.auth.write().await = None;
        self.publish(None);
        Ok(())
    }

    fn session_changes(&self) -> broadcast::Receiver<Option<Session>> {
        self.events.subscribe()
    }
}

#[async_trait::async_trait]
impl DataStore for RestBackend {
    async fn applications_for(&self, owner: Uuid) -> Result<Vec<Application>> {
        let owner_filter = format!("eq.{owner}");
        let response = self
            .http
            .get(self.table_url("applications"))
            .query(&[
                ("select", "*"),
                ("user_id", owner_filter.as_str()),
                ("order", "created_at.desc"),
            ])
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer().await)
            .send()
            .await?;

        let rows: Vec<Application> = check_status(response).await?.json().await?;
        Ok(rows)
    }

    async fn insert_application(&self, insert: ApplicationInsert) -> Result<Application> {
        let response = self
            .http
            .post(self.table_url("applications"))
            .header("apikey", &self.anon_key)
            .header("Prefer", "return=representation")
            .bearer_auth(self.bearer().await)
            .json(&[insert])
            .send()
            .await?;

        let rows: Vec<Application> = check_status(response).await?.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| SyncError::Rejected("insert returned no rows".to_string()))
    }

    async fn update_application(&self, id: Uuid, patch: &ApplicationPatch) -> Result<()> {
        let id_filter = format!("eq.{id}");
        let response = self
            .http
            .patch(self.table_url("applications"))
            .query(&[("id", id_filter.as_str())])
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer().await)
            .json(patch)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    async fn delete_application(&self, id: Uuid) -> Result<()> {
        let id_filter = format!("eq.{id}");
        let response = self
            .http
            .delete(self.table_url("applications"))
            .query(&[("id", id_filter.as_str())])
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer().await)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    async fn profile_by_id(&self, id: Uuid) -> Result<Option<Profile>> {
        let id_filter = format!("eq.{id}");
        let response = self
            .http
            .get(self.table_url("profiles"))
            .query(&[("select", "*"), ("id", id_filter.as_str())])
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer().await)
            .send()
            .await?;

        let rows: Vec<Profile> = check_status(response).await?.json().await?;
        Ok(rows.into_iter().next())
    }
}

// == Response Handling ==
/// Passes successful responses through, turning anything else into a
/// `Rejected` error carrying the backend's own message.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SyncError::Rejected(error_message(&body, status)))
}

/// Pulls the human-readable message out of an error body.
///
/// The auth and table endpoints disagree on the field name, so every known
/// spelling is tried before falling back to the HTTP status.
fn error_message(body: &str, status: StatusCode) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|payload| {
            ["msg", "message", "error_description", "error"]
                .iter()
                .find_map(|key| {
                    payload
                        .get(key)
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
        })
        .unwrap_or_else(|| format!("HTTP {status}"))
}
