use crate::http::{HttpClient, HttpRequest};
use crate::store::{ClientStateStore, StoreError};
use crate::types::events::{EventBus, LoggedOut};
use crate::types::user::{AuthUser, RefreshResponse};
use log::{debug, info, warn};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not authenticated")]
    Unauthenticated,
    #[error("request timed out")]
    Timeout,
    #[error("server returned {status}: {message}")]
    Remote { status: u16, message: String },
    #[error("malformed server response: {0}")]
    Malformed(String),
    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Shape of the JSON body the server attaches to 401 responses.
#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    action: Option<String>,
}

/// Lenient error envelope for non-2xx responses (`{"error": "..."}`).
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// Thin authenticated accessor for the marketplace API. Owns the stored
/// credential, attaches it as a bearer header, and handles the
/// expired-credential refresh dance in exactly one place.
pub struct SessionClient {
    api_url: String,
    request_timeout: Duration,
    http: Arc<dyn HttpClient>,
    store: Arc<dyn ClientStateStore>,
    bus: Arc<EventBus>,

    token: RwLock<Option<String>>,
    current_user: RwLock<Option<AuthUser>>,

    /// Serializes credential refreshes. Requests that hit an expired
    /// credential while a refresh is in flight queue here and reuse its
    /// result instead of issuing their own.
    refresh_lock: Mutex<()>,
    /// Bumped every time the credential changes; lets queued requests tell
    /// whether somebody already refreshed while they waited.
    token_generation: AtomicU64,
}

impl SessionClient {
    pub fn new(
        api_url: impl Into<String>,
        request_timeout: Duration,
        http: Arc<dyn HttpClient>,
        store: Arc<dyn ClientStateStore>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            request_timeout,
            http,
            store,
            bus,
            token: RwLock::new(None),
            current_user: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            token_generation: AtomicU64::new(0),
        }
    }

    /// Installs a fresh credential and user record, persisting both.
    /// Called at login.
    pub async fn attach(&self, token: String, user: AuthUser) -> Result<(), ApiError> {
        self.store.save_token(&token).await?;
        self.store.save_user(&user).await?;
        *self.token.write().await = Some(token);
        *self.current_user.write().await = Some(user);
        self.token_generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Restores a persisted session, if any. Returns whether a credential
    /// was found. Called at app start.
    pub async fn restore(&self) -> Result<bool, ApiError> {
        let token = self.store.load_token().await?;
        let user = self.store.load_user().await?;
        let found = token.is_some();
        *self.token.write().await = token;
        *self.current_user.write().await = user;
        if found {
            self.token_generation.fetch_add(1, Ordering::SeqCst);
        }
        Ok(found)
    }

    /// Explicit logout: drop the in-memory credential and the persisted one.
    pub async fn logout(&self) {
        self.force_logout().await;
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }

    pub async fn current_user(&self) -> Option<AuthUser> {
        self.current_user.read().await.clone()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request_json("GET", path, None, true).await
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ApiError> {
        self.request_json("POST", path, Some(body), true).await
    }

    pub async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request_json("DELETE", path, None, true).await
    }

    /// Issues one API request. With `auth`, fails fast when no credential
    /// is stored, and on an expiry 401 performs a single silent refresh
    /// followed by a single retry. A second 401 logs the session out.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        body: Option<serde_json::Value>,
        auth: bool,
    ) -> Result<T, ApiError> {
        let mut attempted_refresh = false;

        loop {
            let token = if auth {
                match self.token.read().await.clone() {
                    Some(t) => Some(t),
                    None => return Err(ApiError::Unauthenticated),
                }
            } else {
                None
            };

            // Sampled before the call so a refresh that happens while this
            // request is in flight is visible afterwards.
            let observed_generation = self.token_generation.load(Ordering::SeqCst);

            let response = self
                .execute(method, path, body.clone(), token.as_deref())
                .await?;

            if response.status_code == 401 && auth {
                let err: AuthErrorBody =
                    serde_json::from_slice(&response.body).unwrap_or_default();

                if err.code.as_deref() == Some("TOKEN_EXPIRED") && !attempted_refresh {
                    attempted_refresh = true;
                    debug!(target: "Session", "Credential expired on {method} {path}, refreshing");
                    self.refresh_credential(observed_generation).await?;
                    continue;
                }

                // Either the retry after a refresh still came back 401, or
                // the server demands a logout outright.
                warn!(target: "Session", "Unrecoverable 401 on {method} {path}, logging out");
                self.force_logout().await;
                return Err(ApiError::Unauthenticated);
            }

            if !(200..300).contains(&response.status_code) {
                let err: ErrorBody = serde_json::from_slice(&response.body).unwrap_or_default();
                return Err(ApiError::Remote {
                    status: response.status_code,
                    message: err.error.unwrap_or_else(|| response.body_string()),
                });
            }

            return serde_json::from_slice(&response.body)
                .map_err(|e| ApiError::Malformed(e.to_string()));
        }
    }

    /// Refreshes the stored credential, at most once per expiry across all
    /// concurrent requests. `observed_generation` is the generation the
    /// caller saw when its request failed; if it no longer matches by the
    /// time the lock is held, another request already refreshed and this
    /// one just reuses the new credential.
    async fn refresh_credential(&self, observed_generation: u64) -> Result<(), ApiError> {
        let _guard = self.refresh_lock.lock().await;

        if self.token_generation.load(Ordering::SeqCst) != observed_generation {
            debug!(target: "Session", "Credential already refreshed by a concurrent request");
            return Ok(());
        }

        let old_token = match self.token.read().await.clone() {
            Some(t) => t,
            None => return Err(ApiError::Unauthenticated),
        };

        // The refresh call goes straight to the transport; running it
        // through request_json would make a failed refresh trigger another
        // refresh.
        let result = self
            .execute("POST", "/auth/refresh-token", None, Some(&old_token))
            .await;

        let response = match result {
            Ok(r) if (200..300).contains(&r.status_code) => r,
            Ok(r) => {
                warn!(target: "Session", "Credential refresh rejected with status {}", r.status_code);
                self.force_logout().await;
                return Err(ApiError::Unauthenticated);
            }
            Err(e) => {
                warn!(target: "Session", "Credential refresh failed: {e}");
                self.force_logout().await;
                return Err(ApiError::Unauthenticated);
            }
        };

        let refreshed: RefreshResponse = serde_json::from_slice(&response.body)
            .map_err(|e| ApiError::Malformed(e.to_string()))?;

        self.store.save_token(&refreshed.token).await?;
        *self.token.write().await = Some(refreshed.token);
        if let Some(user) = refreshed.user {
            self.store.save_user(&user).await?;
            *self.current_user.write().await = Some(user);
        }
        self.token_generation.fetch_add(1, Ordering::SeqCst);
        info!(target: "Session", "Credential refreshed");
        Ok(())
    }

    async fn execute(
        &self,
        method: &str,
        path: &str,
        body: Option<serde_json::Value>,
        token: Option<&str>,
    ) -> Result<crate::http::HttpResponse, ApiError> {
        let url = format!("{}{}", self.api_url, path);
        let mut request = match method {
            "GET" => HttpRequest::get(url),
            "POST" => HttpRequest::post(url),
            "DELETE" => HttpRequest::delete(url),
            other => return Err(ApiError::Transport(anyhow::anyhow!("bad method: {other}"))),
        };
        if let Some(token) = token {
            request = request.with_header("Authorization", format!("Bearer {token}"));
        }
        if let Some(body) = body {
            request = request.with_json_body(&body)?;
        }

        match timeout(self.request_timeout, self.http.execute(request)).await {
            Ok(result) => result.map_err(ApiError::Transport),
            Err(_) => Err(ApiError::Timeout),
        }
    }

    async fn force_logout(&self) {
        *self.token.write().await = None;
        *self.current_user.write().await = None;
        if let Err(e) = self.store.clear_session().await {
            warn!(target: "Session", "Failed to clear persisted session: {e}");
        }
        self.token_generation.fetch_add(1, Ordering::SeqCst);
        let _ = self.bus.logged_out.send(Arc::new(LoggedOut));
        info!(target: "Session", "Session cleared");
    }
}
