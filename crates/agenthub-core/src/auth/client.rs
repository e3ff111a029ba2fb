//! HTTP client for the hosted auth backend.
//!
//! This module provides `HostedAuthClient` for the GoTrue-style auth
//! surface: password sign-in, sign-up, refresh-token exchange, sign-out,
//! and authenticated user fetch. Session changes are published on a
//! broadcast channel and mirrored to the session file and OS keychain.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::BackendConfig;

use super::credentials::CredentialStore;
use super::error::AuthError;
use super::events::{self, AuthEvent};
use super::session::{AuthUser, Session, SessionData};
use super::store::AuthStore;

// ============================================================================
// Constants
// ============================================================================

/// Path prefix of the auth API on the hosted backend
const AUTH_PATH: &str = "/auth/v1";

/// HTTP transport timeout in seconds. Generous on purpose: per-call
/// deadlines are owned by the liveness manager, not the transport.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Access token lifetime assumed when the backend omits expiry info
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Unix seconds; preferred over `expires_in` when present
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserPayload,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: serde_json::Value,
}

impl TokenResponse {
    fn into_session(self) -> Result<SessionData, AuthError> {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => DateTime::from_timestamp(at, 0)
                .ok_or_else(|| AuthError::InvalidResponse(format!("Bad expiry timestamp: {at}")))?,
            (None, Some(seconds)) => Utc::now() + chrono::Duration::seconds(seconds),
            (None, None) => Utc::now() + chrono::Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS),
        };
        Ok(SessionData {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            user: self.user.into_user(),
            expires_at,
        })
    }
}

impl UserPayload {
    fn into_user(self) -> AuthUser {
        let full_name = self
            .user_metadata
            .get("full_name")
            .and_then(|name| name.as_str())
            .map(str::to_string);
        AuthUser {
            id: self.id,
            email: self.email.unwrap_or_default(),
            full_name,
        }
    }
}

/// Client for the hosted auth backend.
/// The reqwest client is connection-pooled; the persisted session is the
/// client-side system of record for "does a session exist".
pub struct HostedAuthClient {
    client: Client,
    base_url: String,
    anon_key: String,
    session: Mutex<Session>,
    events: broadcast::Sender<AuthEvent>,
}

impl HostedAuthClient {
    /// Create a client with the session file under the backend-scoped
    /// cache directory
    pub fn new(backend: &BackendConfig) -> Result<Self> {
        let cache_dir = backend.cache_dir()?;
        Self::with_cache_dir(backend, cache_dir)
    }

    pub fn with_cache_dir(backend: &BackendConfig, cache_dir: PathBuf) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let mut session = Session::new(cache_dir);
        let load_result = session.load();
        debug!(?load_result, has_data = session.data.is_some(), "Session loaded");

        Ok(Self {
            client,
            base_url: backend.url.trim_end_matches('/').to_string(),
            anon_key: backend.anon_key.clone(),
            session: Mutex::new(session),
            events: events::channel(),
        })
    }

    /// Subscribe to session-change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// The session currently held by this client, if any
    pub fn current_session(&self) -> Option<SessionData> {
        self.lock_session().data.clone()
    }

    /// Check if a session exists and its access token has not lapsed
    pub fn is_authenticated(&self) -> bool {
        self.lock_session().is_valid()
    }

    /// Register a new account. Returns the session when the backend signs
    /// the user in directly, or `None` when email confirmation is pending.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Option<SessionData>, AuthError> {
        let url = format!("{}{}/signup", self.base_url, AUTH_PATH);
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "data": { "full_name": full_name },
        });

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let text = response.text().await?;

        // With confirmations disabled the backend answers with a full
        // session; otherwise only the pending user record comes back
        if let Ok(token) = serde_json::from_str::<TokenResponse>(&text) {
            let session = token.into_session()?;
            self.adopt_session(session.clone(), AuthEvent::SignedIn(session.user.clone()));
            return Ok(Some(session));
        }

        serde_json::from_str::<UserPayload>(&text)
            .map_err(|e| AuthError::InvalidResponse(format!("Bad signup response: {e}")))?;
        debug!(email, "sign-up accepted, confirmation pending");
        Ok(None)
    }

    /// Sign in with email and password
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionData, AuthError> {
        let url = self.token_url("password");
        let body = serde_json::json!({
            "email": email,
            "password": password,
        });

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("Bad token response: {e}")))?;

        let session = token.into_session()?;
        debug!(email = %session.user.email, "signed in");
        self.adopt_session(session.clone(), AuthEvent::SignedIn(session.user.clone()));
        Ok(session)
    }

    /// Revoke the session server-side (best effort) and clear all local
    /// session state
    pub async fn sign_out(&self) -> Result<()> {
        let (token, email) = {
            let session = self.lock_session();
            (
                session.access_token().map(str::to_string),
                session.user().map(|u| u.email.clone()),
            )
        };

        if let Some(token) = token {
            let url = format!("{}{}/logout", self.base_url, AUTH_PATH);
            let result = self
                .client
                .post(&url)
                .header("apikey", &self.anon_key)
                .bearer_auth(&token)
                .send()
                .await;
            match result {
                Ok(response) if !response.status().is_success() => {
                    warn!(status = %response.status(), "logout rejected by backend");
                }
                Err(e) => warn!(error = %e, "logout request failed"),
                Ok(_) => {}
            }
        }

        self.lock_session().clear()?;
        if let Some(email) = email {
            if let Err(e) = CredentialStore::delete(&email) {
                debug!(error = %e, "no keychain entry to delete");
            }
        }
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    /// Fetch the authenticated user from the backend. Validates the access
    /// token server-side, unlike the locally persisted copy.
    pub async fn fetch_user(&self) -> Result<AuthUser, AuthError> {
        let token = self
            .lock_session()
            .access_token()
            .map(str::to_string)
            .ok_or(AuthError::NotSignedIn)?;

        let url = format!("{}{}/user", self.base_url, AUTH_PATH);
        let response = self
            .client
            .get(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&token)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let user: UserPayload = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("Bad user response: {e}")))?;
        Ok(user.into_user())
    }

    /// Recover a session for `email` when the session file is gone, using
    /// the refresh token stored in the OS keychain. Returns whether a
    /// session is available afterwards.
    pub async fn restore_session(&self, email: &str) -> Result<bool, AuthError> {
        if self.current_session().is_some() {
            return Ok(true);
        }

        let Ok(refresh_token) = CredentialStore::get_refresh_token(email) else {
            debug!(email, "no stored refresh token");
            return Ok(false);
        };

        let session = self.refresh_grant(&refresh_token).await?;
        debug!(email = %session.user.email, "session restored from keychain");
        self.adopt_session(session.clone(), AuthEvent::SignedIn(session.user));
        Ok(true)
    }

    fn token_url(&self, grant_type: &str) -> String {
        format!(
            "{}{}/token?grant_type={}",
            self.base_url, AUTH_PATH, grant_type
        )
    }

    /// Exchange a refresh token for a new session
    async fn refresh_grant(&self, refresh_token: &str) -> Result<SessionData, AuthError> {
        let url = self.token_url("refresh_token");
        let body = serde_json::json!({ "refresh_token": refresh_token });

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("Bad token response: {e}")))?;
        token.into_session()
    }

    /// Make `session` the current one: persist it, mirror the refresh token
    /// to the keychain, and notify subscribers
    fn adopt_session(&self, session: SessionData, event: AuthEvent) {
        let email = session.user.email.clone();
        let refresh_token = session.refresh_token.clone();
        {
            let mut current = self.lock_session();
            current.update(session);
            if let Err(e) = current.save() {
                warn!(error = %e, "Failed to save session");
            }
        }
        if let Err(e) = CredentialStore::store_refresh_token(&email, &refresh_token) {
            // keychain may be unavailable (headless hosts); the session
            // file still carries the token
            warn!(error = %e, "Failed to store refresh token in keychain");
        }
        let _ = self.events.send(event);
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, Session> {
        self.session.lock().expect("session lock poisoned")
    }

    /// Check if response is successful, returning an error with body if not
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, AuthError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(AuthError::from_status(status, &body))
        }
    }
}

#[async_trait::async_trait]
impl AuthStore for HostedAuthClient {
    async fn get_session(&self) -> Result<Option<SessionData>, AuthError> {
        Ok(self.current_session())
    }

    async fn refresh_session(&self) -> Result<SessionData, AuthError> {
        let refresh_token = {
            let session = self.lock_session();
            session
                .data
                .as_ref()
                .map(|d| d.refresh_token.clone())
                .ok_or(AuthError::NotSignedIn)?
        };

        let session = self.refresh_grant(&refresh_token).await?;
        self.adopt_session(session.clone(), AuthEvent::TokenRefreshed);
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> BackendConfig {
        BackendConfig {
            url: "https://example.agenthub.dev".to_string(),
            anon_key: "anon-key".to_string(),
        }
    }

    fn client_in(dir: &tempfile::TempDir) -> HostedAuthClient {
        HostedAuthClient::with_cache_dir(&backend(), dir.path().to_path_buf())
            .expect("client construction")
    }

    #[test]
    fn test_parse_token_response_with_unix_expiry() {
        let json = r#"{
            "access_token": "eyJhbGciOiJIUzI1NiJ9.payload.sig",
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": 1754550000,
            "refresh_token": "v2.refresh",
            "user": {
                "id": "7f2c4e80-9a1b-4f6d-8a3e-2b5c6d7e8f90",
                "email": "user@example.com",
                "user_metadata": { "full_name": "Ada Lovelace" }
            }
        }"#;

        let token: TokenResponse = serde_json::from_str(json).expect("parse token response");
        let session = token.into_session().expect("into session");

        assert_eq!(session.refresh_token, "v2.refresh");
        assert_eq!(session.expires_at.timestamp(), 1754550000);
        assert_eq!(session.user.email, "user@example.com");
        assert_eq!(session.user.full_name.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn test_parse_token_response_falls_back_to_expires_in() {
        let json = r#"{
            "access_token": "token",
            "refresh_token": "refresh",
            "expires_in": 1800,
            "user": { "id": "abc", "email": "user@example.com" }
        }"#;

        let token: TokenResponse = serde_json::from_str(json).expect("parse token response");
        let session = token.into_session().expect("into session");

        let seconds_left = (session.expires_at - Utc::now()).num_seconds();
        assert!((1790..=1800).contains(&seconds_left), "seconds_left {seconds_left}");
        assert_eq!(session.user.full_name, None);
    }

    #[test]
    fn test_token_url_includes_grant_type() {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = client_in(&dir);
        assert_eq!(
            client.token_url("refresh_token"),
            "https://example.agenthub.dev/auth/v1/token?grant_type=refresh_token"
        );
    }

    #[test]
    fn test_trailing_slash_in_backend_url_is_normalized() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = BackendConfig {
            url: "https://example.agenthub.dev/".to_string(),
            anon_key: "anon-key".to_string(),
        };
        let client = HostedAuthClient::with_cache_dir(&backend, dir.path().to_path_buf())
            .expect("client construction");
        assert_eq!(
            client.token_url("password"),
            "https://example.agenthub.dev/auth/v1/token?grant_type=password"
        );
    }

    #[tokio::test]
    async fn test_get_session_reads_persisted_state() {
        let dir = tempfile::tempdir().expect("tempdir");

        {
            let mut session = Session::new(dir.path().to_path_buf());
            session.update(SessionData {
                access_token: "access".to_string(),
                refresh_token: "refresh".to_string(),
                user: AuthUser {
                    id: "abc".to_string(),
                    email: "user@example.com".to_string(),
                    full_name: None,
                },
                expires_at: Utc::now() + chrono::Duration::minutes(30),
            });
            session.save().expect("save");
        }

        let client = client_in(&dir);
        let loaded = client.get_session().await.expect("get_session");
        assert_eq!(loaded.map(|s| s.access_token), Some("access".to_string()));
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn test_refresh_without_session_is_not_signed_in() {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = client_in(&dir);
        assert!(matches!(
            AuthStore::refresh_session(&client).await,
            Err(AuthError::NotSignedIn)
        ));
    }
}
