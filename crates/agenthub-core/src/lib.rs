//! AgentHub core - client library for the AgentHub hosted backend.
//!
//! Owns everything between the hosted auth backend and a consumer that
//! needs to know whether the current session can be trusted: the auth HTTP
//! client, the persisted session, keychain credential storage, and the
//! session liveness manager with its foreground-revalidation consumer.
//!
//! The typical wiring:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use agenthub_core::auth::{AccountState, HostedAuthClient, LivenessOptions, SessionLivenessManager};
//! use agenthub_core::config::BackendConfig;
//!
//! # async fn wiring() -> anyhow::Result<()> {
//! let backend = BackendConfig::from_env()?;
//! let client = Arc::new(HostedAuthClient::new(&backend)?);
//!
//! let manager = SessionLivenessManager::new(Arc::clone(&client), LivenessOptions::default());
//! let account = Arc::new(AccountState::new(manager));
//!
//! if account.manager().check_and_refresh_session().await {
//!     // render the authenticated surface
//! } else {
//!     // show sign-in
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;

pub use auth::{
    AccountState, AuthError, AuthEvent, AuthStore, AuthUser, HostedAuthClient, LivenessOptions,
    Session, SessionData, SessionLivenessManager,
};
pub use config::{BackendConfig, Config};
