//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `HostedAuthClient`: HTTP client for the hosted auth backend
//! - `SessionLivenessManager`: single-flight session checking with
//!   timeout-bounded, retry-backed refresh
//! - `AccountState`: the locally held signed-in user, revalidated on
//!   return to the foreground
//! - `Session` / `CredentialStore`: disk and OS-keychain persistence
//!
//! Sessions are refreshed proactively when within 5 minutes of expiry.

pub mod account;
pub mod client;
pub mod credentials;
pub mod error;
pub mod events;
pub mod liveness;
pub mod session;
pub mod store;

pub use account::AccountState;
pub use client::HostedAuthClient;
pub use credentials::CredentialStore;
pub use error::AuthError;
pub use events::AuthEvent;
pub use liveness::{LivenessOptions, SessionLivenessManager};
pub use session::{AuthUser, Session, SessionData};
pub use store::AuthStore;
