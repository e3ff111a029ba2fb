use async_trait::async_trait;

use super::error::AuthError;
use super::session::SessionData;

/// The auth backend as seen by the session liveness manager: something that
/// can report the current session and mint a fresh one.
///
/// `HostedAuthClient` is the production implementation; tests inject fakes.
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Fetch the current session, if any. `Ok(None)` means "not signed in"
    /// and is not an error.
    async fn get_session(&self) -> Result<Option<SessionData>, AuthError>;

    /// Exchange the refresh token for a new session.
    async fn refresh_session(&self) -> Result<SessionData, AuthError>;
}
