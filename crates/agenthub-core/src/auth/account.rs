//! Locally held view of "who is signed in", kept honest by the liveness
//! manager. This is the consumer side of session checking: the manager
//! answers the question, `AccountState` decides when to ask it and what to
//! do with a negative answer.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::events::AuthEvent;
use super::liveness::SessionLivenessManager;
use super::session::AuthUser;
use super::store::AuthStore;

/// Minimum interval between foreground-triggered session checks.
/// Window focus events can arrive in bursts; 5 seconds keeps them cheap.
const REVALIDATE_MIN_INTERVAL: Duration = Duration::from_secs(5);

pub struct AccountState<S> {
    manager: SessionLivenessManager<S>,
    user: Mutex<Option<AuthUser>>,
    last_foreground_check: Mutex<Option<Instant>>,
}

impl<S: AuthStore> AccountState<S> {
    pub fn new(manager: SessionLivenessManager<S>) -> Self {
        Self {
            manager,
            user: Mutex::new(None),
            last_foreground_check: Mutex::new(None),
        }
    }

    /// The user this client currently considers signed in
    pub fn current_user(&self) -> Option<AuthUser> {
        self.user.lock().ok().and_then(|user| user.clone())
    }

    /// Apply a session-change notification from the auth client
    pub fn apply_event(&self, event: AuthEvent) {
        let Ok(mut user) = self.user.lock() else {
            return;
        };
        match event {
            AuthEvent::SignedIn(signed_in) => {
                debug!(email = %signed_in.email, "signed in");
                *user = Some(signed_in);
            }
            AuthEvent::TokenRefreshed => {}
            AuthEvent::SignedOut => {
                debug!("signed out");
                *user = None;
            }
        }
    }

    pub fn manager(&self) -> &SessionLivenessManager<S> {
        &self.manager
    }

    /// Notify that the hosting surface returned to the foreground.
    ///
    /// Debounced: at most one check per 5 seconds, and only while a user is
    /// held. When due, the check runs in a background task so rendering is
    /// never blocked; a `false` result clears the local user, which forces
    /// the consumer back through sign-in. Returns whether a check started.
    pub fn on_foreground(self: &Arc<Self>) -> bool
    where
        S: 'static,
    {
        if self.current_user().is_none() || !self.foreground_check_due() {
            return false;
        }

        debug!("returned to foreground, checking session");
        let state = Arc::clone(self);
        tokio::spawn(async move {
            state.revalidate_now().await;
        });
        true
    }

    /// Run one session check and reconcile the local user with the result.
    pub async fn revalidate_now(&self) -> bool {
        let valid = self.manager.check_and_refresh_session().await;
        if !valid {
            if let Ok(mut user) = self.user.lock() {
                if user.take().is_some() {
                    warn!("session no longer valid, signing out locally");
                }
            }
        }
        valid
    }

    fn foreground_check_due(&self) -> bool {
        let Ok(mut last) = self.last_foreground_check.lock() else {
            return false;
        };
        let now = Instant::now();
        match *last {
            Some(previous) if now.duration_since(previous) < REVALIDATE_MIN_INTERVAL => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}
