//! Session liveness: "can the current session be trusted right now?"
//!
//! `SessionLivenessManager` wraps an [`AuthStore`] and shields callers from
//! its latency and transient failures. Remote calls are raced against a
//! timeout, failures are retried with linear backoff up to a bound, and
//! sessions inside the refresh window are renewed before they lapse.
//!
//! The manager never returns errors: every path resolves to a bool, and a
//! `false` is indistinguishable from "not signed in" on purpose. Diagnostics
//! go to tracing.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time;
use tracing::{debug, warn};

use super::error::AuthError;
use super::store::AuthStore;

/// Maximum wall-clock duration allowed for a single remote call
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Additional attempts after the first failure
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base of the linear backoff: attempt k waits k times this
const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct LivenessOptions {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_unit: Duration,
}

impl Default for LivenessOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
        }
    }
}

/// In-flight state. The generation counter invalidates suspended work:
/// `cleanup` bumps it, and a call that resumes under a stale generation
/// abandons itself without touching the guard a newer call may hold.
struct Flight {
    checking: bool,
    generation: u64,
}

/// Outcome of one timeout-raced remote call.
enum Attempt<T> {
    Ready(Result<T, AuthError>),
    /// `cleanup` ran while this call was suspended
    Stale,
}

pub struct SessionLivenessManager<S> {
    store: Arc<S>,
    opts: LivenessOptions,
    flight: Mutex<Flight>,
    cancel: Notify,
}

impl<S: AuthStore> SessionLivenessManager<S> {
    pub fn new(store: Arc<S>, opts: LivenessOptions) -> Self {
        Self {
            store,
            opts,
            flight: Mutex::new(Flight {
                checking: false,
                generation: 0,
            }),
            cancel: Notify::new(),
        }
    }

    /// Check the current session, refreshing it if it expires within the
    /// refresh window. Resolves `true` only when a live session exists by
    /// the time the call completes.
    ///
    /// At most one check or refresh runs per manager; an overlapping call
    /// returns `false` immediately without touching the store. Callers that
    /// need the in-flight result must re-invoke after a delay.
    pub async fn check_and_refresh_session(&self) -> bool {
        let Some(gen) = self.try_begin() else {
            debug!("session check already in flight, rejecting");
            return false;
        };

        let mut attempt: u32 = 0;
        loop {
            let session = match self.bounded(gen, self.store.get_session()).await {
                Attempt::Stale => return false,
                Attempt::Ready(Ok(session)) => session,
                Attempt::Ready(Err(e)) => {
                    warn!(error = %e, attempt, "session check failed");
                    if attempt < self.opts.max_retries {
                        attempt += 1;
                        debug!(attempt, max_retries = self.opts.max_retries, "retrying session check");
                        if !self.backoff(attempt, gen).await {
                            return false;
                        }
                        continue;
                    }
                    self.finish(gen);
                    return false;
                }
            };

            let Some(session) = session else {
                debug!("no active session");
                self.finish(gen);
                return false;
            };

            if !session.needs_refresh() {
                self.finish(gen);
                return true;
            }

            debug!(
                minutes_left = session.minutes_until_expiry(),
                "session expires soon, refreshing"
            );
            match self.bounded(gen, self.store.refresh_session()).await {
                Attempt::Stale => return false,
                Attempt::Ready(Ok(_)) => {
                    debug!("session refreshed");
                    self.finish(gen);
                    return true;
                }
                Attempt::Ready(Err(e)) => {
                    warn!(error = %e, attempt, "session refresh failed");
                    if attempt < self.opts.max_retries {
                        attempt += 1;
                        debug!(attempt, max_retries = self.opts.max_retries, "retrying session refresh");
                        if !self.backoff(attempt, gen).await {
                            return false;
                        }
                        // retry restarts from get_session, same counter
                        continue;
                    }
                    self.finish(gen);
                    return false;
                }
            }
        }
    }

    /// Refresh the session unconditionally, without inspecting expiry.
    ///
    /// Unlike [`check_and_refresh_session`](Self::check_and_refresh_session)
    /// this never retries: one failed attempt resolves `false`.
    pub async fn refresh_session(&self) -> bool {
        let Some(gen) = self.try_begin() else {
            debug!("session refresh already in flight, rejecting");
            return false;
        };

        match self.bounded(gen, self.store.refresh_session()).await {
            Attempt::Stale => false,
            Attempt::Ready(Ok(_)) => {
                debug!("session refreshed");
                self.finish(gen);
                true
            }
            Attempt::Ready(Err(e)) => {
                warn!(error = %e, "session refresh failed");
                self.finish(gen);
                false
            }
        }
    }

    /// Cancel any pending backoff and reset all in-flight state. Invoke when
    /// the owning context is torn down; afterwards no backoff-scheduled
    /// retry will reach the store, and new calls may begin immediately.
    pub fn cleanup(&self) {
        {
            let mut flight = self.flight.lock().expect("flight lock poisoned");
            flight.generation = flight.generation.wrapping_add(1);
            flight.checking = false;
        }
        self.cancel.notify_waiters();
        debug!("session manager state reset");
    }

    /// Whether a check or refresh is currently in flight
    pub fn is_checking(&self) -> bool {
        self.flight.lock().expect("flight lock poisoned").checking
    }

    /// Acquire the single-flight guard, returning the generation this call
    /// runs under. `None` means another call holds the guard.
    fn try_begin(&self) -> Option<u64> {
        let mut flight = self.flight.lock().expect("flight lock poisoned");
        if flight.checking {
            return None;
        }
        flight.checking = true;
        Some(flight.generation)
    }

    /// Release the guard, unless `cleanup` already superseded this call.
    fn finish(&self, gen: u64) {
        let mut flight = self.flight.lock().expect("flight lock poisoned");
        if flight.generation == gen {
            flight.checking = false;
        }
    }

    fn is_current(&self, gen: u64) -> bool {
        self.flight.lock().expect("flight lock poisoned").generation == gen
    }

    /// Race a store call against the configured timeout. Losing the race
    /// drops the future, cancelling the in-flight work; the elapsed timer is
    /// reported as [`AuthError::Timeout`] and handled like any other failure.
    async fn bounded<T, F>(&self, gen: u64, call: F) -> Attempt<T>
    where
        F: Future<Output = Result<T, AuthError>>,
    {
        let result = match time::timeout(self.opts.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::Timeout),
        };
        if !self.is_current(gen) {
            return Attempt::Stale;
        }
        Attempt::Ready(result)
    }

    /// Wait `attempt * backoff_unit` before the next try. Returns `false`
    /// when `cleanup` intervened and the call must abandon itself.
    async fn backoff(&self, attempt: u32, gen: u64) -> bool {
        if !self.is_current(gen) {
            return false;
        }
        let delay = self.opts.backoff_unit.saturating_mul(attempt);
        tokio::select! {
            _ = self.cancel.notified() => false,
            _ = time::sleep(delay) => self.is_current(gen),
        }
    }
}
