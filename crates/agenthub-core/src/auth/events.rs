use tokio::sync::broadcast;

use super::session::AuthUser;

/// Buffer size for the auth event channel.
/// Session changes are rare; 16 leaves headroom for slow subscribers.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Session-change notifications published by the auth client.
///
/// Subscribers that lag behind see `RecvError::Lagged` and should re-read
/// the current session instead of replaying missed events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(AuthUser),
    TokenRefreshed,
    SignedOut,
}

pub(crate) fn channel() -> broadcast::Sender<AuthEvent> {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}
