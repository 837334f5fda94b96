//! Session termination and the "session ended" notification.

use tokio::sync::broadcast;
use tracing::info;

use super::store::CredentialStore;

/// Capacity of the session event channel. Lagging subscribers lose the
/// oldest events, never block the pipeline.
const EVENT_CAPACITY: usize = 16;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEndReason {
    /// The renewal endpoint refused the refresh token.
    RenewalRejected,
    /// The user signed out explicitly.
    SignedOut,
}

/// Notifications published to UI and navigation layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The store was cleared; the user has to authenticate again.
    Ended { reason: SessionEndReason },
}

/// Clears the credential store and broadcasts the end of the session.
#[derive(Clone, Debug)]
pub struct SessionTerminator {
    store: CredentialStore,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionTerminator {
    /// Create a terminator for `store`.
    pub fn new(store: CredentialStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { store, events }
    }

    /// End the session.
    ///
    /// Only the call that actually removes credentials publishes an event;
    /// repeated or concurrent calls return `false` and stay silent.
    pub fn terminate(&self, reason: SessionEndReason) -> bool {
        self.end(reason, None)
    }

    /// End the session only if the store is still at `generation`.
    pub(crate) fn terminate_at(&self, reason: SessionEndReason, generation: u64) -> bool {
        self.end(reason, Some(generation))
    }

    fn end(&self, reason: SessionEndReason, generation: Option<u64>) -> bool {
        if !self.store.clear_at(generation) {
            return false;
        }
        info!(?reason, "Session ended");
        // Nobody listening is fine.
        let _ = self.events.send(SessionEvent::Ended { reason });
        true
    }

    /// Subscribe to session notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AccessToken, RefreshToken};
    use tokio::sync::broadcast::error::TryRecvError;

    fn authenticated_store() -> CredentialStore {
        let store = CredentialStore::new();
        store.set_tokens(
            AccessToken::new("A1").unwrap(),
            Some(RefreshToken::new("R1").unwrap()),
        );
        store
    }

    #[test]
    fn terminate_clears_and_notifies_once() {
        let store = authenticated_store();
        let terminator = SessionTerminator::new(store.clone());
        let mut events = terminator.subscribe();

        assert!(terminator.terminate(SessionEndReason::RenewalRejected));
        assert!(!terminator.terminate(SessionEndReason::RenewalRejected));

        assert!(!store.read().is_authenticated());
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::Ended {
                reason: SessionEndReason::RenewalRejected
            }
        );
        assert_eq!(events.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[test]
    fn terminate_without_subscribers_still_clears() {
        let store = authenticated_store();
        let terminator = SessionTerminator::new(store.clone());
        assert!(terminator.terminate(SessionEndReason::SignedOut));
        assert!(!store.read().is_authenticated());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_termination_fires_once() {
        let store = authenticated_store();
        let terminator = SessionTerminator::new(store.clone());
        let mut events = terminator.subscribe();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let terminator = terminator.clone();
                tokio::spawn(async move { terminator.terminate(SessionEndReason::RenewalRejected) })
            })
            .collect();

        let mut fired = 0;
        for handle in handles {
            if handle.await.unwrap() {
                fired += 1;
            }
        }

        assert_eq!(fired, 1);
        assert!(events.try_recv().is_ok());
        assert_eq!(events.try_recv().unwrap_err(), TryRecvError::Empty);
    }
}
