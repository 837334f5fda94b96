//! Shared credential store.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use super::tokens::{AccessToken, RefreshToken};

/// A committed view of the credential store.
///
/// Snapshots are cheap to clone and never change after they are taken. The
/// `generation` increases with every committed change, which lets callers
/// tell whether the store moved on since they last read it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CredentialSnapshot {
    access_token: Option<AccessToken>,
    refresh_token: Option<RefreshToken>,
    generation: u64,
}

impl CredentialSnapshot {
    /// Returns the access token, if any.
    pub fn access_token(&self) -> Option<&AccessToken> {
        self.access_token.as_ref()
    }

    /// Returns the refresh token, if any.
    pub fn refresh_token(&self) -> Option<&RefreshToken> {
        self.refresh_token.as_ref()
    }

    /// True iff both tokens are held.
    ///
    /// A store restored with an access token alone can still authorize
    /// requests, but it cannot renew and does not count as a session.
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some() && self.refresh_token.is_some()
    }

    /// Monotonic change counter of the store this snapshot came from.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Holds the current access and refresh tokens.
///
/// The store is shared by reference: clones observe and mutate the same
/// state. It only changes through [`set_tokens`](Self::set_tokens) and
/// [`clear`](Self::clear), both of which commit the whole pair at once so no
/// reader ever observes a fresh access token next to a stale refresh token.
///
/// # Example
///
/// ```
/// use authwire::{AccessToken, CredentialStore, RefreshToken};
///
/// let store = CredentialStore::new();
/// assert!(!store.read().is_authenticated());
///
/// store.set_tokens(
///     AccessToken::new("A1").unwrap(),
///     Some(RefreshToken::new("R1").unwrap()),
/// );
/// assert!(store.read().is_authenticated());
/// ```
#[derive(Clone)]
pub struct CredentialStore {
    state: Arc<watch::Sender<CredentialSnapshot>>,
}

impl CredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (state, _) = watch::channel(CredentialSnapshot::default());
        Self {
            state: Arc::new(state),
        }
    }

    /// Returns the latest committed snapshot. Never blocks on I/O.
    pub fn read(&self) -> CredentialSnapshot {
        self.state.borrow().clone()
    }

    /// Atomically replace both tokens.
    pub fn set_tokens(&self, access_token: AccessToken, refresh_token: Option<RefreshToken>) {
        self.state.send_modify(|snapshot| {
            snapshot.access_token = Some(access_token);
            snapshot.refresh_token = refresh_token;
            snapshot.generation += 1;
            debug!(generation = snapshot.generation, "Credentials replaced");
        });
    }

    /// Atomically drop both tokens.
    ///
    /// Returns `true` if credentials were held. Clearing an empty store
    /// commits nothing and notifies nobody.
    pub fn clear(&self) -> bool {
        self.clear_at(None)
    }

    /// Clear only if the store is still at `generation` (when given).
    pub(crate) fn clear_at(&self, generation: Option<u64>) -> bool {
        self.state.send_if_modified(|snapshot| {
            if generation.is_some_and(|g| g != snapshot.generation) {
                return false;
            }
            if snapshot.access_token.is_none() && snapshot.refresh_token.is_none() {
                return false;
            }
            snapshot.access_token = None;
            snapshot.refresh_token = None;
            snapshot.generation += 1;
            debug!(generation = snapshot.generation, "Credentials cleared");
            true
        })
    }

    /// Replace the pair only if nothing was committed since `generation`.
    ///
    /// A renewal that finishes after a sign-out or a fresh login must not
    /// overwrite what happened in the meantime.
    pub(crate) fn set_tokens_at(
        &self,
        generation: u64,
        access_token: AccessToken,
        refresh_token: Option<RefreshToken>,
    ) -> bool {
        self.state.send_if_modified(|snapshot| {
            if snapshot.generation != generation {
                return false;
            }
            snapshot.access_token = Some(access_token);
            snapshot.refresh_token = refresh_token;
            snapshot.generation += 1;
            debug!(generation = snapshot.generation, "Credentials renewed");
            true
        })
    }

    /// Subscribe to committed changes.
    ///
    /// The receiver starts at the current snapshot; every later `set_tokens`
    /// or effective `clear` marks it changed.
    pub fn subscribe(&self) -> watch::Receiver<CredentialSnapshot> {
        self.state.subscribe()
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.state.borrow();
        f.debug_struct("CredentialStore")
            .field("authenticated", &snapshot.is_authenticated())
            .field("generation", &snapshot.generation)
            .field("tokens", &"[REDACTED]")
            .finish()
    }
}
