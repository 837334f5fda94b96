//! Single-flight credential renewal.
//!
//! However many requests discover an expired access token at the same time,
//! the renewal endpoint is called once. The first caller opens a renewal
//! ticket; everyone arriving while it is in flight attaches to the same
//! ticket and receives the same outcome.
//!
//! The ticket slot is guarded by a mutex that is only held for the
//! check-then-create step and never across an await point. The renewal
//! itself runs as a spawned task, so dropping a waiting request never
//! cancels a renewal other requests depend on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::error::RenewalError;

use super::renewal::Renewer;
use super::store::{CredentialSnapshot, CredentialStore};
use super::terminator::{SessionEndReason, SessionTerminator};
use super::tokens::{AccessToken, RefreshToken};

type Outcome = Result<AccessToken, RenewalError>;

/// Coordinates renewals for one [`CredentialStore`].
///
/// Cheap to clone; clones share the same ticket.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    store: CredentialStore,
    terminator: SessionTerminator,
    renewer: Arc<dyn Renewer>,
    ticket: Mutex<Option<Ticket>>,
    next_ticket: AtomicU64,
}

/// An in-flight renewal. Resolved by publishing `Some(outcome)`.
struct Ticket {
    id: u64,
    outcome: watch::Receiver<Option<Outcome>>,
}

enum Attach {
    Settled(Outcome),
    Waiting(watch::Receiver<Option<Outcome>>),
}

/// Discards the ticket when the renewal task finishes or is torn down.
struct TicketGuard {
    inner: Arc<CoordinatorInner>,
    id: u64,
}

impl Drop for TicketGuard {
    fn drop(&mut self) {
        let mut slot = self.inner.lock_ticket();
        if slot.as_ref().is_some_and(|ticket| ticket.id == self.id) {
            *slot = None;
        }
    }
}

impl RefreshCoordinator {
    /// Create a coordinator renewing into `store` through `renewer`.
    pub fn new(
        store: CredentialStore,
        terminator: SessionTerminator,
        renewer: Arc<dyn Renewer>,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                store,
                terminator,
                renewer,
                ticket: Mutex::new(None),
                next_ticket: AtomicU64::new(0),
            }),
        }
    }

    /// Obtain an access token newer than the one in `observed`.
    ///
    /// `observed` is the snapshot the caller used for the request that was
    /// refused. If the store has already moved past it, the current token is
    /// returned without another renewal. Otherwise the caller joins the
    /// in-flight ticket, or opens one using the refresh token held at that
    /// moment.
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(skip_all, fields(generation = observed.generation()))]
    pub async fn ensure_fresh_credential(&self, observed: &CredentialSnapshot) -> Outcome {
        let mut outcome = match self.attach_or_start(observed) {
            Attach::Settled(result) => return result,
            Attach::Waiting(outcome) => outcome,
        };

        let settled = outcome
            .wait_for(Option::is_some)
            .await
            .map(|settled| (*settled).clone());
        match settled {
            Ok(settled) => settled.unwrap_or(Err(RenewalError::Abandoned)),
            Err(_) => {
                warn!("Renewal task ended without an outcome");
                Err(RenewalError::Abandoned)
            }
        }
    }

    /// True while a renewal ticket is open.
    pub fn in_flight(&self) -> bool {
        self.inner.lock_ticket().is_some()
    }

    fn attach_or_start(&self, observed: &CredentialSnapshot) -> Attach {
        let mut slot = self.inner.lock_ticket();

        if let Some(ticket) = slot.as_ref() {
            debug!(ticket = ticket.id, "Attaching to in-flight renewal");
            return Attach::Waiting(ticket.outcome.clone());
        }

        let current = self.inner.store.read();
        if current.generation() != observed.generation() {
            debug!(
                current = current.generation(),
                "Credentials changed since the request was sent"
            );
            return Attach::Settled(
                current
                    .access_token()
                    .cloned()
                    .ok_or(RenewalError::SessionEnded),
            );
        }

        let Some(refresh_token) = current.refresh_token().cloned() else {
            return Attach::Settled(Err(RenewalError::SessionEnded));
        };

        let id = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed) + 1;
        let (publish, outcome) = watch::channel(None);
        *slot = Some(Ticket {
            id,
            outcome: outcome.clone(),
        });
        drop(slot);

        info!(ticket = id, "Starting credential renewal");

        let guard = TicketGuard {
            inner: Arc::clone(&self.inner),
            id,
        };
        let generation = current.generation();
        tokio::spawn(async move {
            let result = guard.inner.renew(id, generation, refresh_token).await;
            // Later 401s must see the committed store, not this ticket.
            drop(guard);
            publish.send_replace(Some(result));
        });

        Attach::Waiting(outcome)
    }
}

impl CoordinatorInner {
    fn lock_ticket(&self) -> MutexGuard<'_, Option<Ticket>> {
        self.ticket.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn renew(&self, id: u64, generation: u64, refresh_token: RefreshToken) -> Outcome {
        match self.renewer.renew(&refresh_token).await {
            Ok(renewed) => {
                let access_token = renewed.access_token;
                // Servers that don't rotate keep the current refresh token valid.
                let refresh_token = renewed.refresh_token.or(Some(refresh_token));

                if self
                    .store
                    .set_tokens_at(generation, access_token.clone(), refresh_token)
                {
                    info!(ticket = id, "Credential renewal succeeded");
                    return Ok(access_token);
                }

                // Signed out or logged in again while renewing.
                debug!(ticket = id, "Store changed during renewal; discarding result");
                self.current_token()
            }
            Err(err @ RenewalError::Rejected { .. }) => {
                if self
                    .terminator
                    .terminate_at(SessionEndReason::RenewalRejected, generation)
                {
                    warn!(ticket = id, error = %err, "Refresh token rejected; ending session");
                    return Err(err);
                }

                // The rejected token belonged to a session that is already gone.
                debug!(ticket = id, "Store changed during renewal; ignoring rejection");
                self.current_token()
            }
            Err(err) => {
                warn!(ticket = id, error = %err, "Credential renewal failed");
                Err(err)
            }
        }
    }

    fn current_token(&self) -> Outcome {
        self.store
            .read()
            .access_token()
            .cloned()
            .ok_or(RenewalError::SessionEnded)
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::renewal::RenewedTokens;
    use crate::auth::terminator::SessionEvent;

    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    /// Renewer that blocks until released and counts its calls.
    struct GatedRenewer {
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
        gate: Semaphore,
        result: Result<(&'static str, Option<&'static str>), RenewalError>,
    }

    impl GatedRenewer {
        fn new(result: Result<(&'static str, Option<&'static str>), RenewalError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                gate: Semaphore::new(0),
                result,
            })
        }

        fn release(&self) {
            self.gate.add_permits(1);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Renewer for GatedRenewer {
        async fn renew(&self, refresh_token: &RefreshToken) -> Result<RenewedTokens, RenewalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push(refresh_token.as_str().to_string());
            self.gate.acquire().await.unwrap().forget();
            match &self.result {
                Ok((access, refresh)) => Ok(RenewedTokens {
                    access_token: AccessToken::new(*access).unwrap(),
                    refresh_token: refresh.map(|r| RefreshToken::new(r).unwrap()),
                }),
                Err(err) => Err(err.clone()),
            }
        }
    }

    fn setup(renewer: Arc<GatedRenewer>) -> (CredentialStore, SessionTerminator, RefreshCoordinator) {
        let store = CredentialStore::new();
        store.set_tokens(
            AccessToken::new("A1").unwrap(),
            Some(RefreshToken::new("R1").unwrap()),
        );
        let terminator = SessionTerminator::new(store.clone());
        let coordinator = RefreshCoordinator::new(store.clone(), terminator.clone(), renewer);
        (store, terminator, coordinator)
    }

    async fn wait_for_calls(renewer: &GatedRenewer, n: usize) {
        while renewer.calls() < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_renewal() {
        let renewer = GatedRenewer::new(Ok(("A2", Some("R2"))));
        let (store, _, coordinator) = setup(renewer.clone());
        let observed = store.read();

        let waiters: Vec<_> = (0..10)
            .map(|_| {
                let coordinator = coordinator.clone();
                let observed = observed.clone();
                tokio::spawn(async move { coordinator.ensure_fresh_credential(&observed).await })
            })
            .collect();

        wait_for_calls(&renewer, 1).await;
        assert!(coordinator.in_flight());
        renewer.release();

        for waiter in waiters {
            let token = waiter.await.unwrap().unwrap();
            assert_eq!(token.as_str(), "A2");
        }

        assert_eq!(renewer.calls(), 1);
        assert_eq!(*renewer.seen.lock().unwrap(), vec!["R1".to_string()]);
        assert!(!coordinator.in_flight());

        let snapshot = store.read();
        assert_eq!(snapshot.access_token().unwrap().as_str(), "A2");
        assert_eq!(snapshot.refresh_token().unwrap().as_str(), "R2");
    }

    #[tokio::test]
    async fn stale_caller_after_renewal_gets_current_token() {
        let renewer = GatedRenewer::new(Ok(("A2", Some("R2"))));
        let (store, _, coordinator) = setup(renewer.clone());
        let stale = store.read();

        renewer.release();
        let first = coordinator.ensure_fresh_credential(&stale).await.unwrap();
        let second = coordinator.ensure_fresh_credential(&stale).await.unwrap();

        assert_eq!(first.as_str(), "A2");
        assert_eq!(second.as_str(), "A2");
        assert_eq!(renewer.calls(), 1);
    }

    #[tokio::test]
    async fn unrotated_refresh_token_is_kept() {
        let renewer = GatedRenewer::new(Ok(("A2", None)));
        let (store, _, coordinator) = setup(renewer.clone());

        renewer.release();
        coordinator
            .ensure_fresh_credential(&store.read())
            .await
            .unwrap();

        let snapshot = store.read();
        assert_eq!(snapshot.access_token().unwrap().as_str(), "A2");
        assert_eq!(snapshot.refresh_token().unwrap().as_str(), "R1");
    }

    #[tokio::test]
    async fn rejection_ends_session_once_for_all_waiters() {
        let renewer = GatedRenewer::new(Err(RenewalError::Rejected {
            status: 401,
            message: None,
        }));
        let (store, terminator, coordinator) = setup(renewer.clone());
        let mut events = terminator.subscribe();
        let observed = store.read();

        let waiters: Vec<_> = (0..5)
            .map(|_| {
                let coordinator = coordinator.clone();
                let observed = observed.clone();
                tokio::spawn(async move { coordinator.ensure_fresh_credential(&observed).await })
            })
            .collect();

        wait_for_calls(&renewer, 1).await;
        renewer.release();

        for waiter in waiters {
            assert!(matches!(
                waiter.await.unwrap(),
                Err(RenewalError::Rejected { status: 401, .. })
            ));
        }

        assert!(!store.read().is_authenticated());
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::Ended {
                reason: SessionEndReason::RenewalRejected
            }
        );
        assert!(events.try_recv().is_err());
        assert_eq!(renewer.calls(), 1);
    }

    #[tokio::test]
    async fn network_failure_keeps_session_and_allows_next_attempt() {
        let renewer = GatedRenewer::new(Err(RenewalError::Network {
            message: "connection reset".to_string(),
        }));
        let (store, _, coordinator) = setup(renewer.clone());
        let observed = store.read();

        renewer.release();
        let result = coordinator.ensure_fresh_credential(&observed).await;
        assert!(matches!(result, Err(RenewalError::Network { .. })));
        assert!(store.read().is_authenticated());
        assert!(!coordinator.in_flight());

        renewer.release();
        let result = coordinator.ensure_fresh_credential(&observed).await;
        assert!(matches!(result, Err(RenewalError::Network { .. })));
        assert_eq!(renewer.calls(), 2);
    }

    #[tokio::test]
    async fn dropped_waiter_does_not_cancel_renewal() {
        let renewer = GatedRenewer::new(Ok(("A2", Some("R2"))));
        let (store, _, coordinator) = setup(renewer.clone());
        let observed = store.read();

        let abandoned = {
            let coordinator = coordinator.clone();
            let observed = observed.clone();
            tokio::spawn(async move { coordinator.ensure_fresh_credential(&observed).await })
        };
        wait_for_calls(&renewer, 1).await;
        abandoned.abort();

        let survivor = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.ensure_fresh_credential(&observed).await })
        };
        renewer.release();

        assert_eq!(survivor.await.unwrap().unwrap().as_str(), "A2");
        assert_eq!(renewer.calls(), 1);
        assert_eq!(store.read().access_token().unwrap().as_str(), "A2");
    }

    #[tokio::test]
    async fn sign_out_during_renewal_is_not_undone() {
        let renewer = GatedRenewer::new(Ok(("A2", Some("R2"))));
        let (store, terminator, coordinator) = setup(renewer.clone());
        let observed = store.read();

        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.ensure_fresh_credential(&observed).await })
        };
        wait_for_calls(&renewer, 1).await;
        terminator.terminate(SessionEndReason::SignedOut);
        renewer.release();

        assert_eq!(waiter.await.unwrap(), Err(RenewalError::SessionEnded));
        assert!(!store.read().is_authenticated());
    }

    #[tokio::test]
    async fn empty_store_never_renews() {
        let renewer = GatedRenewer::new(Ok(("A2", Some("R2"))));
        let store = CredentialStore::new();
        let terminator = SessionTerminator::new(store.clone());
        let coordinator = RefreshCoordinator::new(store.clone(), terminator, renewer.clone());

        let result = coordinator.ensure_fresh_credential(&store.read()).await;
        assert_eq!(result, Err(RenewalError::SessionEnded));
        assert_eq!(renewer.calls(), 0);
    }

    #[tokio::test]
    async fn rejection_after_new_login_keeps_new_session() {
        let renewer = GatedRenewer::new(Err(RenewalError::Rejected {
            status: 401,
            message: None,
        }));
        let (store, terminator, coordinator) = setup(renewer.clone());
        let mut events = terminator.subscribe();
        let observed = store.read();

        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.ensure_fresh_credential(&observed).await })
        };
        wait_for_calls(&renewer, 1).await;
        store.set_tokens(
            AccessToken::new("B1").unwrap(),
            Some(RefreshToken::new("S1").unwrap()),
        );
        renewer.release();

        assert_eq!(waiter.await.unwrap().unwrap().as_str(), "B1");
        let snapshot = store.read();
        assert_eq!(snapshot.access_token().unwrap().as_str(), "B1");
        assert_eq!(snapshot.refresh_token().unwrap().as_str(), "S1");
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn rejection_after_sign_out_reports_session_ended() {
        let renewer = GatedRenewer::new(Err(RenewalError::Rejected {
            status: 401,
            message: None,
        }));
        let (store, terminator, coordinator) = setup(renewer.clone());
        let observed = store.read();

        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.ensure_fresh_credential(&observed).await })
        };
        wait_for_calls(&renewer, 1).await;
        terminator.terminate(SessionEndReason::SignedOut);
        renewer.release();

        assert_eq!(waiter.await.unwrap(), Err(RenewalError::SessionEnded));
    }

    /// Renewer whose call blows up once released.
    struct PanickingRenewer {
        calls: AtomicUsize,
        gate: Semaphore,
    }

    #[async_trait]
    impl Renewer for PanickingRenewer {
        async fn renew(&self, _: &RefreshToken) -> Result<RenewedTokens, RenewalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.acquire().await.unwrap().forget();
            panic!("renewer failed");
        }
    }

    #[tokio::test]
    async fn panicking_renewal_releases_every_waiter() {
        let renewer = Arc::new(PanickingRenewer {
            calls: AtomicUsize::new(0),
            gate: Semaphore::new(0),
        });
        let store = CredentialStore::new();
        store.set_tokens(
            AccessToken::new("A1").unwrap(),
            Some(RefreshToken::new("R1").unwrap()),
        );
        let terminator = SessionTerminator::new(store.clone());
        let coordinator = RefreshCoordinator::new(store.clone(), terminator, renewer.clone());
        let observed = store.read();

        let first = {
            let coordinator = coordinator.clone();
            let observed = observed.clone();
            tokio::spawn(async move { coordinator.ensure_fresh_credential(&observed).await })
        };
        while renewer.calls.load(Ordering::SeqCst) < 1 {
            tokio::task::yield_now().await;
        }

        // Attaches on first poll, before the renewal task runs again.
        let second = coordinator.ensure_fresh_credential(&observed);
        renewer.gate.add_permits(1);
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first.unwrap(), Err(RenewalError::Abandoned));
        assert_eq!(second, Err(RenewalError::Abandoned));
        assert_eq!(renewer.calls.load(Ordering::SeqCst), 1);
        assert!(!coordinator.in_flight());
        assert!(store.read().is_authenticated());
    }

    #[test]
    fn runtime_shutdown_releases_ticket() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();

        let renewer = GatedRenewer::new(Ok(("A2", Some("R2"))));
        let (store, _, coordinator) = setup(renewer.clone());

        runtime.block_on(async {
            let waiter = coordinator.clone();
            let observed = store.read();
            tokio::spawn(async move { waiter.ensure_fresh_credential(&observed).await });
            wait_for_calls(&renewer, 1).await;
        });
        assert!(coordinator.in_flight());

        runtime.shutdown_timeout(std::time::Duration::from_secs(1));

        assert!(!coordinator.in_flight());
        assert!(store.read().is_authenticated());
        assert_eq!(store.read().access_token().unwrap().as_str(), "A1");
    }
}
