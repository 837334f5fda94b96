//! The client facade and its verb helpers.

use std::sync::Arc;

use reqwest::StatusCode;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use crate::auth::{
    AccessToken, Credentials, CredentialStore, HttpRenewer, RefreshCoordinator, RefreshToken,
    Renewer, SessionEndReason, SessionEvent, SessionTerminator, TokenPairResponse,
};
use crate::config::ClientConfig;
use crate::error::{AuthError, Error, TransportError};
use crate::http::response::parse_error_body;
use crate::http::{ApiResponse, Executor, Method, MultipartForm, PendingRequest};

/// An API client whose requests carry the stored bearer token.
///
/// Clients are cheap to clone (they use internal `Arc`) and safe to share
/// across tasks. All clones share one [`CredentialStore`] and one renewal
/// ticket, so concurrent requests that hit an expired token renew it once.
///
/// # Example
///
/// ```no_run
/// use authwire::{ApiUrl, Client, ClientConfig, Credentials};
///
/// # async fn example() -> Result<(), authwire::Error> {
/// let config = ClientConfig::new(ApiUrl::new("https://api.example.com")?);
/// let client = Client::new(config)?;
/// client.login(Credentials::new("alice@example.com", "secret")).await?;
///
/// let datasets: serde_json::Value = client.get("/datasets").await?.json()?;
/// println!("{datasets}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    http: reqwest::Client,
    store: CredentialStore,
    terminator: SessionTerminator,
    coordinator: RefreshCoordinator,
    executor: Executor,
}

impl Client {
    /// Create a client with an empty store that renews through the configured
    /// renewal endpoint.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let http = config.http_client()?;
        let renewer = Arc::new(
            HttpRenewer::new(http.clone(), config.renewal_url())
                .with_timeout(config.renewal_timeout()),
        );
        Ok(Self::assemble(config, http, CredentialStore::new(), renewer))
    }

    /// Create a client around an existing store and renewer.
    ///
    /// The store is used by reference; anything else holding a clone of it
    /// sees every change this client makes.
    pub fn from_parts(
        config: ClientConfig,
        store: CredentialStore,
        renewer: Arc<dyn Renewer>,
    ) -> Result<Self, Error> {
        let http = config.http_client()?;
        Ok(Self::assemble(config, http, store, renewer))
    }

    fn assemble(
        config: ClientConfig,
        http: reqwest::Client,
        store: CredentialStore,
        renewer: Arc<dyn Renewer>,
    ) -> Self {
        let terminator = SessionTerminator::new(store.clone());
        let coordinator = RefreshCoordinator::new(store.clone(), terminator.clone(), renewer);
        let executor = Executor::new(
            http.clone(),
            config.base_url.clone(),
            store.clone(),
            coordinator.clone(),
        );

        Self {
            inner: Arc::new(ClientInner {
                config,
                http,
                store,
                terminator,
                coordinator,
                executor,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The credential store shared by this client.
    pub fn store(&self) -> &CredentialStore {
        &self.inner.store
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.inner.coordinator
    }

    /// Subscribe to "session ended" notifications.
    pub fn session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.terminator.subscribe()
    }

    /// Rehydrate persisted tokens.
    pub fn restore(&self, access_token: AccessToken, refresh_token: Option<RefreshToken>) {
        debug!(has_refresh = refresh_token.is_some(), "Restoring persisted session");
        self.inner.store.set_tokens(access_token, refresh_token);
    }

    /// Exchange credentials for a token pair and store it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if the login endpoint refuses
    /// the credentials.
    #[instrument(skip(self, credentials), fields(identifier = %credentials.identifier()))]
    pub async fn login(&self, credentials: Credentials) -> Result<(), Error> {
        info!("Logging in");

        let response = self
            .inner
            .http
            .post(self.inner.config.login_url())
            .json(&credentials.login_request())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await?;
            let error = parse_error_body(status.as_u16(), &body);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST => {
                    AuthError::InvalidCredentials(error.to_string()).into()
                }
                _ => error.into(),
            });
        }

        let tokens: TokenPairResponse = response.json().await.map_err(|e| TransportError::Decode {
            message: e.to_string(),
        })?;
        let access_token = AccessToken::new(tokens.access_token)?;
        let refresh_token = tokens.refresh_token.map(RefreshToken::new).transpose()?;

        self.inner.store.set_tokens(access_token, refresh_token);
        debug!("Logged in");
        Ok(())
    }

    /// Renew the access token now.
    ///
    /// Shares the renewal ticket with any request currently recovering from
    /// a 401.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<(), Error> {
        let snapshot = self.inner.store.read();
        if snapshot.refresh_token().is_none() {
            return Err(AuthError::NotAuthenticated.into());
        }
        self.inner
            .coordinator
            .ensure_fresh_credential(&snapshot)
            .await?;
        Ok(())
    }

    /// Sign out: clear the store and notify subscribers.
    ///
    /// Returns `false` if there was no session to end.
    pub fn logout(&self) -> bool {
        self.inner.terminator.terminate(SessionEndReason::SignedOut)
    }

    /// Execute a fully described request.
    pub async fn send(&self, request: &PendingRequest) -> Result<ApiResponse, Error> {
        self.inner.executor.execute(request).await
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, Error> {
        self.send(&PendingRequest::new(Method::GET, path)).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, Error> {
        self.send(&PendingRequest::new(Method::POST, path).json(body)?)
            .await
    }

    /// POST a multipart form.
    pub async fn post_multipart(
        &self,
        path: &str,
        form: MultipartForm,
    ) -> Result<ApiResponse, Error> {
        self.send(&PendingRequest::new(Method::POST, path).multipart(form))
            .await
    }

    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, Error> {
        self.send(&PendingRequest::new(Method::PATCH, path).json(body)?)
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, Error> {
        self.send(&PendingRequest::new(Method::DELETE, path)).await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.config.base_url)
            .field("store", &self.inner.store)
            .finish()
    }
}
