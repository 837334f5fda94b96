//! Request execution with transparent renewal.

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use tracing::{debug, instrument, warn};

use crate::auth::{AccessToken, CredentialStore, RefreshCoordinator};
use crate::error::{AuthError, Error, InvalidInputError};
use crate::types::ApiUrl;

use super::request::{Attempt, PendingRequest, RequestBody};
use super::response::{ApiResponse, parse_error_body};

/// Sends [`PendingRequest`]s with the stored bearer token.
///
/// A 401 on the first attempt is recovered through the
/// [`RefreshCoordinator`] and the request is sent exactly once more; callers
/// never see an authorization failure, only a response or
/// [`AuthError::SessionExpired`].
#[derive(Clone, Debug)]
pub struct Executor {
    http: reqwest::Client,
    base: ApiUrl,
    store: CredentialStore,
    coordinator: RefreshCoordinator,
}

impl Executor {
    pub fn new(
        http: reqwest::Client,
        base: ApiUrl,
        store: CredentialStore,
        coordinator: RefreshCoordinator,
    ) -> Self {
        Self {
            http,
            base,
            store,
            coordinator,
        }
    }

    /// Execute `request`, renewing the access token at most once.
    #[instrument(skip(self, request), fields(method = %request.method(), path = request.path()))]
    pub async fn execute(&self, request: &PendingRequest) -> Result<ApiResponse, Error> {
        let observed = self.store.read();

        let response = self
            .send(request, observed.access_token(), Attempt::Initial)
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return finish(request, response).await;
        }

        if request.overrides_authorization() || observed.refresh_token().is_none() {
            debug!("Authorization refused; renewal not applicable");
            return Err(AuthError::SessionExpired.into());
        }

        debug!("Authorization refused; renewing access token");
        let fresh = self.coordinator.ensure_fresh_credential(&observed).await?;

        let response = self.send(request, Some(&fresh), Attempt::Retry).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Authorization refused again after renewal");
            return Err(AuthError::SessionExpired.into());
        }
        finish(request, response).await
    }

    async fn send(
        &self,
        request: &PendingRequest,
        token: Option<&AccessToken>,
        attempt: Attempt,
    ) -> Result<reqwest::Response, Error> {
        let url = self.base.endpoint(request.path());
        debug!(?attempt, %url, "Sending request");

        let mut headers = request.headers().clone();
        if let Some(token) = token
            && !request.overrides_authorization()
        {
            let value = HeaderValue::from_str(&token.bearer()).map_err(|e| {
                InvalidInputError::Header {
                    name: AUTHORIZATION.to_string(),
                    reason: e.to_string(),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = self.http.request(request.method().clone(), &url);
        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }

        builder = match request.body() {
            RequestBody::Empty => builder.headers(headers),
            RequestBody::Json(value) => {
                headers
                    .entry(CONTENT_TYPE)
                    .or_insert(HeaderValue::from_static("application/json"));
                let body = serde_json::to_vec(value).map_err(|e| InvalidInputError::Body {
                    message: e.to_string(),
                })?;
                builder.headers(headers).body(body)
            }
            RequestBody::Bytes { content_type, data } => {
                if !headers.contains_key(CONTENT_TYPE) {
                    let value = HeaderValue::from_str(content_type).map_err(|e| {
                        InvalidInputError::Header {
                            name: CONTENT_TYPE.to_string(),
                            reason: e.to_string(),
                        }
                    })?;
                    headers.insert(CONTENT_TYPE, value);
                }
                builder.headers(headers).body(data.clone())
            }
            RequestBody::Multipart(form) => {
                // The boundary belongs to the transport.
                headers.remove(CONTENT_TYPE);
                builder.headers(headers).multipart(form.to_form()?)
            }
        };

        Ok(builder.send().await?)
    }
}

async fn finish(request: &PendingRequest, response: reqwest::Response) -> Result<ApiResponse, Error> {
    let status = response.status();
    if status.is_success() {
        return ApiResponse::read(response, request.expects_binary()).await;
    }

    let body = response.bytes().await?;
    let error = parse_error_body(status.as_u16(), &body);
    debug!(%error, "Request failed");
    Err(error.into())
}
