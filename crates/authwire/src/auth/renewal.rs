//! Renewal endpoint client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::RenewalError;
use crate::http::response::parse_error_body;

use super::tokens::{AccessToken, RefreshToken};

/// Tokens returned by a successful renewal.
#[derive(Debug, Clone)]
pub struct RenewedTokens {
    /// The new access token.
    pub access_token: AccessToken,
    /// The rotated refresh token, if the server issued one.
    pub refresh_token: Option<RefreshToken>,
}

/// Exchanges a refresh token for a new access token.
///
/// The pipeline calls this at most once per renewal ticket; implementations
/// need no coordination of their own.
#[async_trait]
pub trait Renewer: Send + Sync {
    /// Perform one renewal call.
    async fn renew(&self, refresh_token: &RefreshToken) -> Result<RenewedTokens, RenewalError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenewalRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenPairResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Upper bound on a single renewal call unless configured otherwise.
pub const DEFAULT_RENEWAL_TIMEOUT: Duration = Duration::from_secs(30);

/// [`Renewer`] that POSTs `{"refreshToken": ...}` to a renewal endpoint and
/// reads `{"accessToken": ..., "refreshToken": ...}` back.
#[derive(Debug, Clone)]
pub struct HttpRenewer {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpRenewer {
    /// Create a renewer posting to the absolute URL `endpoint`.
    ///
    /// Every call is bounded by [`DEFAULT_RENEWAL_TIMEOUT`], whatever the
    /// client's own timeout; an unanswered call fails as a network error.
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            timeout: DEFAULT_RENEWAL_TIMEOUT,
        }
    }

    /// Bound each renewal call by `timeout` instead.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Renewer for HttpRenewer {
    #[instrument(skip(self, refresh_token), fields(endpoint = %self.endpoint))]
    async fn renew(&self, refresh_token: &RefreshToken) -> Result<RenewedTokens, RenewalError> {
        debug!("Calling renewal endpoint");

        let response = self
            .http
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&RenewalRequest {
                refresh_token: refresh_token.as_str(),
            })
            .send()
            .await
            .map_err(|e| RenewalError::Network {
                message: e.to_string(),
            })?;

        let status = response.status();
        if is_rejection(status) {
            let body = response.bytes().await.unwrap_or_default();
            let error = parse_error_body(status.as_u16(), &body);
            return Err(RenewalError::Rejected {
                status: status.as_u16(),
                message: error.message,
            });
        }
        if !status.is_success() {
            return Err(RenewalError::Network {
                message: format!("renewal endpoint answered HTTP {}", status.as_u16()),
            });
        }

        let body: TokenPairResponse = response.json().await.map_err(|e| RenewalError::Network {
            message: e.to_string(),
        })?;

        token_pair(body)
    }
}

/// Statuses meaning the refresh token itself is no good.
fn is_rejection(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST
    )
}

fn token_pair(body: TokenPairResponse) -> Result<RenewedTokens, RenewalError> {
    // An empty access token in a 2xx answer is as good as a rejection.
    let access_token = AccessToken::new(body.access_token).map_err(|e| RenewalError::Rejected {
        status: 200,
        message: Some(e.to_string()),
    })?;
    let refresh_token = body
        .refresh_token
        .and_then(|token| RefreshToken::new(token).ok());

    Ok(RenewedTokens {
        access_token,
        refresh_token,
    })
}
