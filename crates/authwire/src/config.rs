//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::DEFAULT_RENEWAL_TIMEOUT;
use crate::error::{Error, TransportError};
use crate::types::ApiUrl;

const DEFAULT_LOGIN_PATH: &str = "auth/login";
const DEFAULT_RENEWAL_PATH: &str = "auth/refresh";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings for a [`Client`](crate::Client).
///
/// # Example
///
/// ```
/// use authwire::{ApiUrl, ClientConfig};
///
/// let config = ClientConfig::new(ApiUrl::new("https://api.example.com").unwrap())
///     .with_renewal_path("/session/refresh")
///     .with_timeout_secs(10);
/// assert_eq!(config.renewal_url(), "https://api.example.com/session/refresh");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL every request path is resolved against.
    pub base_url: ApiUrl,

    /// Path of the login endpoint.
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Path of the renewal endpoint.
    #[serde(default = "default_renewal_path")]
    pub renewal_path: String,

    /// `User-Agent` sent with every call.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-call timeout, in seconds. Zero disables it for ordinary requests;
    /// renewal calls are always bounded.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_string()
}

fn default_renewal_path() -> String {
    DEFAULT_RENEWAL_PATH.to_string()
}

fn default_user_agent() -> String {
    concat!("authwire/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ClientConfig {
    /// Defaults for everything but the base URL.
    pub fn new(base_url: ApiUrl) -> Self {
        Self {
            base_url,
            login_path: default_login_path(),
            renewal_path: default_renewal_path(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn with_renewal_path(mut self, path: impl Into<String>) -> Self {
        self.renewal_path = path.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Absolute URL of the login endpoint.
    pub fn login_url(&self) -> String {
        self.base_url.endpoint(&self.login_path)
    }

    /// Absolute URL of the renewal endpoint.
    pub fn renewal_url(&self) -> String {
        self.base_url.endpoint(&self.renewal_path)
    }

    /// Bound on one renewal call: the configured timeout, or
    /// [`DEFAULT_RENEWAL_TIMEOUT`] when that is disabled.
    pub fn renewal_timeout(&self) -> Duration {
        if self.timeout_secs > 0 {
            Duration::from_secs(self.timeout_secs)
        } else {
            DEFAULT_RENEWAL_TIMEOUT
        }
    }

    /// Build the shared HTTP client.
    pub(crate) fn http_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder().user_agent(self.user_agent.as_str());
        if self.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(self.timeout_secs));
        }
        builder.build().map_err(|e| {
            TransportError::Http {
                message: format!("failed to build HTTP client: {}", e),
            }
            .into()
        })
    }
}
