//! API base URL type.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, InvalidInputError};

/// A validated API base URL.
///
/// The URL must be absolute and use HTTPS (or HTTP on a loopback host), and
/// must not carry a query or fragment. Request paths are joined onto it with
/// [`ApiUrl::endpoint`].
///
/// # Example
///
/// ```
/// use authwire::ApiUrl;
///
/// let api = ApiUrl::new("https://api.example.com/v1").unwrap();
/// assert_eq!(api.endpoint("/auth/refresh"), "https://api.example.com/v1/auth/refresh");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiUrl(Url);

impl ApiUrl {
    /// Parse and validate a base URL.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidInputError::ApiUrl`] naming the first rule the value
    /// breaks.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();
        let reject = |reason: &str| -> Error {
            InvalidInputError::ApiUrl {
                value: s.to_string(),
                reason: reason.to_string(),
            }
            .into()
        };

        let url = Url::parse(s).map_err(|e| reject(&e.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(reject("must be an absolute URL"));
        }

        let Some(host) = url.host_str() else {
            return Err(reject("must have a host"));
        };
        let loopback = matches!(host, "localhost" | "127.0.0.1" | "[::1]");
        match url.scheme() {
            "https" => {}
            "http" if loopback => {}
            _ => return Err(reject("must use HTTPS (HTTP allowed only for localhost)")),
        }

        if url.query().is_some() || url.fragment().is_some() {
            return Err(reject("must not carry a query or fragment"));
        }

        Ok(Self(url))
    }

    /// Returns the absolute URL for a path relative to this base.
    ///
    /// Leading and trailing slashes are normalized so that `"items"` and
    /// `"/items"` address the same endpoint.
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.0.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, path)
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for ApiUrl {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ApiUrl> for String {
    fn from(url: ApiUrl) -> Self {
        url.0.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_https() {
        let api = ApiUrl::new("https://api.example.com").unwrap();
        assert_eq!(api.as_str(), "https://api.example.com/");
    }

    #[test]
    fn accepts_http_on_loopback() {
        assert!(ApiUrl::new("http://127.0.0.1:8080").is_ok());
        assert!(ApiUrl::new("http://localhost:3000/api").is_ok());
    }

    #[test]
    fn endpoint_joins_with_and_without_slashes() {
        let api = ApiUrl::new("https://api.example.com/v1/").unwrap();
        assert_eq!(api.endpoint("items"), "https://api.example.com/v1/items");
        assert_eq!(api.endpoint("/items"), "https://api.example.com/v1/items");
    }

    #[test]
    fn endpoint_on_root_url() {
        let api = ApiUrl::new("https://api.example.com").unwrap();
        assert_eq!(
            api.endpoint("auth/refresh"),
            "https://api.example.com/auth/refresh"
        );
    }

    #[test]
    fn rejects_plain_http_elsewhere() {
        assert!(ApiUrl::new("http://api.example.com").is_err());
    }

    #[test]
    fn rejects_relative_url() {
        assert!(ApiUrl::new("/auth/refresh").is_err());
    }

    #[test]
    fn rejects_query_string() {
        assert!(ApiUrl::new("https://api.example.com/?key=1").is_err());
    }

    #[test]
    fn serde_goes_through_validation() {
        let api: ApiUrl = serde_json::from_str(r#""https://api.example.com/v1""#).unwrap();
        assert_eq!(
            serde_json::to_string(&api).unwrap(),
            r#""https://api.example.com/v1""#
        );
        assert!(serde_json::from_str::<ApiUrl>(r#""ftp://example.com""#).is_err());
    }
}
