//! Response decoding.

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::error::{ApplicationError, Error, TransportError};

/// Payload of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// No content (204, or a zero-length body).
    Empty,
    Json(serde_json::Value),
    /// A body that is not JSON.
    Text(String),
    /// Raw bytes, returned when the request asked for a binary payload.
    Binary(Bytes),
}

/// A successful (2xx) response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: u16,
    headers: HeaderMap,
    body: ResponseBody,
}

impl ApiResponse {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// Decode the payload into `T`.
    ///
    /// An empty payload decodes as JSON `null`, so `()` and `Option<T>`
    /// accept a 204.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let decoded = match &self.body {
            ResponseBody::Empty => serde_json::from_value(serde_json::Value::Null),
            ResponseBody::Json(value) => T::deserialize(value),
            ResponseBody::Text(text) => serde_json::from_str(text),
            ResponseBody::Binary(data) => serde_json::from_slice(data),
        };
        decoded.map_err(|e| {
            TransportError::Decode {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Raw bytes of a binary payload.
    pub fn bytes(&self) -> Option<&Bytes> {
        match &self.body {
            ResponseBody::Binary(data) => Some(data),
            _ => None,
        }
    }

    /// Read a successful reqwest response.
    pub(crate) async fn read(response: reqwest::Response, expect_binary: bool) -> Result<Self, Error> {
        let status = response.status();
        let headers = response.headers().clone();
        let data = response.bytes().await?;
        trace!(status = %status, len = data.len(), "Response body received");

        let body = if status == StatusCode::NO_CONTENT || data.is_empty() {
            ResponseBody::Empty
        } else if expect_binary {
            ResponseBody::Binary(data)
        } else {
            match serde_json::from_slice(&data) {
                Ok(value) => ResponseBody::Json(value),
                Err(_) => ResponseBody::Text(String::from_utf8_lossy(&data).into_owned()),
            }
        };

        Ok(Self {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

/// Error body shapes: `{message, status}` and `{error, message}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Build an [`ApplicationError`] from a failed response body.
pub(crate) fn parse_error_body(status: u16, body: &[u8]) -> ApplicationError {
    let parsed = serde_json::from_slice::<ErrorBody>(body).ok();
    let (error, message) = match parsed {
        Some(ErrorBody { error, message }) => (error, message),
        None => {
            let text = String::from_utf8_lossy(body).trim().to_string();
            (None, (!text.is_empty()).then_some(text))
        }
    };
    let message = message.or_else(|| {
        StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .map(str::to_string)
    });
    ApplicationError::new(status, error, message)
}
