//! Request description.

use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

pub use reqwest::Method;

use crate::error::{Error, InvalidInputError};

/// Which attempt of a logical request is being sent.
///
/// A request is sent at most twice: once as issued, and once more after a
/// successful renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Initial,
    Retry,
}

/// One HTTP call, described independently of any attempt to send it.
///
/// Built with consuming setters, then passed by reference to the executor,
/// which never mutates it; the same value is resent on retry.
///
/// # Example
///
/// ```
/// use authwire::http::{Method, PendingRequest};
///
/// let request = PendingRequest::new(Method::GET, "/datasets")
///     .query("page", "2")
///     .header("x-request-id", "abc123")
///     .unwrap();
/// assert_eq!(request.path(), "/datasets");
/// ```
#[derive(Debug, Clone)]
pub struct PendingRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: RequestBody,
    expect_binary: bool,
}

impl PendingRequest {
    /// Create a request for `path`, relative to the client's base URL.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            expect_binary: false,
        }
    }

    /// Append a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Set a header, replacing any earlier value.
    ///
    /// Setting `Authorization` overrides the stored bearer token for this
    /// request, and disables renewal for it.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, Error> {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| InvalidInputError::Header {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| InvalidInputError::Header {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Serialize `body` as the JSON payload.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, Error> {
        let value = serde_json::to_value(body).map_err(|e| InvalidInputError::Body {
            message: e.to_string(),
        })?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    /// Send a multipart form. The transport chooses the boundary.
    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    /// Send raw bytes with the given content type.
    pub fn bytes(mut self, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Bytes {
            content_type: content_type.into(),
            data: data.into(),
        };
        self
    }

    /// Return the response payload as raw bytes instead of parsing it.
    pub fn expect_binary(mut self) -> Self {
        self.expect_binary = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn expects_binary(&self) -> bool {
        self.expect_binary
    }

    /// True if the caller supplied its own `Authorization` header.
    pub fn overrides_authorization(&self) -> bool {
        self.headers.contains_key(AUTHORIZATION)
    }
}

/// Request payload.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Sent with `Content-Type: application/json` unless the caller set one.
    Json(serde_json::Value),
    /// Sent as-is with the given content type unless the caller set one.
    Bytes { content_type: String, data: Bytes },
    /// Sent as `multipart/form-data`; caller content types are dropped.
    Multipart(MultipartForm),
}

/// A multipart form that can be rebuilt for every attempt.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    parts: Vec<(String, FormPart)>,
}

#[derive(Debug, Clone)]
enum FormPart {
    Text(String),
    File {
        data: Bytes,
        file_name: Option<String>,
        mime: Option<String>,
    },
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push((name.into(), FormPart::Text(value.into())));
        self
    }

    /// Add a binary field.
    pub fn file(
        mut self,
        name: impl Into<String>,
        data: impl Into<Bytes>,
        file_name: Option<String>,
        mime: Option<String>,
    ) -> Self {
        self.parts.push((
            name.into(),
            FormPart::File {
                data: data.into(),
                file_name,
                mime,
            },
        ));
        self
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub(crate) fn to_form(&self) -> Result<reqwest::multipart::Form, Error> {
        let mut form = reqwest::multipart::Form::new();
        for (name, part) in &self.parts {
            form = match part {
                FormPart::Text(value) => form.text(name.clone(), value.clone()),
                FormPart::File {
                    data,
                    file_name,
                    mime,
                } => {
                    let mut part = reqwest::multipart::Part::bytes(data.to_vec());
                    if let Some(file_name) = file_name {
                        part = part.file_name(file_name.clone());
                    }
                    if let Some(mime) = mime {
                        part = part.mime_str(mime).map_err(|e| InvalidInputError::Body {
                            message: format!("invalid MIME type for part '{}': {}", name, e),
                        })?;
                    }
                    form.part(name.clone(), part)
                }
            };
        }
        Ok(form)
    }
}
