//! Login credentials type.

use std::fmt;

use serde::Serialize;

/// Login credentials exchanged at the API login endpoint for a token pair.
///
/// The password is never exposed in Debug output to prevent accidental
/// logging.
///
/// # Example
///
/// ```
/// use authwire::Credentials;
///
/// let creds = Credentials::new("alice@example.com", "correct-horse");
/// assert_eq!(creds.identifier(), "alice@example.com");
/// ```
#[derive(Clone)]
pub struct Credentials {
    identifier: String,
    password: String,
}

/// Wire shape of the login request body.
#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub identifier: &'a str,
    pub password: &'a str,
}

impl Credentials {
    /// Create new credentials.
    ///
    /// * `identifier` - The account name or email address
    /// * `password` - The account password
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            password: password.into(),
        }
    }

    /// Returns the identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub(crate) fn login_request(&self) -> LoginRequest<'_> {
        LoginRequest {
            identifier: &self.identifier,
            password: &self.password,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
