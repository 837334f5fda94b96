//! Credentials, their storage, and renewal coordination.
//!
//! The [`CredentialStore`] is the only mutable shared state of the pipeline.
//! The [`RefreshCoordinator`] guarantees at most one renewal call per store,
//! and the [`SessionTerminator`] ends the session when renewal is refused.

mod coordinator;
mod credentials;
mod renewal;
mod store;
mod terminator;
mod tokens;

pub use coordinator::RefreshCoordinator;
pub use credentials::Credentials;
pub(crate) use renewal::TokenPairResponse;
pub use renewal::{DEFAULT_RENEWAL_TIMEOUT, HttpRenewer, RenewedTokens, Renewer};
pub use store::{CredentialSnapshot, CredentialStore};
pub use terminator::{SessionEndReason, SessionEvent, SessionTerminator};
pub use tokens::{AccessToken, RefreshToken};
