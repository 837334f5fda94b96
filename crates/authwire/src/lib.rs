//! authwire - authenticated HTTP request pipeline.
//!
//! Attaches a bearer token to every outbound call, renews an expired access
//! token transparently, and makes sure that however many requests discover
//! the expiry at once, the renewal endpoint is called only once.
//!
//! # Example
//!
//! ```no_run
//! use authwire::{ApiUrl, Client, ClientConfig, Credentials, SessionEvent};
//!
//! # async fn example() -> Result<(), authwire::Error> {
//! let client = Client::new(ClientConfig::new(ApiUrl::new("https://api.example.com")?))?;
//! client.login(Credentials::new("alice@example.com", "secret")).await?;
//!
//! let mut events = client.session_events();
//! tokio::spawn(async move {
//!     while let Ok(SessionEvent::Ended { reason }) = events.recv().await {
//!         eprintln!("session ended: {reason:?}");
//!     }
//! });
//!
//! let response = client.post("/posts", &serde_json::json!({"title": "hello"})).await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod types;

// Re-export primary types at crate root for convenience
pub use auth::{
    AccessToken, CredentialSnapshot, CredentialStore, Credentials, RefreshToken,
    SessionEndReason, SessionEvent,
};
pub use client::Client;
pub use config::ClientConfig;
pub use error::Error;
pub use http::{ApiResponse, MultipartForm, PendingRequest, ResponseBody};
pub use types::ApiUrl;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
