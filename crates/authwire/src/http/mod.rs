//! HTTP request pipeline.
//!
//! A [`PendingRequest`] describes a call; the [`Executor`] sends it with the
//! current bearer token and recovers from an expired token once.

mod executor;
mod request;
pub(crate) mod response;

pub use executor::Executor;
pub use request::{Attempt, Method, MultipartForm, PendingRequest, RequestBody};
pub use response::{ApiResponse, ResponseBody};
