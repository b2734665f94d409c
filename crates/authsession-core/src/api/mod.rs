//! HTTP plumbing for the auth service.
//!
//! `AuthApi` covers the endpoints that create or change credentials
//! (sign-in, sign-up, password update). Authenticated traffic goes through
//! `SessionManager::fetch_with_auth` using `ApiRequest` descriptions.

pub mod client;
pub mod error;
pub mod request;

pub use client::{http_client, AuthApi};
pub use error::ApiError;
pub use request::{endpoint_url, ApiRequest};
