//! Bearer-credential session management for an HTTP auth service.
//!
//! A `SessionManager` owns the current credential, persists it through a
//! `CredentialStore`, restores it on start (refreshing it if it expired) and
//! sends authenticated requests that refresh and retry once on 401. A
//! `ProfileCache` follows the session and keeps the signed-in user's profile.
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use std::sync::Arc;
//! use authsession_core::{AuthApi, Config, ProfileCache, SignInRequest};
//!
//! let session = Arc::new(Config::load()?.build_session()?);
//! session.restore().await;
//!
//! let profiles = ProfileCache::new(session.clone());
//! let _watcher = profiles.spawn_watcher();
//!
//! if !session.is_authenticated() {
//!     AuthApi::new(session.clone())
//!         .sign_in(&SignInRequest::with_email("me@example.com", "hunter2"))
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod profile;
pub mod token;

pub use api::{ApiError, ApiRequest, AuthApi};
pub use auth::{CredentialStore, SessionManager, SessionPhase, SessionState};
pub use config::{Config, StorageBackend};
pub use models::{SignInRequest, SignUpRequest, UpdatePasswordRequest, UserProfile};
pub use profile::ProfileCache;
pub use token::Credential;
