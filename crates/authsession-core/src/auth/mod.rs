//! Authentication module for managing the bearer credential.
//!
//! This module provides:
//! - `SessionManager`: owns the credential, restores it on start, refreshes it
//!   on expiry and wraps requests with refresh-and-retry
//! - `CredentialStore`: the single persisted credential slot
//! - `store`: key-value backends (file, OS keychain, memory)

pub mod credentials;
pub mod session;
pub mod store;

pub use credentials::CredentialStore;
pub use session::{SessionManager, SessionPhase, SessionState};
pub use store::{FileStore, KeyValueStore, KeyringStore, MemoryStore};
