#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use authsession_core::api::http_client;
use authsession_core::auth::{CredentialStore, MemoryStore, SessionManager};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use reqwest::Url;

/// Unsigned token with `exp` = now + `seconds`; `tag` keeps tokens distinct
pub fn token_expiring_in(tag: &str, seconds: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = serde_json::json!({ "sub": tag, "exp": Utc::now().timestamp() + seconds });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.sig-{}", header, payload, tag)
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Session against `base` backed by an in-memory store
pub fn memory_session(base: &str) -> (Arc<SessionManager>, CredentialStore) {
    let store = CredentialStore::new(Arc::new(MemoryStore::new()));
    let client = http_client(Duration::from_secs(5)).unwrap();
    let session = SessionManager::new(client, Url::parse(base).unwrap(), store.clone());
    (Arc::new(session), store)
}
