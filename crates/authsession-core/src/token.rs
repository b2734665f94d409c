//! Bearer credential handling and expiry decoding.
//!
//! Credentials are compact three-segment signed tokens (`header.payload.signature`).
//! Only the payload's `exp` claim is read; the signature is never verified here,
//! that is the server's job. Anything that cannot be decoded counts as expired.

use std::fmt;

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Segment delimiter of a compact token
const SEGMENT_DELIMITER: char = '.';

/// An opaque bearer credential.
///
/// `Debug` is redacted so credentials never end up in logs by accident.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether the credential is expired (or unreadable) right now
    pub fn is_expired(&self) -> bool {
        is_expired(&self.0)
    }

    /// Decoded expiry, if the payload carries one
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        expires_at(&self.0)
    }

    /// Value for an `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({} chars)", self.0.len())
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// Check if a token is expired against the current wall clock.
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now())
}

/// Check if a token is expired at `now`.
///
/// Expired iff `exp < floor(now)` in Unix seconds. Malformed tokens are expired.
pub fn is_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    match decode_exp(token) {
        Some(exp) => exp < now.timestamp() as f64,
        None => true,
    }
}

/// Expiry of a token as a timestamp, if it can be decoded
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    let exp = decode_exp(token)?;
    Utc.timestamp_opt(exp.floor() as i64, 0).single()
}

fn decode_exp(token: &str) -> Option<f64> {
    let payload = token.split(SEGMENT_DELIMITER).nth(1)?;
    let bytes = decode_segment(payload)?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_f64()
}

/// Decode a payload segment, accepting either base64 alphabet with or without padding.
fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    let trimmed = segment.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .ok()
}

// ============================================================================
// Tests
// ============================================================================
