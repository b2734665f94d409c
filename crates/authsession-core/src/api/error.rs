use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request rejected ({status}): {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("Unauthorized - credential may be expired")]
    Unauthorized,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// An application-level rejection whose body is shown to the user verbatim
    pub fn rejected(status: StatusCode, body: &str) -> Self {
        ApiError::Rejected {
            status,
            body: Self::truncate_body(body.trim_end()),
        }
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            _ => Self::rejected(status, body),
        }
    }

    /// Status code of a rejected request, if there was one
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Rejected { status, .. } => Some(*status),
            ApiError::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            ApiError::Network(e) => e.status(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_unauthorized() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, "nope");
        assert!(matches!(err, ApiError::Unauthorized));
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_rejected_keeps_body_text() {
        let err = ApiError::from_status(StatusCode::CONFLICT, "User already exists with that username\n");
        assert_eq!(
            err.to_string(),
            "Request rejected (409 Conflict): User already exists with that username"
        );
    }

    #[test]
    fn test_long_body_is_truncated() {
        let body = "é".repeat(400);
        match ApiError::rejected(StatusCode::BAD_REQUEST, &body) {
            ApiError::Rejected { body: shown, .. } => {
                assert!(shown.contains("truncated, 800 total bytes"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
