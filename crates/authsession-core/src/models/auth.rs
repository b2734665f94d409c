use serde::{Deserialize, Serialize};

/// Body of `POST /signup`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Body of `POST /signin`. Either `username` or `email` identifies the user;
/// the other one is sent empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignInRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl SignInRequest {
    pub fn with_email(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: String::new(),
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn with_username(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: String::new(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInResponse {
    // Newer servers answer with `access_token`
    #[serde(alias = "access_token")]
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Body of `PUT /me/password`
#[derive(Debug, Clone, Serialize)]
pub struct UpdatePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_response_accepts_both_field_names() {
        let old: SignInResponse = serde_json::from_str(r#"{"token":"a"}"#).unwrap();
        let new: SignInResponse = serde_json::from_str(r#"{"access_token":"b"}"#).unwrap();
        assert_eq!(old.token, "a");
        assert_eq!(new.token, "b");
    }

    #[test]
    fn test_sign_in_request_shape() {
        let body = serde_json::to_value(SignInRequest::with_email("a@b.c", "pw")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "username": "", "email": "a@b.c", "password": "pw" })
        );
    }
}
