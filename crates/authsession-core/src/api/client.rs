//! Client for the endpoints that create or change credentials.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use super::{ApiError, ApiRequest};
use crate::auth::SessionManager;
use crate::models::{SignInRequest, SignInResponse, SignUpRequest, UpdatePasswordRequest};
use crate::token::Credential;

const SIGN_IN_PATH: &str = "/signin";
const SIGN_UP_PATH: &str = "/signup";
const PASSWORD_PATH: &str = "/me/password";

/// Build the HTTP client shared by the session and the API.
///
/// The cookie store keeps the HttpOnly refresh cookie the server sets on
/// sign-in, so it rides along with refresh requests.
pub fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .cookie_store(true)
        .timeout(timeout)
        .user_agent(concat!("authsession/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Sign-in, sign-up and password changes on top of a session.
///
/// Clone is cheap; it only holds the shared session.
#[derive(Clone)]
pub struct AuthApi {
    session: Arc<SessionManager>,
}

impl AuthApi {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Sign in and install the returned credential.
    ///
    /// Anything but 200 is returned as `ApiError::Rejected` carrying the
    /// server's message.
    pub async fn sign_in(&self, request: &SignInRequest) -> Result<Credential, ApiError> {
        debug!(email = %request.email, username = %request.username, "Signing in");
        let url = self.session.endpoint(SIGN_IN_PATH)?;
        let response = ApiRequest::post(url)
            .json(request)?
            .build(self.session.http(), None)?
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Sign in rejected");
            return Err(ApiError::rejected(status, &body));
        }

        let body: SignInResponse = response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse sign in response: {}", e))
        })?;

        let credential = Credential::from(body.token);
        self.session.login(credential.clone());
        info!("Signed in");
        Ok(credential)
    }

    /// Create an account. Does not sign in.
    pub async fn sign_up(&self, request: &SignUpRequest) -> Result<(), ApiError> {
        debug!(email = %request.email, username = %request.username, "Signing up");
        let url = self.session.endpoint(SIGN_UP_PATH)?;
        let response = ApiRequest::post(url)
            .json(request)?
            .build(self.session.http(), None)?
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Sign up rejected");
            return Err(ApiError::rejected(status, &body));
        }

        info!("Account created");
        Ok(())
    }

    /// Create an account, then sign in to it with the same email and
    /// password.
    ///
    /// A failed sign-in after a successful sign-up is returned as is; the
    /// account still exists.
    pub async fn sign_up_and_sign_in(&self, request: &SignUpRequest) -> Result<Credential, ApiError> {
        self.sign_up(request).await?;
        self.sign_in(&SignInRequest::with_email(
            request.email.clone(),
            request.password.clone(),
        ))
        .await
    }

    /// Change the signed-in user's password
    pub async fn update_password(&self, request: &UpdatePasswordRequest) -> Result<(), ApiError> {
        let url = self.session.endpoint(PASSWORD_PATH)?;
        let request = ApiRequest::put(url).json(request)?;
        let response = self.session.fetch_with_auth(&request).await?;

        // A wrong old password is also a 401; show the server's message
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Password update rejected");
            return Err(ApiError::rejected(status, &body));
        }
        info!("Password updated");
        Ok(())
    }
}
