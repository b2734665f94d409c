use reqwest::header;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::CredentialStore;
use crate::api::request::bearer_header;
use crate::api::{endpoint_url, ApiError, ApiRequest};
use crate::models::RefreshTokenResponse;
use crate::token::Credential;

/// Path of the refresh endpoint, relative to the base URL
const REFRESH_PATH: &str = "/auth/refresh";

/// Lifecycle of a session object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// `restore()` has not run yet
    Uninitialized,
    /// `restore()` is loading or refreshing the stored credential
    Restoring,
    Unauthenticated,
    Authenticated,
}

/// Snapshot of the session at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub credential: Option<Credential>,
    pub authenticated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestoreProgress {
    NotStarted,
    Running,
    Finished,
}

/// Owns the current credential and wraps outgoing requests with it.
///
/// The credential lives in a watch channel: replacing it is atomic and every
/// `login`/`logout` is published to subscribers. Whether the session is
/// authenticated is never stored; it is recomputed from the credential and
/// the clock on every read.
pub struct SessionManager {
    client: Client,
    base_url: Url,
    store: CredentialStore,
    credential: watch::Sender<Option<Credential>>,
    restore: watch::Sender<RestoreProgress>,
}

impl SessionManager {
    /// Create an empty session. Call `restore()` before relying on it.
    ///
    /// `client` should have its cookie store enabled so the refresh cookie set
    /// by the server is sent back to the refresh endpoint.
    pub fn new(client: Client, base_url: Url, store: CredentialStore) -> Self {
        let (credential, _) = watch::channel(None);
        let (restore, _) = watch::channel(RestoreProgress::NotStarted);
        Self {
            client,
            base_url,
            store,
            credential,
            restore,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// Absolute URL of an endpoint path
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        endpoint_url(&self.base_url, path)
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Set the credential and persist it. No network call.
    pub fn login(&self, credential: impl Into<Credential>) {
        let credential = credential.into();
        debug!(?credential, "Logging in");
        self.credential.send_replace(Some(credential.clone()));
        if let Err(e) = self.store.save(&credential) {
            warn!(error = %e, "Failed to persist credential");
        }
    }

    /// Forget the credential in memory and in storage
    pub fn logout(&self) {
        debug!("Logging out");
        self.credential.send_replace(None);
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored credential");
        }
    }

    /// Current credential, expired or not
    pub fn credential(&self) -> Option<Credential> {
        self.credential.borrow().clone()
    }

    /// Credential present and not expired right now
    pub fn is_authenticated(&self) -> bool {
        self.credential
            .borrow()
            .as_ref()
            .map(|c| !c.is_expired())
            .unwrap_or(false)
    }

    pub fn state(&self) -> SessionState {
        let credential = self.credential();
        let authenticated = credential.as_ref().map(|c| !c.is_expired()).unwrap_or(false);
        SessionState {
            credential,
            authenticated,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        let progress = *self.restore.borrow();
        match progress {
            RestoreProgress::Running => SessionPhase::Restoring,
            _ if self.is_authenticated() => SessionPhase::Authenticated,
            RestoreProgress::NotStarted => SessionPhase::Uninitialized,
            RestoreProgress::Finished => SessionPhase::Unauthenticated,
        }
    }

    /// Receive the credential every time it is replaced
    pub fn subscribe(&self) -> watch::Receiver<Option<Credential>> {
        self.credential.subscribe()
    }

    // =========================================================================
    // Restore and refresh
    // =========================================================================

    /// Load the persisted credential, refreshing it if it has expired.
    ///
    /// The stored credential is installed before the refresh runs, so until
    /// this future resolves `is_authenticated()` may briefly report an expired
    /// token as valid. Only the first call does the work; later callers wait
    /// for it to finish.
    pub async fn restore(&self) {
        let mut started = false;
        self.restore.send_if_modified(|progress| {
            if *progress != RestoreProgress::NotStarted {
                return false;
            }
            *progress = RestoreProgress::Running;
            started = true;
            true
        });

        if !started {
            debug!("Restore already started, waiting for it");
            let mut progress = self.restore.subscribe();
            let _ = progress
                .wait_for(|p| *p == RestoreProgress::Finished)
                .await;
            return;
        }

        self.restore_stored().await;

        self.restore.send_replace(RestoreProgress::Finished);
        info!(authenticated = self.is_authenticated(), "Session restored");
    }

    async fn restore_stored(&self) {
        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to load stored credential, starting logged out");
                None
            }
        };

        let Some(credential) = stored else {
            debug!("No stored credential");
            return;
        };

        self.credential.send_replace(Some(credential.clone()));
        if !credential.is_expired() {
            debug!(expires_at = ?credential.expires_at(), "Stored credential still valid");
            return;
        }

        info!("Stored credential expired, refreshing");
        match self.refresh(&credential).await {
            Ok(Some(fresh)) => self.login(fresh),
            Ok(None) => self.logout(),
            Err(e) => {
                warn!(error = %e, "Refresh failed during restore");
                self.logout();
            }
        }
    }

    /// Exchange `old` for a new credential.
    ///
    /// A non-success status logs the session out and yields `None`. A success
    /// without an `access_token` also yields `None` but keeps the session. The
    /// new credential is returned but not installed; callers decide whether to
    /// `login` with it. Transport failures and non-JSON bodies are errors.
    pub async fn refresh(&self, old: &Credential) -> Result<Option<Credential>, ApiError> {
        let url = self.endpoint(REFRESH_PATH)?;
        debug!(%url, "Refreshing credential");

        let response = self
            .client
            .post(url)
            .header(header::AUTHORIZATION, bearer_header(old)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Credential refresh rejected, logging out");
            self.logout();
            return Ok(None);
        }

        let body: RefreshTokenResponse = response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse refresh response: {}", e))
        })?;

        let Some(token) = body.access_token else {
            warn!("Refresh response carried no access_token");
            return Ok(None);
        };

        info!("Credential refreshed");
        Ok(Some(Credential::from(token)))
    }

    // =========================================================================
    // Authenticated requests
    // =========================================================================

    /// Send `request` with the current credential, refreshing and retrying
    /// once on 401.
    ///
    /// Any status other than 401 is returned untouched. On 401 with a
    /// credential, the credential is refreshed; if that fails the original
    /// 401 is returned, otherwise the request is sent exactly once more with
    /// the new credential and that response is returned whatever its status.
    pub async fn fetch_with_auth(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        self.fetch_with_credential(request, self.credential()).await
    }

    /// `fetch_with_auth` using a credential captured earlier by the caller.
    ///
    /// A concurrent login or logout doesn't change which credential this
    /// request starts with.
    pub async fn fetch_with_credential(
        &self,
        request: &ApiRequest,
        credential: Option<Credential>,
    ) -> Result<Response, ApiError> {
        let response = request.build(&self.client, credential.as_ref())?.send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(credential) = credential else {
            debug!(url = %request.url(), "Unauthorized without a credential");
            return Ok(response);
        };

        debug!(url = %request.url(), "Unauthorized, refreshing credential");
        let Some(fresh) = self.refresh(&credential).await? else {
            return Ok(response);
        };

        self.login(fresh.clone());
        let retried = request.build(&self.client, Some(&fresh))?.send().await?;
        debug!(url = %request.url(), status = %retried.status(), "Retried after refresh");
        Ok(retried)
    }

    /// Authenticated GET decoding a JSON body; non-success statuses become errors
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.get_json_with(path, self.credential()).await
    }

    pub(crate) async fn get_json_with<T: DeserializeOwned>(
        &self,
        path: &str,
        credential: Option<Credential>,
    ) -> Result<T, ApiError> {
        let request = ApiRequest::get(self.endpoint(path)?);
        let response = self.fetch_with_credential(&request, credential).await?;
        check_response(response)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {}: {}", path, e)))
    }
}

/// Pass a successful response through, turning anything else into an error
async fn check_response(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body))
    }
}
