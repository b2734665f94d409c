//! Rebuildable request descriptions.
//!
//! `reqwest::RequestBuilder` is consumed on send, but the authenticated
//! fetch may need to issue the same request twice with different
//! credentials. `ApiRequest` keeps everything needed to rebuild it.

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Serialize;

use super::ApiError;
use crate::token::Credential;

#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl ApiRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: Url) -> Self {
        Self::new(Method::PUT, url)
    }

    /// Attach a JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode body: {}", e)))?;
        self.body = Some(bytes);
        Ok(self)
    }

    /// Add an extra header. `Content-Type` and `Authorization` are always
    /// overwritten when the request is built.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Build a sendable request carrying `credential` as a bearer token
    pub(crate) fn build(
        &self,
        client: &Client,
        credential: Option<&Credential>,
    ) -> Result<RequestBuilder, ApiError> {
        let mut headers = self.headers.clone();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        if let Some(credential) = credential {
            headers.insert(header::AUTHORIZATION, bearer_header(credential)?);
        }

        let mut builder = client
            .request(self.method.clone(), self.url.clone())
            .headers(headers);
        if let Some(ref body) = self.body {
            builder = builder.body(body.clone());
        }
        Ok(builder)
    }
}

/// `Authorization` header value for a credential, marked sensitive
pub(crate) fn bearer_header(credential: &Credential) -> Result<HeaderValue, ApiError> {
    let mut value = HeaderValue::from_str(&credential.bearer())
        .map_err(|_| ApiError::InvalidRequest("Credential is not a valid header value".into()))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Join an endpoint path onto a base URL, keeping any path prefix of the base
pub fn endpoint_url(base: &Url, path: &str) -> Result<Url, ApiError> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| ApiError::InvalidRequest(format!("Bad URL {}: {}", joined, e)))
}
