//! Remote client for the repository-hosting API
//!
//! A [`RemoteClient`] performs exactly one GET per call and hands back the
//! response body. Caching, retries and fallbacks live in the cache manager;
//! this layer only knows about URLs, headers and timeouts.

use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderValue, InvalidHeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT,
};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ApiConfig;

/// Errors that can occur when talking to the remote API
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The request did not complete in time
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with a non-success status
    #[error("Unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    /// A configured header value is not valid HTTP
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
}

/// A URL together with the timeout to apply to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub timeout: Duration,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

/// Performs a single network call and returns the body on success
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn fetch(&self, endpoint: &Endpoint) -> Result<String, RemoteError>;
}

/// [`RemoteClient`] backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client from the API settings
    ///
    /// The bearer token is read from the environment variable named by
    /// `ApiConfig::token_env`. Without one, requests go out unauthenticated.
    pub fn from_config(config: &ApiConfig) -> Result<Self, RemoteError> {
        let token = config.token();
        if token.is_none() {
            warn!(
                variable = %config.token_env,
                "No API token found, using unauthenticated rate limits"
            );
        }
        Self::with_token(config, token.as_deref())
    }

    /// Creates a client with an explicit token
    pub fn with_token(config: &ApiConfig, token: Option<&str>) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .default_headers(build_headers(config, token)?)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RemoteClient for HttpClient {
    async fn fetch(&self, endpoint: &Endpoint) -> Result<String, RemoteError> {
        debug!(url = %endpoint.url, "GET");

        let response = self
            .client
            .get(&endpoint.url)
            .timeout(endpoint.timeout)
            .send()
            .await
            .map_err(|e| classify(e, endpoint.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                url: endpoint.url.clone(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| classify(e, endpoint.timeout))
    }
}

fn classify(error: reqwest::Error, timeout: Duration) -> RemoteError {
    if error.is_timeout() {
        RemoteError::Timeout(timeout)
    } else {
        RemoteError::RequestFailed(error)
    }
}

/// Builds the headers the upstream API requires on every request
fn build_headers(config: &ApiConfig, token: Option<&str>) -> Result<HeaderMap, RemoteError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_str(&config.accept)?);
    headers.insert(USER_AGENT, HeaderValue::from_str(&config.user_agent)?);

    if let Some(token) = token {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Ok(headers)
}
