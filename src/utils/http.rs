//! HTTP client utilities.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::sources::SourceError;

/// Shared HTTP client with sensible defaults
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, SourceError> {
        Self::with_user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
    }

    /// Create a new HTTP client with a custom user agent.
    ///
    /// No overall request timeout is set; callers bound each request with the
    /// configured per-source deadline.
    pub fn with_user_agent(user_agent: &str) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::ProviderUnavailable(format!("HTTP client setup: {e}")))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Send a request and turn non-success statuses into source errors
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, SourceError> {
        let response = request.send().await?;
        check_status(response)
    }

    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, SourceError> {
        let body = self.send(request).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn fetch_text(&self, request: RequestBuilder) -> Result<String, SourceError> {
        Ok(self.send(request).await?.text().await?)
    }

    pub async fn fetch_bytes(&self, request: RequestBuilder) -> Result<Vec<u8>, SourceError> {
        Ok(self.send(request).await?.bytes().await?.to_vec())
    }
}

/// Map HTTP status codes onto the source error taxonomy
pub fn check_status(response: Response) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => {
            SourceError::ProviderRateLimited(format!("HTTP 429 from {url}"))
        }
        StatusCode::NOT_FOUND => SourceError::NotFound(url),
        s if s.is_server_error() => SourceError::ProviderUnavailable(format!("HTTP {s} from {url}")),
        s => SourceError::InvalidRequest(format!("HTTP {s} from {url}")),
    })
}
