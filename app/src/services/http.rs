//! JSON over HTTP for the live collaborators.

use reel_core::Promise;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors from a remote call. They are logged, never shown to users.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// API returned an error status
    #[error("API error (status {status}): {body}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Response parsing failed
    #[error("Response parsing failed: {message} in {body}")]
    ResponseParseFailed {
        /// Parser error
        message: String,
        /// Response body
        body: String,
    },
}

/// A shared HTTP client whose calls resolve to `None` on any failure.
#[derive(Debug, Clone, Default)]
pub struct RemoteEndpoint {
    client: Client,
}

impl RemoteEndpoint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Send `request` and decode a JSON response.
    pub fn load<T>(&self, description: impl Into<String>, request: RequestBuilder) -> Promise<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let description = description.into();
        Promise::from_future(async move { logged(&description, fetch(request).await) })
    }

    /// Send `request`, ignoring any response body.
    pub fn send(&self, description: impl Into<String>, request: RequestBuilder) -> Promise<Option<()>> {
        let description = description.into();
        Promise::from_future(async move {
            logged(&description, body(request).await.map(|_| ()))
        })
    }
}

fn logged<T>(description: &str, result: Result<T, RemoteError>) -> Option<T> {
    match result {
        Ok(value) => {
            tracing::debug!(request = description, "Remote call succeeded");
            Some(value)
        },
        Err(error) => {
            tracing::error!(request = description, %error, "Remote call failed");
            None
        },
    }
}

async fn body(request: RequestBuilder) -> Result<String, RemoteError> {
    let response = request
        .send()
        .await
        .map_err(|e| RemoteError::RequestFailed(e.to_string()))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| RemoteError::RequestFailed(e.to_string()))?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(RemoteError::ApiError {
            status: status.as_u16(),
            body,
        })
    }
}

async fn fetch<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, RemoteError> {
    let body = body(request).await?;
    serde_json::from_str(&body).map_err(|e| RemoteError::ResponseParseFailed {
        message: e.to_string(),
        body,
    })
}
