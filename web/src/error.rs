//! Server-level errors.
//!
//! Handler failures never get this far: the effect algebra already turned
//! them into error pages. What remains is transport trouble (an unreadable
//! or oversized body) and startup failures.

use axum::response::{Html, IntoResponse, Response};
use http::StatusCode;
use reel_core::{HandlerError, html};
use reel_runtime::RuntimeError;
use thiserror::Error;

/// Errors raised while serving.
#[derive(Error, Debug)]
pub enum ServeError {
    /// Driving a request failed before a reply was produced.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// The listening socket could not be bound.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        /// Requested address.
        address: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The server stopped with an I/O error.
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServeError {
    /// Status code the client sees.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Runtime(RuntimeError::BodyTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Runtime(RuntimeError::BodyRead(_)) => StatusCode::BAD_REQUEST,
            Self::Bind { .. } | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = self.status();
        let public = match status {
            StatusCode::PAYLOAD_TOO_LARGE => "The request was too large.",
            StatusCode::BAD_REQUEST => "The request could not be read.",
            _ => reel_core::error::SOMETHING_WENT_WRONG,
        };
        tracing::warn!(status = status.as_u16(), error = %self, "Request not served");
        let page = html::error_page(&HandlerError::new(status, public, self.to_string()));
        (status, Html(page)).into_response()
    }
}
