//! Handler-level errors.
//!
//! A [`HandlerError`] is a recoverable failure raised by route logic: a missing
//! coupon, a billing rejection, an unknown episode. It carries two messages.
//! The private one goes to the log, the public one to the user. Interpreters
//! turn it into an error page through [`Respond::write_error`].
//!
//! [`Respond::write_error`]: crate::Respond::write_error

use crate::query::QueryError;
use http::StatusCode;
use thiserror::Error;

/// Public message used whenever an integration fails without a better
/// explanation for the user.
pub const SOMETHING_WENT_WRONG: &str = "Something went wrong.";

/// A recoverable error raised by handler logic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{status}: {private_message}")]
pub struct HandlerError {
    /// Response status written for this error.
    pub status: StatusCode,
    /// Message shown to the user.
    pub public_message: String,
    /// Message written to the log only.
    pub private_message: String,
}

impl HandlerError {
    /// Create an error with explicit status and messages.
    pub fn new(
        status: StatusCode,
        public_message: impl Into<String>,
        private_message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            public_message: public_message.into(),
            private_message: private_message.into(),
        }
    }

    /// No session where one is required.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "Not authorized",
            "no session for a route that requires one",
        )
    }

    /// Session present but lacking the role the route needs.
    pub fn forbidden(private_message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "Not authorized", private_message)
    }

    /// Missing resource.
    pub fn not_found(private_message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "Page not found", private_message)
    }

    /// The request itself was malformed.
    pub fn bad_request(
        public_message: impl Into<String>,
        private_message: impl Into<String>,
    ) -> Self {
        Self::new(StatusCode::BAD_REQUEST, public_message, private_message)
    }

    /// Domain rejection the user can act on (bad coupon, unknown plan).
    pub fn domain(public_message: impl Into<String>, private_message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, public_message, private_message)
    }

    /// Generic failure: third-party integration or database trouble.
    pub fn internal(private_message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            SOMETHING_WENT_WRONG,
            private_message,
        )
    }
}

impl From<QueryError> for HandlerError {
    fn from(error: QueryError) -> Self {
        match error {
            QueryError::NotFound => Self::not_found("query returned no row"),
            other => Self::internal(format!("database error: {other}")),
        }
    }
}
