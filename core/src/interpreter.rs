//! The effect algebra.
//!
//! A type implementing [`Respond`] is a *description* of how a request ends.
//! Handlers are written generically over such types; the concrete type decides
//! what a write or a redirect actually does.
//!
//! # Terminal operations
//!
//! [`Respond::write`], [`Respond::redirect`] and [`Respond::write_file`] end
//! the computation. Nothing chained after them runs because there is nothing
//! to chain: they take no continuation.
//!
//! # Suspension
//!
//! [`Respond::on_complete`] waits for a [`Promise`] and resumes with its value.
//! The continuation is `FnOnce`, so it resumes exactly once.
//!
//! # Reading the body
//!
//! [`ReadBody::read_body`] hands the POST body to a continuation whose type is
//! [`ReadBody::AfterBody`]. That type implements only [`Respond`], so a second
//! read does not type-check.

use crate::error::{HandlerError, SOMETHING_WENT_WRONG};
use crate::html;
use crate::promise::Promise;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{HeaderMap, StatusCode};

/// Base operations every interpreter supports.
pub trait Respond: Sized + Send + 'static {
    /// Write a response body. Terminal.
    fn write(body: Bytes, status: StatusCode, headers: HeaderMap) -> Self;

    /// Redirect with `303 See Other`, so a POST is followed by a GET. Terminal.
    fn redirect(path: &str, headers: HeaderMap) -> Self;

    /// Stream a static file; the content type follows the file extension.
    /// Terminal.
    fn write_file(path: &str, max_age: Option<u32>) -> Self;

    /// Suspend until `promise` resolves, then continue with its value.
    fn on_complete<A, F>(promise: Promise<A>, then: F) -> Self
    where
        A: Send + 'static,
        F: FnOnce(A) -> Self + Send + 'static;

    /// Write an HTML page.
    fn write_html(html: impl Into<String>, status: StatusCode) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        Self::write(Bytes::from(html.into()), status, headers)
    }

    /// Write a plain-text body.
    fn write_text(text: impl Into<String>, status: StatusCode) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        Self::write(Bytes::from(text.into()), status, headers)
    }

    /// Log the private message and write the public one as an error page.
    fn write_error(error: HandlerError) -> Self {
        if error.status.is_server_error() {
            tracing::error!(
                status = error.status.as_u16(),
                private_message = %error.private_message,
                "Request failed"
            );
        } else {
            tracing::warn!(
                status = error.status.as_u16(),
                private_message = %error.private_message,
                "Request rejected"
            );
        }
        Self::write_html(html::error_page(&error), error.status)
    }

    /// Run fallible handler logic, turning any error into an error page.
    fn attempt<F>(handler: F) -> Self
    where
        F: FnOnce() -> Result<Self, HandlerError>,
    {
        handler().unwrap_or_else(Self::write_error)
    }

    /// Wait for an integration promise. An absent value is logged with
    /// `message` and answered with a generic 500.
    fn on_success<A, F>(promise: Promise<Option<A>>, message: impl Into<String>, then: F) -> Self
    where
        A: Send + 'static,
        F: FnOnce(A) -> Self + Send + 'static,
    {
        let message = message.into();
        Self::on_complete(promise, move |value| match value {
            Some(value) => then(value),
            None => Self::write_error(HandlerError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                SOMETHING_WENT_WRONG,
                message,
            )),
        })
    }
}

/// Interpreters that can read the request body, once.
pub trait ReadBody: Respond {
    /// What the computation becomes after the body has been consumed.
    type AfterBody: Respond;

    /// Read the whole body and continue with it.
    fn read_body<F>(then: F) -> Self
    where
        F: FnOnce(Bytes) -> Self::AfterBody + Send + 'static;
}
