//! CSRF-protected POST handling.
//!
//! Every user has a stable random token stored with their record. Forms embed
//! it as a hidden `csrf` field. A POST is only handed to the handler when the
//! submitted token equals the session's token; anything else (no session, a
//! body that is not form-encoded, a missing or wrong token) takes the
//! `or_else` branch, which usually renders the form as if for a GET.

use crate::interpreter::ReadBody;
use crate::session::HasSession;
use bytes::Bytes;
use constant_time_eq::constant_time_eq;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::collections::HashMap;
use std::fmt;

/// Name of the hidden form field carrying the token.
pub const CSRF_FIELD: &str = "csrf";

const TOKEN_LENGTH: usize = 32;

/// Parsed form-url-encoded body.
pub type FormData = HashMap<String, String>;

/// A per-user CSRF token.
#[derive(Clone)]
pub struct CsrfToken(String);

impl CsrfToken {
    /// Wrap a stored token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Generate a fresh random token for a new user.
    #[must_use]
    pub fn generate() -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect();
        Self(token)
    }

    /// The token text, for embedding in forms and storing.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a submitted value.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        constant_time_eq(self.0.as_bytes(), candidate.as_bytes())
    }
}

impl PartialEq for CsrfToken {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl Eq for CsrfToken {}

impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CsrfToken(<redacted>)")
    }
}

/// Sessions that carry a CSRF token.
pub trait CsrfSession {
    /// The session user's token.
    fn csrf_token(&self) -> &CsrfToken;
}

/// Parse a form-url-encoded body. `None` for an empty or malformed body.
#[must_use]
pub fn parse_form(body: &Bytes) -> Option<FormData> {
    if body.is_empty() {
        return None;
    }
    serde_urlencoded::from_bytes(body).ok()
}

/// Why a POST was not verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Body empty or not form-encoded (typically a GET).
    NoForm,
    /// No session to compare against.
    NoSession,
    /// Form has no `csrf` field.
    MissingToken,
    /// Token does not match the session's.
    Mismatch,
}

/// Check a parsed form against the session's token.
///
/// # Errors
///
/// The [`Rejection`] reason when the form is not verified.
pub fn verify<S: CsrfSession>(
    session: Option<&S>,
    form: Option<FormData>,
) -> Result<FormData, Rejection> {
    let form = form.ok_or(Rejection::NoForm)?;
    let session = session.ok_or(Rejection::NoSession)?;
    let submitted = form.get(CSRF_FIELD).ok_or(Rejection::MissingToken)?;
    if session.csrf_token().matches(submitted) {
        Ok(form)
    } else {
        Err(Rejection::Mismatch)
    }
}

/// Read the body and verify its CSRF token.
pub trait VerifiedPost: ReadBody {
    /// `then` receives the verified form, `or_else` runs for anything else.
    fn verified_post<F, G>(then: F, or_else: G) -> Self
    where
        F: FnOnce(FormData) -> Self::AfterBody + Send + 'static,
        G: FnOnce() -> Self::AfterBody + Send + 'static;
}

impl<I> VerifiedPost for I
where
    I: ReadBody,
    I::AfterBody: HasSession,
    <I::AfterBody as HasSession>::Session: CsrfSession,
{
    fn verified_post<F, G>(then: F, or_else: G) -> Self
    where
        F: FnOnce(FormData) -> Self::AfterBody + Send + 'static,
        G: FnOnce() -> Self::AfterBody + Send + 'static,
    {
        Self::read_body(move |body| {
            <I::AfterBody as HasSession>::with_session(move |session| {
                match verify(session.as_ref(), parse_form(&body)) {
                    Ok(form) => then(form),
                    Err(Rejection::NoForm) => or_else(),
                    Err(reason) => {
                        tracing::warn!(?reason, "Rejected unverified POST");
                        or_else()
                    },
                }
            })
        })
    }
}
