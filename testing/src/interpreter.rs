//! The synchronous test interpreter.
//!
//! Every operation becomes plain data. Suspensions resolve immediately,
//! because the test environment and collaborator fakes only hand out ready
//! promises; a promise that is still pending is a test bug and panics.

// A pending promise or a failed assertion is a test failure.
#![allow(clippy::panic)]

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, LOCATION, SET_COOKIE};
use http::{HeaderMap, StatusCode};
use reel_core::{Promise, ReadBody, Respond};
use std::fmt;

/// A finished response as seen by a test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestResponse {
    /// A body write.
    Write {
        /// Body bytes.
        body: Bytes,
        /// Status code.
        status: StatusCode,
        /// Headers.
        headers: HeaderMap,
    },
    /// A `303` redirect.
    Redirect {
        /// Target.
        path: String,
        /// Headers (cookies).
        headers: HeaderMap,
    },
    /// A static file.
    WriteFile {
        /// Path.
        path: String,
        /// Cache max-age.
        max_age: Option<u32>,
    },
}

impl TestResponse {
    /// Status the HTTP layer would send.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Write { status, .. } => *status,
            Self::Redirect { .. } => StatusCode::SEE_OTHER,
            Self::WriteFile { .. } => StatusCode::OK,
        }
    }

    /// Body as text; empty for redirects and files.
    #[must_use]
    pub fn body_text(&self) -> String {
        match self {
            Self::Write { body, .. } => String::from_utf8_lossy(body).into_owned(),
            _ => String::new(),
        }
    }

    /// A header value, if present and textual.
    #[must_use]
    pub fn header(&self, name: &HeaderName) -> Option<String> {
        let headers = match self {
            Self::Write { headers, .. } | Self::Redirect { headers, .. } => headers,
            Self::WriteFile { .. } => return None,
        };
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    }

    /// Redirect target, or the `Location` header of a write.
    #[must_use]
    pub fn location(&self) -> Option<String> {
        match self {
            Self::Redirect { path, .. } => Some(path.clone()),
            _ => self.header(&LOCATION),
        }
    }

    /// The `Set-Cookie` header, if any.
    #[must_use]
    pub fn cookie(&self) -> Option<String> {
        self.header(&SET_COOKIE)
    }

    /// Whether the body contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.body_text().contains(needle)
    }

    /// Every `href="..."` target in the body, unescaped.
    #[must_use]
    pub fn links(&self) -> Vec<String> {
        let body = self.body_text();
        let mut links = Vec::new();
        let mut rest = body.as_str();
        while let Some(start) = rest.find("href=\"") {
            rest = &rest[start + 6..];
            let Some(end) = rest.find('"') else {
                break;
            };
            links.push(unescape(&rest[..end]));
            rest = &rest[end..];
        }
        links
    }

    /// The first link starting with `prefix`.
    #[must_use]
    pub fn link_starting_with(&self, prefix: &str) -> Option<String> {
        self.links().into_iter().find(|link| link.starts_with(prefix))
    }

    /// Panic unless this is a redirect to `path`.
    pub fn assert_redirect(&self, path: &str) {
        match self {
            Self::Redirect { path: actual, .. } if actual == path => {},
            other => panic!("expected redirect to {path}, got {}", other.describe()),
        }
    }

    /// Panic unless the status is `status`.
    pub fn assert_status(&self, status: StatusCode) {
        assert_eq!(
            self.status(),
            status,
            "unexpected status for {}",
            self.describe()
        );
    }

    /// Panic unless this is an HTML page containing `needle`.
    pub fn assert_html_contains(&self, needle: &str) {
        let is_html = self
            .header(&CONTENT_TYPE)
            .is_some_and(|value| value.starts_with("text/html"));
        assert!(is_html, "expected HTML, got {}", self.describe());
        assert!(
            self.contains(needle),
            "expected body to contain {needle:?}, got {}",
            self.describe()
        );
    }

    fn describe(&self) -> String {
        match self {
            Self::Write { status, .. } => format!("{status} write: {}", self.body_text()),
            Self::Redirect { path, .. } => format!("redirect to {path}"),
            Self::WriteFile { path, .. } => format!("file {path}"),
        }
    }
}

fn unescape(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

fn resolve<A>(promise: Promise<A>) -> A
where
    A: Send + 'static,
{
    match promise.now_or_never() {
        Some(value) => value,
        None => panic!("promise did not resolve synchronously; test collaborators must return ready promises"),
    }
}

impl Respond for TestResponse {
    fn write(body: Bytes, status: StatusCode, headers: HeaderMap) -> Self {
        Self::Write {
            body,
            status,
            headers,
        }
    }

    fn redirect(path: &str, headers: HeaderMap) -> Self {
        Self::Redirect {
            path: path.to_owned(),
            headers,
        }
    }

    fn write_file(path: &str, max_age: Option<u32>) -> Self {
        Self::WriteFile {
            path: path.to_owned(),
            max_age,
        }
    }

    fn on_complete<A, F>(promise: Promise<A>, then: F) -> Self
    where
        A: Send + 'static,
        F: FnOnce(A) -> Self + Send + 'static,
    {
        then(resolve(promise))
    }
}

/// A request that may still want its body.
pub enum TestInterpreter {
    /// Finished without reading the body.
    Respond(TestResponse),
    /// Waiting for the body.
    ReadBody(Box<dyn FnOnce(Bytes) -> TestResponse + Send>),
}

impl TestInterpreter {
    /// Deliver an empty body, as for a GET.
    #[must_use]
    pub fn get(self) -> TestResponse {
        self.post(Bytes::new())
    }

    /// Deliver `body`.
    #[must_use]
    pub fn post(self, body: impl Into<Bytes>) -> TestResponse {
        match self {
            Self::Respond(response) => response,
            Self::ReadBody(then) => then(body.into()),
        }
    }

    /// Deliver a form-url-encoded body built from `fields`.
    #[must_use]
    pub fn post_form<'a, I>(self, fields: I) -> TestResponse
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let pairs: Vec<(&str, &str)> = fields.into_iter().collect();
        let body = serde_urlencoded::to_string(&pairs).unwrap_or_default();
        self.post(body)
    }

    /// Whether the handler asked for the body.
    #[must_use]
    pub const fn reads_body(&self) -> bool {
        matches!(self, Self::ReadBody(_))
    }
}

impl fmt::Debug for TestInterpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Respond(response) => f.debug_tuple("TestInterpreter::Respond").field(response).finish(),
            Self::ReadBody(_) => write!(f, "TestInterpreter::ReadBody(<continuation>)"),
        }
    }
}

impl Respond for TestInterpreter {
    fn write(body: Bytes, status: StatusCode, headers: HeaderMap) -> Self {
        Self::Respond(TestResponse::write(body, status, headers))
    }

    fn redirect(path: &str, headers: HeaderMap) -> Self {
        Self::Respond(TestResponse::redirect(path, headers))
    }

    fn write_file(path: &str, max_age: Option<u32>) -> Self {
        Self::Respond(TestResponse::write_file(path, max_age))
    }

    fn on_complete<A, F>(promise: Promise<A>, then: F) -> Self
    where
        A: Send + 'static,
        F: FnOnce(A) -> Self + Send + 'static,
    {
        then(resolve(promise))
    }
}

impl ReadBody for TestInterpreter {
    type AfterBody = TestResponse;

    fn read_body<F>(then: F) -> Self
    where
        F: FnOnce(Bytes) -> TestResponse + Send + 'static,
    {
        Self::ReadBody(Box::new(then))
    }
}
