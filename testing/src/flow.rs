//! Multi-step journeys through a site, in memory.
//!
//! A [`Flow`] wraps a request function (usually: parse the path into a
//! route, run the handler against a shared [`TestEnvironment`], feed the
//! body) and remembers the last response so a test can click a link, submit
//! a form or follow a redirect from it.
//!
//! [`TestEnvironment`]: crate::TestEnvironment

// A missing link or redirect is a test failure.
#![allow(clippy::panic)]

use crate::interpreter::TestResponse;
use bytes::Bytes;
use std::fmt;

/// One simulated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRequest {
    /// Path and query string.
    pub uri: String,
    /// Form body for a POST, `None` for a GET.
    pub body: Option<Bytes>,
}

/// A user journey.
pub struct Flow<F> {
    request: F,
    current: TestResponse,
    visited: Vec<String>,
}

impl<F> Flow<F>
where
    F: FnMut(FlowRequest) -> TestResponse,
{
    /// Start by requesting `uri`.
    pub fn start(mut request: F, uri: &str) -> Self {
        let current = request(FlowRequest {
            uri: uri.to_owned(),
            body: None,
        });
        Self {
            request,
            current,
            visited: vec![uri.to_owned()],
        }
    }

    /// The most recent response.
    #[must_use]
    pub const fn current(&self) -> &TestResponse {
        &self.current
    }

    /// Every URI requested so far.
    #[must_use]
    pub fn visited(&self) -> &[String] {
        &self.visited
    }

    /// GET `uri`.
    #[must_use]
    pub fn visit(mut self, uri: &str) -> Self {
        self.current = self.send(uri, None);
        self
    }

    /// GET the first link on the current page that starts with `prefix`.
    ///
    /// # Panics
    ///
    /// If no such link exists.
    #[must_use]
    pub fn click(self, prefix: &str) -> Self {
        let Some(link) = self.current.link_starting_with(prefix) else {
            panic!(
                "no link starting with {prefix:?} among {:?}",
                self.current.links()
            );
        };
        self.visit(&link)
    }

    /// GET the current redirect target.
    ///
    /// # Panics
    ///
    /// If the current response is not a redirect.
    #[must_use]
    pub fn follow_redirect(self) -> Self {
        let Some(location) = self.current.location() else {
            panic!("expected a redirect, got status {}", self.current.status());
        };
        self.visit(&location)
    }

    /// POST `fields` form-encoded to `uri`.
    #[must_use]
    pub fn submit(mut self, uri: &str, fields: &[(&str, &str)]) -> Self {
        let body = serde_urlencoded::to_string(fields).unwrap_or_default();
        self.current = self.send(uri, Some(Bytes::from(body)));
        self
    }

    fn send(&mut self, uri: &str, body: Option<Bytes>) -> TestResponse {
        self.visited.push(uri.to_owned());
        (self.request)(FlowRequest {
            uri: uri.to_owned(),
            body,
        })
    }
}

impl<F> fmt::Debug for Flow<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("current", &self.current)
            .field("visited", &self.visited)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, StatusCode};
    use reel_core::Respond;

    fn site(request: FlowRequest) -> TestResponse {
        match (request.uri.as_str(), request.body) {
            ("/", None) => TestResponse::write_html("<a href=\"/form\">Form</a>", StatusCode::OK),
            ("/form", None) => TestResponse::write_html("<form></form>", StatusCode::OK),
            ("/form", Some(body)) if body == "name=Ada" => {
                TestResponse::redirect("/done", HeaderMap::new())
            },
            ("/done", None) => TestResponse::write_text("done", StatusCode::OK),
            _ => TestResponse::write_text("not found", StatusCode::NOT_FOUND),
        }
    }

    #[test]
    fn test_click_submit_follow() {
        let flow = Flow::start(site, "/")
            .click("/form")
            .submit("/form", &[("name", "Ada")])
            .follow_redirect();

        assert_eq!(flow.current().body_text(), "done");
        assert_eq!(flow.visited(), ["/", "/form", "/form", "/done"]);
    }

    #[test]
    #[should_panic(expected = "no link")]
    fn test_missing_link_panics() {
        let _ = Flow::start(site, "/").click("/missing");
    }
}
