//! The live interpreter.
//!
//! [`Live`] is the description a handler produces when built for the real
//! server. It is a small tree: either a finished response, a suspension on a
//! future, or a request to read the body. [`run`] walks that tree on the
//! current tokio task. Suspensions are awaited, never blocked on.
//!
//! Reading the body yields a [`LiveResponse`], which has no body-reading
//! variant, so the body stream is consumed at most once.

use crate::error::RuntimeError;
use bytes::Bytes;
use futures::future::BoxFuture;
use http::{HeaderMap, StatusCode};
use reel_core::{Promise, ReadBody, Respond};
use std::fmt;
use std::future::Future;

/// A finished response, ready for the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A body with status and headers.
    Write {
        /// Response body.
        body: Bytes,
        /// Status code.
        status: StatusCode,
        /// Extra headers, including content type.
        headers: HeaderMap,
    },
    /// `303 See Other` to `path`.
    Redirect {
        /// Target path or URL.
        path: String,
        /// Extra headers (cookies).
        headers: HeaderMap,
    },
    /// Stream a static resource.
    File {
        /// Path relative to the resource root.
        path: String,
        /// Cache max-age in seconds, if cacheable.
        max_age: Option<u32>,
    },
}

impl Reply {
    /// Outcome label used in metrics and logs.
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Write { status, .. } if status.is_server_error() => "error",
            Self::Write { status, .. } if status.is_client_error() => "rejected",
            Self::Write { .. } => "write",
            Self::Redirect { .. } => "redirect",
            Self::File { .. } => "file",
        }
    }
}

/// Response description after the body has been read.
pub enum LiveResponse {
    /// Done.
    Reply(Reply),
    /// Waiting for an asynchronous value.
    Await(BoxFuture<'static, LiveResponse>),
}

impl LiveResponse {
    /// Drive suspensions until a reply is available.
    pub async fn finish(self) -> Reply {
        let mut current = self;
        loop {
            match current {
                Self::Reply(reply) => return reply,
                Self::Await(next) => current = next.await,
            }
        }
    }
}

impl fmt::Debug for LiveResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reply(reply) => f.debug_tuple("LiveResponse::Reply").field(reply).finish(),
            Self::Await(_) => write!(f, "LiveResponse::Await(<future>)"),
        }
    }
}

impl Respond for LiveResponse {
    fn write(body: Bytes, status: StatusCode, headers: HeaderMap) -> Self {
        Self::Reply(Reply::Write {
            body,
            status,
            headers,
        })
    }

    fn redirect(path: &str, headers: HeaderMap) -> Self {
        Self::Reply(Reply::Redirect {
            path: path.to_owned(),
            headers,
        })
    }

    fn write_file(path: &str, max_age: Option<u32>) -> Self {
        Self::Reply(Reply::File {
            path: path.to_owned(),
            max_age,
        })
    }

    fn on_complete<A, F>(promise: Promise<A>, then: F) -> Self
    where
        A: Send + 'static,
        F: FnOnce(A) -> Self + Send + 'static,
    {
        Self::Await(Box::pin(async move { then(promise.await) }))
    }
}

/// Response description for a request whose body is still unread.
pub enum Live {
    /// No body needed.
    Respond(LiveResponse),
    /// Waiting for an asynchronous value.
    Await(BoxFuture<'static, Live>),
    /// Read the body, then continue.
    ReadBody(Box<dyn FnOnce(Bytes) -> LiveResponse + Send>),
}

impl fmt::Debug for Live {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Respond(response) => f.debug_tuple("Live::Respond").field(response).finish(),
            Self::Await(_) => write!(f, "Live::Await(<future>)"),
            Self::ReadBody(_) => write!(f, "Live::ReadBody(<continuation>)"),
        }
    }
}

impl Respond for Live {
    fn write(body: Bytes, status: StatusCode, headers: HeaderMap) -> Self {
        Self::Respond(LiveResponse::write(body, status, headers))
    }

    fn redirect(path: &str, headers: HeaderMap) -> Self {
        Self::Respond(LiveResponse::redirect(path, headers))
    }

    fn write_file(path: &str, max_age: Option<u32>) -> Self {
        Self::Respond(LiveResponse::write_file(path, max_age))
    }

    fn on_complete<A, F>(promise: Promise<A>, then: F) -> Self
    where
        A: Send + 'static,
        F: FnOnce(A) -> Self + Send + 'static,
    {
        Self::Await(Box::pin(async move { then(promise.await) }))
    }
}

impl ReadBody for Live {
    type AfterBody = LiveResponse;

    fn read_body<F>(then: F) -> Self
    where
        F: FnOnce(Bytes) -> LiveResponse + Send + 'static,
    {
        Self::ReadBody(Box::new(then))
    }
}

/// Source of a request body, consumed at most once.
pub trait BodySource: Send {
    /// Collect the whole body.
    fn read_to_end(self) -> impl Future<Output = Result<Bytes, RuntimeError>> + Send;
}

impl BodySource for Bytes {
    async fn read_to_end(self) -> Result<Bytes, RuntimeError> {
        Ok(self)
    }
}

/// Execute a live description to completion.
///
/// # Errors
///
/// [`RuntimeError`] only when the body cannot be read. Every other failure
/// has already been turned into an error page by the handler.
pub async fn run<B: BodySource>(live: Live, body: B) -> Result<Reply, RuntimeError> {
    let mut current = live;
    loop {
        match current {
            Live::Respond(response) => return Ok(response.finish().await),
            Live::Await(next) => current = next.await,
            Live::ReadBody(then) => {
                let body = body.read_to_end().await?;
                tracing::trace!(bytes = body.len(), "Request body read");
                return Ok(then(body).finish().await);
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_write_completes_without_body() {
        let live = Live::write_text("hello", StatusCode::OK);
        let reply = run(live, Bytes::new()).await.unwrap();
        assert!(matches!(reply, Reply::Write { status: StatusCode::OK, .. }));
    }

    #[tokio::test]
    async fn test_suspension_resumes_with_value() {
        let (sender, receiver) = oneshot::channel();
        let promise = Promise::from_future(async move { receiver.await.unwrap_or(0) });
        let live = Live::on_complete(promise, |value: u32| {
            Live::redirect(&format!("/episodes/{value}"), HeaderMap::new())
        });

        let handle = tokio::spawn(run(live, Bytes::new()));
        sender.send(7).unwrap();
        let reply = handle.await.unwrap().unwrap();
        assert_eq!(
            reply,
            Reply::Redirect {
                path: "/episodes/7".into(),
                headers: HeaderMap::new()
            }
        );
    }

    #[tokio::test]
    async fn test_body_is_read_after_suspension() {
        let live = Live::on_complete(Promise::ready(()), |()| {
            Live::read_body(|body| {
                LiveResponse::on_complete(Promise::ready(body), |body| {
                    LiveResponse::write(body, StatusCode::OK, HeaderMap::new())
                })
            })
        });
        let reply = run(live, Bytes::from_static(b"a=1")).await.unwrap();
        match reply {
            Reply::Write { body, .. } => assert_eq!(&body[..], b"a=1"),
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn test_outcome_labels() {
        let error = Reply::Write {
            body: Bytes::new(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            headers: HeaderMap::new(),
        };
        assert_eq!(error.outcome(), "error");
        let file = Reply::File {
            path: "app.css".into(),
            max_age: None,
        };
        assert_eq!(file.outcome(), "file");
    }
}
