//! Small synchronous interpreter and environment for this crate's unit tests.

#![allow(clippy::expect_used, clippy::panic)]

use crate::context::ProvidesContext;
use crate::csrf::{CsrfSession, CsrfToken};
use crate::database::ProvidesDatabase;
use crate::interpreter::{ReadBody, Respond};
use crate::promise::Promise;
use crate::query::{Query, QueryError, QueryResult};
use crate::session::ProvidesSession;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub enum Recorded {
    Write {
        body: Bytes,
        status: StatusCode,
        headers: HeaderMap,
    },
    Redirect {
        path: String,
    },
    File {
        path: String,
        max_age: Option<u32>,
    },
}

impl Recorded {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Write { status, .. } => *status,
            Self::Redirect { .. } => StatusCode::SEE_OTHER,
            Self::File { .. } => StatusCode::OK,
        }
    }

    pub fn body(&self) -> String {
        match self {
            Self::Write { body, .. } => String::from_utf8_lossy(body).into_owned(),
            _ => String::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<String> {
        match self {
            Self::Write { headers, .. } => headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
            _ => None,
        }
    }
}

impl Respond for Recorded {
    fn write(body: Bytes, status: StatusCode, headers: HeaderMap) -> Self {
        Self::Write {
            body,
            status,
            headers,
        }
    }

    fn redirect(path: &str, _headers: HeaderMap) -> Self {
        Self::Redirect {
            path: path.to_owned(),
        }
    }

    fn write_file(path: &str, max_age: Option<u32>) -> Self {
        Self::File {
            path: path.to_owned(),
            max_age,
        }
    }

    fn on_complete<A, F>(promise: Promise<A>, then: F) -> Self
    where
        A: Send + 'static,
        F: FnOnce(A) -> Self + Send + 'static,
    {
        then(promise.now_or_never().expect("promise pending in unit test"))
    }
}

pub enum Request {
    Respond(Recorded),
    ReadBody(Box<dyn FnOnce(Bytes) -> Recorded + Send>),
}

impl Request {
    pub fn get(self) -> Recorded {
        match self {
            Self::Respond(response) => response,
            Self::ReadBody(then) => then(Bytes::new()),
        }
    }

    pub fn post(self, body: &str) -> Recorded {
        match self {
            Self::Respond(response) => response,
            Self::ReadBody(then) => then(Bytes::copy_from_slice(body.as_bytes())),
        }
    }
}

impl Respond for Request {
    fn write(body: Bytes, status: StatusCode, headers: HeaderMap) -> Self {
        Self::Respond(Recorded::write(body, status, headers))
    }

    fn redirect(path: &str, headers: HeaderMap) -> Self {
        Self::Respond(Recorded::redirect(path, headers))
    }

    fn write_file(path: &str, max_age: Option<u32>) -> Self {
        Self::Respond(Recorded::write_file(path, max_age))
    }

    fn on_complete<A, F>(promise: Promise<A>, then: F) -> Self
    where
        A: Send + 'static,
        F: FnOnce(A) -> Self + Send + 'static,
    {
        then(promise.now_or_never().expect("promise pending in unit test"))
    }
}

impl ReadBody for Request {
    type AfterBody = Recorded;

    fn read_body<F>(then: F) -> Self
    where
        F: FnOnce(Bytes) -> Recorded + Send + 'static,
    {
        Self::ReadBody(Box::new(then))
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub name: String,
    pub csrf: CsrfToken,
}

impl CsrfSession for User {
    fn csrf_token(&self) -> &CsrfToken {
        &self.csrf
    }
}

/// Environment with an optional user, canned raw query results and a context
/// string.
#[derive(Clone, Default)]
pub struct Env {
    pub user: Option<User>,
    pub results: Arc<Mutex<VecDeque<(String, QueryResult)>>>,
    pub context: Arc<String>,
}

impl Env {
    pub fn with_user(name: &str, csrf: &str) -> Self {
        Self {
            user: Some(User {
                name: name.to_owned(),
                csrf: CsrfToken::new(csrf),
            }),
            ..Self::default()
        }
    }

    pub fn expect(&self, statement: &str, result: QueryResult) {
        self.results
            .lock()
            .expect("lock")
            .push_back((statement.to_owned(), result));
    }
}

impl ProvidesSession for Env {
    type Session = User;

    fn session(&self) -> Promise<Option<User>> {
        Promise::ready(self.user.clone())
    }
}

impl ProvidesDatabase for Env {
    fn execute<A: Send + 'static>(&self, query: Query<A>) -> Promise<Result<A, QueryError>> {
        let (statement, result) = self
            .results
            .lock()
            .expect("lock")
            .pop_front()
            .expect("unexpected query");
        assert_eq!(statement, query.statement());
        Promise::ready(query.parse(result))
    }
}

impl ProvidesContext for Env {
    type Context = String;

    fn context(&self) -> Arc<String> {
        Arc::clone(&self.context)
    }
}
