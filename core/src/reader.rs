//! Environment-reader transformer.
//!
//! `Reader<E, I>` turns any interpreter `I` into one whose operations wait for
//! a per-request environment `E`. A handler is built once, as a `Reader`, and
//! only when the server (or a test) calls [`Reader::run`] with a concrete
//! environment does it become an `I`.
//!
//! Operations whose payload does not depend on the environment are lifted
//! with [`Reader::constant`]. Operations that need something from the
//! environment (a session, a connection) read it and feed it forward, see
//! [`Reader::ask`].

use crate::interpreter::{ReadBody, Respond};
use crate::promise::Promise;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::fmt;

/// An interpreter `I` deferred until an environment `E` is supplied.
#[must_use = "a reader does nothing until run with an environment"]
pub struct Reader<E, I> {
    run: Box<dyn FnOnce(E) -> I + Send>,
}

impl<E: 'static, I: 'static> Reader<E, I> {
    /// Defer construction of `I` until the environment is known.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(E) -> I + Send + 'static,
    {
        Self { run: Box::new(f) }
    }

    /// Ignore the environment and produce `value`.
    pub fn constant(value: I) -> Self
    where
        I: Send,
    {
        Self::new(move |_| value)
    }

    /// Read something from the environment and continue with it. The
    /// environment is passed on unchanged to the continuation.
    pub fn ask<A, G, F>(get: G, then: F) -> Self
    where
        G: FnOnce(&E) -> A + Send + 'static,
        F: FnOnce(A) -> Self + Send + 'static,
    {
        Self::new(move |env| {
            let value = get(&env);
            then(value).run(env)
        })
    }

    /// Supply the environment.
    pub fn run(self, env: E) -> I {
        (self.run)(env)
    }
}

impl<E, I> fmt::Debug for Reader<E, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Reader(<deferred>)")
    }
}

impl<E, I> Respond for Reader<E, I>
where
    E: Send + 'static,
    I: Respond,
{
    fn write(body: Bytes, status: StatusCode, headers: HeaderMap) -> Self {
        Self::constant(I::write(body, status, headers))
    }

    fn redirect(path: &str, headers: HeaderMap) -> Self {
        Self::constant(I::redirect(path, headers))
    }

    fn write_file(path: &str, max_age: Option<u32>) -> Self {
        Self::constant(I::write_file(path, max_age))
    }

    fn on_complete<A, F>(promise: Promise<A>, then: F) -> Self
    where
        A: Send + 'static,
        F: FnOnce(A) -> Self + Send + 'static,
    {
        Self::new(move |env| I::on_complete(promise, move |value| then(value).run(env)))
    }
}

impl<E, I> ReadBody for Reader<E, I>
where
    E: Send + 'static,
    I: ReadBody,
{
    type AfterBody = Reader<E, I::AfterBody>;

    fn read_body<F>(then: F) -> Self
    where
        F: FnOnce(Bytes) -> Self::AfterBody + Send + 'static,
    {
        Self::new(move |env| I::read_body(move |body| then(body).run(env)))
    }
}
