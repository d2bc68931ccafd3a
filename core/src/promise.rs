//! Promise-like handles for values delivered later.
//!
//! A [`Promise`] wraps a boxed `Send` future. It is consumed by value, so the
//! single completion it represents can be observed exactly once: either by an
//! interpreter awaiting it, or by a callback registered with [`Promise::run`].
//! There is no cancellation; once started, a promise runs to completion.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::fmt;
use std::future::{Future, IntoFuture};
use tokio::sync::oneshot;

/// A value of type `A` that becomes available later.
#[must_use = "promises do nothing unless awaited or run"]
pub struct Promise<A> {
    future: BoxFuture<'static, A>,
}

impl<A: Send + 'static> Promise<A> {
    /// A promise that is already resolved.
    pub fn ready(value: A) -> Self {
        Self {
            future: Box::pin(futures::future::ready(value)),
        }
    }

    /// Wrap any `Send` future.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = A> + Send + 'static,
    {
        Self {
            future: Box::pin(future),
        }
    }

    /// Build a promise from a callback-registering function.
    ///
    /// `register` receives a [`Completion`] which can be completed at most
    /// once. If the completion is dropped without a value the promise resolves
    /// to `None`, so an abandoned callback surfaces as "no value" rather than a
    /// request that never finishes.
    pub fn from_callback<F>(register: F) -> Promise<Option<A>>
    where
        F: FnOnce(Completion<A>),
    {
        let (sender, receiver) = oneshot::channel();
        register(Completion { sender });
        Promise::from_future(async move { receiver.await.ok() })
    }

    /// Transform the resolved value.
    pub fn map<B, F>(self, f: F) -> Promise<B>
    where
        B: Send + 'static,
        F: FnOnce(A) -> B + Send + 'static,
    {
        Promise {
            future: Box::pin(self.future.map(f)),
        }
    }

    /// Chain a dependent promise.
    pub fn and_then<B, F>(self, f: F) -> Promise<B>
    where
        B: Send + 'static,
        F: FnOnce(A) -> Promise<B> + Send + 'static,
    {
        Promise {
            future: Box::pin(async move { f(self.future.await).future.await }),
        }
    }

    /// Register the single completion callback.
    ///
    /// The callback runs on the ambient tokio runtime; it never blocks the
    /// calling thread.
    pub fn run<F>(self, callback: F)
    where
        F: FnOnce(A) + Send + 'static,
    {
        tokio::spawn(async move {
            callback(self.future.await);
        });
    }

    /// Resolve immediately if the value is already available.
    ///
    /// Used by synchronous interpreters whose collaborators only hand out
    /// ready promises.
    pub fn now_or_never(self) -> Option<A> {
        self.future.now_or_never()
    }
}

impl<A: Send + 'static> Promise<Option<A>> {
    /// Chain a dependent optional promise, short-circuiting on `None`.
    pub fn and_then_some<B, F>(self, f: F) -> Promise<Option<B>>
    where
        B: Send + 'static,
        F: FnOnce(A) -> Promise<Option<B>> + Send + 'static,
    {
        self.and_then(|value| match value {
            Some(value) => f(value),
            None => Promise::ready(None),
        })
    }
}

impl<A: 'static> IntoFuture for Promise<A> {
    type Output = A;
    type IntoFuture = BoxFuture<'static, A>;

    fn into_future(self) -> Self::IntoFuture {
        self.future
    }
}

impl<A> fmt::Debug for Promise<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Promise(<future>)")
    }
}

/// The completion side of [`Promise::from_callback`].
#[derive(Debug)]
pub struct Completion<A> {
    sender: oneshot::Sender<A>,
}

impl<A> Completion<A> {
    /// Deliver the value. Consumes the completion, so it can fire only once.
    pub fn complete(self, value: A) {
        // The receiving side is gone when nobody awaits the promise anymore.
        let _ = self.sender.send(value);
    }
}
