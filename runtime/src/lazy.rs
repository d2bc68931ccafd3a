//! Memoized values computed on first use.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use reel_core::Promise;
use std::fmt;
use std::future::{Future, IntoFuture};

/// A value computed by a future the first time anyone asks for it.
///
/// Every clone shares the same computation. The future is only polled once
/// somebody awaits [`Lazy::get`], and it keeps making progress as long as any
/// waiter is alive, so a waiter dropping out does not cancel the work for the
/// others.
pub struct Lazy<T: Clone> {
    shared: Shared<BoxFuture<'static, T>>,
}

impl<T> Lazy<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wrap the computation. Nothing runs yet.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        let boxed: BoxFuture<'static, T> = Box::pin(future);
        Self {
            shared: boxed.shared(),
        }
    }

    /// Wrap a promise.
    pub fn from_promise(promise: Promise<T>) -> Self {
        Self::new(promise.into_future())
    }

    /// A promise for the value, starting the computation if needed.
    pub fn get(&self) -> Promise<T> {
        Promise::from_future(self.shared.clone())
    }

    /// The value, if it has already been computed.
    #[must_use]
    pub fn peek(&self) -> Option<T> {
        self.shared.peek().cloned()
    }
}

impl<T: Clone> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Clone> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Lazy(<future>)")
    }
}
