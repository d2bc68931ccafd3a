//! Per-request database connection.
//!
//! A request gets at most one connection. It is opened by the first query
//! and closed by [`scoped`] when handling ends, however it ends. Requests
//! that never query never open one.

use crate::metrics::RuntimeMetrics;
use futures::FutureExt;
use reel_core::{Connection, Connector, Promise, ProvidesDatabase, Query, QueryError};
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, resume_unwind};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

enum State<C> {
    Unopened,
    Open(C),
    Closed,
}

/// A connection opened on first use.
///
/// Clones share the same underlying connection. Queries on one request are
/// serialized through it in the order they are issued.
pub struct LazyConnection<K: Connector> {
    connector: K,
    state: Arc<Mutex<State<K::Connection>>>,
}

impl<K: Connector> LazyConnection<K> {
    /// A handle that has not connected yet.
    #[must_use]
    pub fn new(connector: K) -> Self {
        Self {
            connector,
            state: Arc::new(Mutex::new(State::Unopened)),
        }
    }

    /// Run a query, connecting first if needed.
    ///
    /// # Errors
    ///
    /// Connection failures, driver failures and parse failures. A closed
    /// handle reports [`QueryError::Connection`].
    pub async fn run<A>(&self, query: &Query<A>) -> Result<A, QueryError> {
        let mut state = self.state.lock().await;
        if matches!(*state, State::Unopened) {
            tracing::debug!("Opening request connection");
            *state = State::Open(self.connector.connect().await?);
        }
        let State::Open(connection) = &mut *state else {
            return Err(QueryError::Connection(
                "request connection already closed".to_owned(),
            ));
        };

        let start = Instant::now();
        let result = query.execute_on(connection).await;
        match &result {
            Ok(_) => {
                tracing::trace!(statement = query.statement(), "Query succeeded");
                RuntimeMetrics::record_query("ok", start.elapsed());
            },
            Err(error) => {
                tracing::warn!(statement = query.statement(), %error, "Query failed");
                RuntimeMetrics::record_query("error", start.elapsed());
            },
        }
        result
    }

    /// Whether a connection is currently open.
    pub async fn is_open(&self) -> bool {
        matches!(*self.state.lock().await, State::Open(_))
    }

    /// Close the connection. Returns `true` if one was open.
    ///
    /// After this the handle refuses further queries.
    pub async fn close(&self) -> bool {
        let previous = std::mem::replace(&mut *self.state.lock().await, State::Closed);
        match previous {
            State::Open(connection) => {
                connection.close().await;
                tracing::debug!("Closed request connection");
                true
            },
            State::Unopened | State::Closed => false,
        }
    }
}

impl<K: Connector> Clone for LazyConnection<K> {
    fn clone(&self) -> Self {
        Self {
            connector: self.connector.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<K: Connector> fmt::Debug for LazyConnection<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LazyConnection")
    }
}

impl<K: Connector> ProvidesDatabase for LazyConnection<K> {
    fn execute<A: Send + 'static>(&self, query: Query<A>) -> Promise<Result<A, QueryError>> {
        let connection = self.clone();
        Promise::from_future(async move { connection.run(&query).await })
    }
}

/// Run `handle` with a fresh lazy connection and close it afterwards.
///
/// The connection is closed exactly once if it was opened, whether `handle`
/// returns normally or panics. A panic is resumed after closing.
pub async fn scoped<K, F, Fut, T>(connector: K, handle: F) -> T
where
    K: Connector,
    F: FnOnce(LazyConnection<K>) -> Fut,
    Fut: Future<Output = T>,
{
    let connection = LazyConnection::new(connector);
    let handle_connection = connection.clone();
    let outcome = AssertUnwindSafe(async move { handle(handle_connection).await })
        .catch_unwind()
        .await;
    connection.close().await;
    match outcome {
        Ok(value) => value,
        Err(panic) => resume_unwind(panic),
    }
}
