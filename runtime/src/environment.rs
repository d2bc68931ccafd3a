//! The live per-request environment.

use crate::connection::LazyConnection;
use crate::lazy::Lazy;
use reel_core::{
    Connector, Promise, ProvidesContext, ProvidesDatabase, ProvidesSession, Query, QueryError,
};
use std::fmt;
use std::sync::Arc;

/// Everything a live handler can read for one request.
///
/// `S` is the session type, `X` the process-wide context and `K` the database
/// connector. The session lookup runs on first use and is shared by every
/// clone, so a handler asking twice costs one lookup.
pub struct RequestEnvironment<S, X, K>
where
    S: Clone,
    K: Connector,
{
    session: Lazy<Option<S>>,
    connection: LazyConnection<K>,
    context: Arc<X>,
}

impl<S, X, K> RequestEnvironment<S, X, K>
where
    S: Clone + Send + Sync + 'static,
    K: Connector,
{
    /// Build the environment. `session` is not polled until a handler asks.
    pub fn new(connection: LazyConnection<K>, context: Arc<X>, session: Promise<Option<S>>) -> Self {
        Self {
            session: Lazy::from_promise(session),
            connection,
            context,
        }
    }

    /// The request's connection handle.
    #[must_use]
    pub const fn connection(&self) -> &LazyConnection<K> {
        &self.connection
    }
}

impl<S: Clone, X, K: Connector> Clone for RequestEnvironment<S, X, K> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            connection: self.connection.clone(),
            context: Arc::clone(&self.context),
        }
    }
}

impl<S: Clone, X, K: Connector> fmt::Debug for RequestEnvironment<S, X, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestEnvironment").finish_non_exhaustive()
    }
}

impl<S, X, K> ProvidesSession for RequestEnvironment<S, X, K>
where
    S: Clone + Send + Sync + 'static,
    K: Connector,
{
    type Session = S;

    fn session(&self) -> Promise<Option<S>> {
        self.session.get()
    }
}

impl<S, X, K> ProvidesDatabase for RequestEnvironment<S, X, K>
where
    S: Clone,
    K: Connector,
{
    fn execute<A: Send + 'static>(&self, query: Query<A>) -> Promise<Result<A, QueryError>> {
        self.connection.execute(query)
    }
}

impl<S, X, K> ProvidesContext for RequestEnvironment<S, X, K>
where
    S: Clone,
    X: Send + Sync + 'static,
    K: Connector,
{
    type Context = X;

    fn context(&self) -> Arc<X> {
        Arc::clone(&self.context)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::live::{Live, Reply, run};
    use bytes::Bytes;
    use http::StatusCode;
    use reel_core::{Connection, HasDatabase, HasSession, QueryResult, Reader, Respond, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct Echo {
        opened: Arc<AtomicUsize>,
    }

    struct EchoConnection;

    impl Connection for EchoConnection {
        async fn run(
            &mut self,
            statement: &str,
            _params: &[Value],
        ) -> Result<QueryResult, QueryError> {
            Ok(QueryResult::from_rows(vec![reel_core::Row::from_pairs([(
                "statement", statement,
            )])]))
        }

        async fn close(self) {}
    }

    impl Connector for Echo {
        type Connection = EchoConnection;

        async fn connect(&self) -> Result<EchoConnection, QueryError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(EchoConnection)
        }
    }

    type Env = RequestEnvironment<String, (), Echo>;
    type Handler = Reader<Env, Live>;

    fn env(connector: &Echo, lookups: &Arc<AtomicUsize>) -> Env {
        let lookups = Arc::clone(lookups);
        RequestEnvironment::new(
            LazyConnection::new(connector.clone()),
            Arc::new(()),
            Promise::from_future(async move {
                lookups.fetch_add(1, Ordering::SeqCst);
                Some("ada".to_owned())
            }),
        )
    }

    #[tokio::test]
    async fn test_session_memoized_across_lookups() {
        let connector = Echo::default();
        let lookups = Arc::new(AtomicUsize::new(0));
        let handler = Handler::require_session(|first| {
            Handler::require_session(move |second| {
                Handler::write_text(format!("{first}/{second}"), StatusCode::OK)
            })
        });

        let reply = run(handler.run(env(&connector, &lookups)), Bytes::new())
            .await
            .unwrap();
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
        assert_eq!(connector.opened.load(Ordering::SeqCst), 0);
        assert!(matches!(reply, Reply::Write { body, .. } if body == "ada/ada"));
    }

    #[tokio::test]
    async fn test_queries_use_request_connection() {
        let connector = Echo::default();
        let lookups = Arc::new(AtomicUsize::new(0));
        let query = Query::one("SELECT 1", vec![], |row| row.get::<String>("statement"));
        let handler = Handler::query(query, |statement| {
            Handler::write_text(statement, StatusCode::OK)
        });

        let reply = run(handler.run(env(&connector, &lookups)), Bytes::new())
            .await
            .unwrap();
        assert_eq!(connector.opened.load(Ordering::SeqCst), 1);
        assert_eq!(lookups.load(Ordering::SeqCst), 0);
        assert!(matches!(reply, Reply::Write { body, .. } if body == "SELECT 1"));
    }
}
