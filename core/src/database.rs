//! Database capability.
//!
//! Handlers describe queries; the environment runs them. Driver failures come
//! back as a `Result` so a handler can decide how to present them.

use crate::interpreter::Respond;
use crate::promise::Promise;
use crate::query::{Query, QueryError};
use crate::reader::Reader;

/// Environments that can run queries.
pub trait ProvidesDatabase {
    /// Run `query`, delivering the parsed result or the failure.
    fn execute<A: Send + 'static>(&self, query: Query<A>) -> Promise<Result<A, QueryError>>;
}

/// Interpreters that can run queries on behalf of a handler.
pub trait HasDatabase: Respond {
    /// Run `query` and continue with the outcome.
    fn execute<A, F>(query: Query<A>, then: F) -> Self
    where
        A: Send + 'static,
        F: FnOnce(Result<A, QueryError>) -> Self + Send + 'static;

    /// Run `query`; on failure write the corresponding error page.
    fn query<A, F>(query: Query<A>, then: F) -> Self
    where
        A: Send + 'static,
        F: FnOnce(A) -> Self + Send + 'static,
    {
        Self::execute(query, |result| match result {
            Ok(value) => then(value),
            Err(error) => Self::write_error(error.into()),
        })
    }
}

impl<E, I> HasDatabase for Reader<E, I>
where
    E: ProvidesDatabase + Send + 'static,
    I: Respond,
{
    fn execute<A, F>(query: Query<A>, then: F) -> Self
    where
        A: Send + 'static,
        F: FnOnce(Result<A, QueryError>) -> Self + Send + 'static,
    {
        Self::new(move |env: E| {
            let result = env.execute(query);
            I::on_complete(result, move |result| then(result).run(env))
        })
    }
}
