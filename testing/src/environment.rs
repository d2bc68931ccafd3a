//! The in-memory request environment.
//!
//! Queries are matched against an ordered list of expectations. A match
//! requires the same statement and the same bound parameters, in the same
//! position in the list. Anything else fails the test immediately with a
//! message saying what was expected instead.

// A mismatched query is a test failure.
#![allow(clippy::panic)]

use reel_core::{
    Promise, ProvidesContext, ProvidesDatabase, ProvidesSession, Query, QueryError, QueryResult,
    Value,
};
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

enum Canned {
    Value(Box<dyn Any + Send>),
    Raw(QueryResult),
    Error(QueryError),
}

/// One expected query and the result to hand back.
pub struct QueryExpectation {
    statement: String,
    params: Vec<Value>,
    result: Canned,
}

impl QueryExpectation {
    /// Expect `query` and answer with an already parsed value.
    pub fn returning<A: Send + 'static>(query: &Query<A>, value: A) -> Self {
        Self::new(query, Canned::Value(Box::new(value)))
    }

    /// Expect `query` and answer with raw rows, run through the query's own
    /// parser.
    pub fn rows<A>(query: &Query<A>, result: QueryResult) -> Self {
        Self::new(query, Canned::Raw(result))
    }

    /// Expect `query` and fail it.
    pub fn failing<A>(query: &Query<A>, error: QueryError) -> Self {
        Self::new(query, Canned::Error(error))
    }

    fn new<A>(query: &Query<A>, result: Canned) -> Self {
        Self {
            statement: query.statement().to_owned(),
            params: query.params().to_vec(),
            result,
        }
    }

    fn matches<A>(&self, query: &Query<A>) -> bool {
        self.statement == query.statement() && self.params == query.params()
    }
}

impl fmt::Debug for QueryExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryExpectation")
            .field("statement", &self.statement)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Session, context and expected queries for one simulated request, or for a
/// whole flow of requests.
///
/// Clones share the expectation list.
pub struct TestEnvironment<S, X> {
    session: Option<S>,
    context: Arc<X>,
    queries: Arc<Mutex<VecDeque<QueryExpectation>>>,
}

impl<S, X> TestEnvironment<S, X> {
    /// An anonymous environment around `context`.
    pub fn new(context: X) -> Self {
        Self {
            session: None,
            context: Arc::new(context),
            queries: Arc::default(),
        }
    }

    /// Log the request in as `session`.
    #[must_use]
    pub fn with_session(mut self, session: S) -> Self {
        self.session = Some(session);
        self
    }

    /// Replace the session, keeping context and expectations.
    #[must_use]
    pub fn with_session_option(&self, session: Option<S>) -> Self {
        Self {
            session,
            context: Arc::clone(&self.context),
            queries: Arc::clone(&self.queries),
        }
    }

    /// The shared context.
    #[must_use]
    pub fn context(&self) -> &X {
        &self.context
    }

    /// Append an expectation.
    pub fn expect(&self, expectation: QueryExpectation) {
        self.lock().push_back(expectation);
    }

    /// Append an expectation answered with `value`.
    pub fn expect_query<A: Send + 'static>(&self, query: &Query<A>, value: A) {
        self.expect(QueryExpectation::returning(query, value));
    }

    /// Expectations not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.lock().len()
    }

    /// Panic if any expected query was not issued.
    pub fn assert_exhausted(&self) {
        let queries = self.lock();
        assert!(
            queries.is_empty(),
            "expected queries were never issued: {:?}",
            queries.iter().collect::<Vec<_>>()
        );
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<QueryExpectation>> {
        self.queries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_expectation<A>(&self, query: &Query<A>) -> QueryExpectation {
        let mut queries = self.lock();
        let Some(front) = queries.front() else {
            panic!("unexpected query, none expected: {query:?}");
        };
        if !front.matches(query) {
            if queries.iter().skip(1).any(|expected| expected.matches(query)) {
                panic!("query issued out of order: {query:?}, expected first: {front:?}");
            }
            panic!("unexpected query: {query:?}, expected: {front:?}");
        }
        queries.pop_front().unwrap_or_else(|| panic!("expectation vanished"))
    }
}

impl<S: Clone, X> Clone for TestEnvironment<S, X> {
    fn clone(&self) -> Self {
        self.with_session_option(self.session.clone())
    }
}

impl<S, X> fmt::Debug for TestEnvironment<S, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestEnvironment")
            .field("logged_in", &self.session.is_some())
            .field("remaining_queries", &self.remaining())
            .finish_non_exhaustive()
    }
}

impl<S, X> ProvidesSession for TestEnvironment<S, X>
where
    S: Clone + Send + Sync + 'static,
{
    type Session = S;

    fn session(&self) -> Promise<Option<S>> {
        Promise::ready(self.session.clone())
    }
}

impl<S, X> ProvidesDatabase for TestEnvironment<S, X> {
    fn execute<A: Send + 'static>(&self, query: Query<A>) -> Promise<Result<A, QueryError>> {
        let expectation = self.next_expectation(&query);
        let result = match expectation.result {
            Canned::Value(value) => match value.downcast::<A>() {
                Ok(value) => Ok(*value),
                Err(_) => panic!(
                    "canned result for {query:?} has the wrong type, expected {}",
                    std::any::type_name::<A>()
                ),
            },
            Canned::Raw(result) => query.parse(result),
            Canned::Error(error) => Err(error),
        };
        Promise::ready(result)
    }
}

impl<S, X> ProvidesContext for TestEnvironment<S, X>
where
    X: Send + Sync + 'static,
{
    type Context = X;

    fn context(&self) -> Arc<X> {
        Arc::clone(&self.context)
    }
}
