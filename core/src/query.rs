//! Query descriptions and the database driver contract.
//!
//! A [`Query`] is inert data: a statement, its bound parameters and a function
//! that parses the driver's raw [`QueryResult`]. Two queries are equal when
//! their statement and parameters are equal; the parse function does not take
//! part in equality. That lets a test environment match the queries a handler
//! issues against an expected list.

use chrono::{DateTime, Utc};
use std::any::type_name;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// A bound parameter or a column value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Any integer column, widened to 64 bits.
    Int(i64),
    /// Text.
    Text(String),
    /// UUID.
    Uuid(Uuid),
    /// Timestamp with time zone.
    Timestamp(DateTime<Utc>),
    /// JSON document, kept in its serialized form.
    Json(String),
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Conversion from a column [`Value`].
pub trait FromValue: Sized {
    /// `None` when the value has the wrong shape.
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => i32::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(s) | Value::Json(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Uuid(id) => Some(*id),
            Value::Text(s) => Uuid::parse_str(s).ok(),
            _ => None,
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// One result row with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row; `columns` and `values` are matched by position.
    #[must_use]
    pub const fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self::new(columns.into(), values)
    }

    /// Raw value of a column.
    #[must_use]
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|index| self.values.get(index))
    }

    /// Typed value of a column.
    ///
    /// # Errors
    ///
    /// [`QueryError::ColumnNotFound`] if the row has no such column,
    /// [`QueryError::Decode`] if the value has a different type.
    pub fn get<T: FromValue>(&self, column: &str) -> Result<T, QueryError> {
        let value = self
            .value(column)
            .ok_or_else(|| QueryError::ColumnNotFound(column.to_owned()))?;
        T::from_value(value).ok_or_else(|| QueryError::Decode {
            column: column.to_owned(),
            expected: type_name::<T>(),
        })
    }
}

/// Everything a driver returns for one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Returned rows, empty for plain commands.
    pub rows: Vec<Row>,
    /// Rows inserted, updated or deleted.
    pub rows_affected: u64,
}

impl QueryResult {
    /// A result carrying rows.
    #[must_use]
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let rows_affected = rows.len() as u64;
        Self {
            rows,
            rows_affected,
        }
    }

    /// A command result with no rows.
    #[must_use]
    pub const fn affected(rows_affected: u64) -> Self {
        Self {
            rows: Vec::new(),
            rows_affected,
        }
    }
}

/// Errors raised while running or decoding a query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Could not open a connection.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The driver rejected the statement.
    #[error("query failed ({statement}): {message}")]
    Execution {
        /// Statement that failed.
        statement: String,
        /// Driver message.
        message: String,
    },

    /// A column had an unexpected type.
    #[error("could not decode column `{column}` as {expected}")]
    Decode {
        /// Column name.
        column: String,
        /// Rust type that was requested.
        expected: &'static str,
    },

    /// A column was missing from the row.
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// Exactly one row was expected, none came back.
    #[error("expected a row, found none")]
    NotFound,
}

type Parse<A> = Arc<dyn Fn(QueryResult) -> Result<A, QueryError> + Send + Sync>;

/// A statement, its parameters and a parser for its result.
pub struct Query<A> {
    statement: String,
    params: Vec<Value>,
    parse: Parse<A>,
}

impl<A> Query<A> {
    /// Create a query with a custom result parser.
    pub fn new<F>(statement: impl Into<String>, params: Vec<Value>, parse: F) -> Self
    where
        F: Fn(QueryResult) -> Result<A, QueryError> + Send + Sync + 'static,
    {
        Self {
            statement: statement.into(),
            params,
            parse: Arc::new(parse),
        }
    }

    /// The statement template.
    #[must_use]
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// The bound parameters, in placeholder order.
    #[must_use]
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Parse a raw driver result.
    ///
    /// # Errors
    ///
    /// Whatever the query's parse function reports.
    pub fn parse(&self, result: QueryResult) -> Result<A, QueryError> {
        (self.parse)(result)
    }

    /// Run on an open connection.
    ///
    /// # Errors
    ///
    /// Driver failures and parse failures.
    pub async fn execute_on<C: Connection>(&self, connection: &mut C) -> Result<A, QueryError> {
        let result = connection.run(&self.statement, &self.params).await?;
        self.parse(result)
    }
}

impl<A: 'static> Query<A> {
    /// Transform the parsed result.
    #[must_use]
    pub fn map<B, F>(self, f: F) -> Query<B>
    where
        B: 'static,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        let parse = self.parse;
        Query {
            statement: self.statement,
            params: self.params,
            parse: Arc::new(move |result| parse(result).map(&f)),
        }
    }

    /// Exactly one row, parsed with `row`. No row is [`QueryError::NotFound`].
    pub fn one<F>(statement: impl Into<String>, params: Vec<Value>, row: F) -> Self
    where
        F: Fn(&Row) -> Result<A, QueryError> + Send + Sync + 'static,
    {
        Self::new(statement, params, move |result| {
            result.rows.first().map_or(Err(QueryError::NotFound), &row)
        })
    }
}

impl<A: 'static> Query<Vec<A>> {
    /// Every row, each parsed with `row`.
    pub fn rows<F>(statement: impl Into<String>, params: Vec<Value>, row: F) -> Self
    where
        F: Fn(&Row) -> Result<A, QueryError> + Send + Sync + 'static,
    {
        Self::new(statement, params, move |result| {
            result.rows.iter().map(&row).collect()
        })
    }
}

impl<A: 'static> Query<Option<A>> {
    /// The first row if any.
    pub fn optional<F>(statement: impl Into<String>, params: Vec<Value>, row: F) -> Self
    where
        F: Fn(&Row) -> Result<A, QueryError> + Send + Sync + 'static,
    {
        Self::new(statement, params, move |result| {
            result.rows.first().map(&row).transpose()
        })
    }
}

impl Query<u64> {
    /// A command; the result is the number of affected rows.
    pub fn command(statement: impl Into<String>, params: Vec<Value>) -> Self {
        Self::new(statement, params, |result| Ok(result.rows_affected))
    }
}

impl<A> Clone for Query<A> {
    fn clone(&self) -> Self {
        Self {
            statement: self.statement.clone(),
            params: self.params.clone(),
            parse: Arc::clone(&self.parse),
        }
    }
}

impl<A> PartialEq for Query<A> {
    fn eq(&self, other: &Self) -> bool {
        self.statement == other.statement && self.params == other.params
    }
}

impl<A> Eq for Query<A> {}

impl<A> Hash for Query<A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.statement.hash(state);
        self.params.hash(state);
    }
}

impl<A> fmt::Debug for Query<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("statement", &self.statement)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// An open database connection.
pub trait Connection: Send + 'static {
    /// Run one statement with bound parameters.
    fn run(
        &mut self,
        statement: &str,
        params: &[Value],
    ) -> impl Future<Output = Result<QueryResult, QueryError>> + Send;

    /// Release the connection.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Opens connections on demand.
pub trait Connector: Clone + Send + Sync + 'static {
    /// The connection type produced.
    type Connection: Connection;

    /// Open a new connection.
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, QueryError>> + Send;
}
