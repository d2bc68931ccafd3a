//! `PostgreSQL` connector for Reel.
//!
//! Implements the `Connector`/`Connection` contract from `reel-core` on a
//! sqlx connection pool. Query descriptions stay opaque: the statement is
//! sent as-is, parameters are bound positionally and every returned column is
//! decoded into a `Value` by its Postgres type.
//!
//! # Example
//!
//! ```ignore
//! use reel_postgres::PgConnector;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let connector = PgConnector::connect("postgres://localhost/reel", 10).await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod decode;

use reel_core::{Connection, Connector, QueryError, QueryResult, Value};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::pool::PoolConnection;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgPoolOptions, PgTypeInfo};
use sqlx::{PgPool, Postgres};

/// Hands out pooled connections.
#[derive(Debug, Clone)]
pub struct PgConnector {
    pool: PgPool,
}

impl PgConnector {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a pool for `database_url`.
    ///
    /// # Errors
    ///
    /// [`QueryError::Connection`] if the database cannot be reached.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, QueryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| QueryError::Connection(e.to_string()))?;
        tracing::info!(max_connections, "Database pool ready");
        Ok(Self { pool })
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Connector for PgConnector {
    type Connection = PgConnection;

    async fn connect(&self) -> Result<PgConnection, QueryError> {
        let connection = self
            .pool
            .acquire()
            .await
            .map_err(|e| QueryError::Connection(e.to_string()))?;
        Ok(PgConnection { connection })
    }
}

/// One pooled connection, returned to the pool on close.
#[derive(Debug)]
pub struct PgConnection {
    connection: PoolConnection<Postgres>,
}

impl Connection for PgConnection {
    async fn run(&mut self, statement: &str, params: &[Value]) -> Result<QueryResult, QueryError> {
        let query = params.iter().fold(sqlx::query(statement), bind);
        let failed = |e: sqlx::Error| QueryError::Execution {
            statement: statement.to_owned(),
            message: e.to_string(),
        };

        if returns_rows(statement) {
            let rows = query.fetch_all(&mut *self.connection).await.map_err(failed)?;
            let rows = rows
                .iter()
                .map(decode::row)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(QueryResult::from_rows(rows))
        } else {
            let done = query.execute(&mut *self.connection).await.map_err(failed)?;
            Ok(QueryResult::affected(done.rows_affected()))
        }
    }

    async fn close(self) {
        // Dropping a pooled connection returns it to the pool.
        drop(self.connection);
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// A `NULL` with no declared type. The server infers the parameter type from
/// the statement, so it fits any nullable column.
struct UntypedNull;

impl sqlx::Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl sqlx::Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

/// Bind one parameter.
fn bind<'q>(query: PgQuery<'q>, value: &Value) -> PgQuery<'q> {
    match value {
        Value::Null => query.bind(UntypedNull),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Text(s) => query.bind(s.clone()),
        Value::Uuid(id) => query.bind(*id),
        Value::Timestamp(t) => query.bind(*t),
        Value::Json(s) => match serde_json::from_str::<serde_json::Value>(s) {
            Ok(json) => query.bind(sqlx::types::Json(json)),
            Err(_) => query.bind(s.clone()),
        },
    }
}

fn returns_rows(statement: &str) -> bool {
    let head = statement.trim_start().to_ascii_uppercase();
    head.starts_with("SELECT") || head.starts_with("WITH") || head.contains("RETURNING")
}
