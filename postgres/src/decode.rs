//! Postgres rows into `reel_core::Row`.

use chrono::{DateTime, NaiveDateTime, Utc};
use reel_core::{QueryError, Row, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row as _, TypeInfo};
use std::sync::Arc;
use uuid::Uuid;

pub fn row(row: &PgRow) -> Result<Row, QueryError> {
    let columns: Arc<[String]> = row
        .columns()
        .iter()
        .map(|column| column.name().to_owned())
        .collect();
    let values = (0..row.len())
        .map(|index| value(row, index))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Row::new(columns, values))
}

fn value(row: &PgRow, index: usize) -> Result<Value, QueryError> {
    let column = &row.columns()[index];
    let type_name = column.type_info().name();
    let decode_error = |e: sqlx::Error| QueryError::Decode {
        column: column.name().to_owned(),
        expected: match e {
            sqlx::Error::ColumnDecode { .. } => "a supported Postgres type",
            _ => "a readable column",
        },
    };

    let decoded = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index).map(|v| v.map(Value::Bool)),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)
            .map(|v| v.map(|i| Value::Int(i64::from(i)))),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)
            .map(|v| v.map(|i| Value::Int(i64::from(i)))),
        "INT8" => row.try_get::<Option<i64>, _>(index).map(|v| v.map(Value::Int)),
        "UUID" => row.try_get::<Option<Uuid>, _>(index).map(|v| v.map(Value::Uuid)),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)
            .map(|v| v.map(Value::Timestamp)),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)
            .map(|v| v.map(|t| Value::Timestamp(t.and_utc()))),
        "JSON" | "JSONB" => row
            .try_get::<Option<serde_json::Value>, _>(index)
            .map(|v| v.map(|json| Value::Json(json.to_string()))),
        _ => row.try_get::<Option<String>, _>(index).map(|v| v.map(Value::Text)),
    };

    decoded
        .map(|v| v.unwrap_or(Value::Null))
        .map_err(decode_error)
}
