//! Statement execution against a single SQLite connection.
//!
//! Rows come back as JSON objects keyed by column name so results can be cached
//! and reported without knowing the schema. SQLite storage classes map as
//! INTEGER → number, REAL → number, TEXT → string, BLOB → hex string, NULL → null.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnection, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};
use std::fmt;
use std::str::FromStr;

use crate::error::PoolError;

/// A result row keyed by column name.
pub type Record = Map<String, Value>;

/// How a statement's result is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMethod {
    /// No result rows; reports last insert id and affected rows.
    Run,
    /// First row or nothing.
    Get,
    /// Every row.
    All,
}

impl QueryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMethod::Run => "run",
            QueryMethod::Get => "get",
            QueryMethod::All => "all",
        }
    }
}

impl fmt::Display for QueryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryMethod {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "run" => Ok(QueryMethod::Run),
            "get" => Ok(QueryMethod::Get),
            "all" => Ok(QueryMethod::All),
            other => Err(PoolError::InvalidMethod(other.to_string())),
        }
    }
}

/// A positional statement parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlParam {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::Integer(value)
    }
}

impl From<i32> for SqlParam {
    fn from(value: i32) -> Self {
        SqlParam::Integer(value.into())
    }
}

impl From<u32> for SqlParam {
    fn from(value: u32) -> Self {
        SqlParam::Integer(value.into())
    }
}

impl From<bool> for SqlParam {
    fn from(value: bool) -> Self {
        SqlParam::Integer(value as i64)
    }
}

impl From<f64> for SqlParam {
    fn from(value: f64) -> Self {
        SqlParam::Real(value)
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<Vec<u8>> for SqlParam {
    fn from(value: Vec<u8>) -> Self {
        SqlParam::Blob(value)
    }
}

impl<T: Into<SqlParam>> From<Option<T>> for SqlParam {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlParam::Null)
    }
}

/// Outcome of a `run` statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    /// Row id of the last inserted row on this connection.
    pub last_id: i64,
    /// Rows changed by the statement.
    pub changes: u64,
}

/// Result of a statement, shaped by the [`QueryMethod`] it ran with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "result", rename_all = "lowercase")]
pub enum QueryOutput {
    Run(RunResult),
    Get(Option<Record>),
    All(Vec<Record>),
}

impl QueryOutput {
    pub fn method(&self) -> QueryMethod {
        match self {
            QueryOutput::Run(_) => QueryMethod::Run,
            QueryOutput::Get(_) => QueryMethod::Get,
            QueryOutput::All(_) => QueryMethod::All,
        }
    }

    /// Write summary, zeroed for read outputs.
    pub fn run_result(&self) -> RunResult {
        match self {
            QueryOutput::Run(result) => *result,
            _ => RunResult::default(),
        }
    }

    /// Single row of a `get`, or the first row of an `all`.
    pub fn row(&self) -> Option<&Record> {
        match self {
            QueryOutput::Get(row) => row.as_ref(),
            QueryOutput::All(rows) => rows.first(),
            QueryOutput::Run(_) => None,
        }
    }

    /// All rows; empty for `run`.
    pub fn into_rows(self) -> Vec<Record> {
        match self {
            QueryOutput::Get(row) => row.into_iter().collect(),
            QueryOutput::All(rows) => rows,
            QueryOutput::Run(_) => Vec::new(),
        }
    }
}

fn bind_params<'q>(
    sql: &'q str,
    params: &'q [SqlParam],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, param| match param {
            SqlParam::Null => query.bind(None::<i64>),
            SqlParam::Integer(value) => query.bind(*value),
            SqlParam::Real(value) => query.bind(*value),
            SqlParam::Text(value) => query.bind(value.as_str()),
            SqlParam::Blob(value) => query.bind(value.as_slice()),
        })
}

fn row_to_record(row: &SqliteRow) -> Result<Record, sqlx::Error> {
    let mut record = Record::new();

    for (index, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" => Value::from(row.try_get_unchecked::<i64, _>(index)?),
                "REAL" => serde_json::Number::from_f64(row.try_get_unchecked::<f64, _>(index)?)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                "BLOB" => Value::String(hex::encode(row.try_get_unchecked::<Vec<u8>, _>(index)?)),
                _ => Value::String(row.try_get_unchecked::<String, _>(index)?),
            }
        };
        record.insert(column.name().to_string(), value);
    }

    Ok(record)
}

/// Executes `sql` with positional `params` on `conn`.
pub async fn execute(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[SqlParam],
    method: QueryMethod,
) -> Result<QueryOutput, sqlx::Error> {
    let query = bind_params(sql, params);

    match method {
        QueryMethod::Run => {
            let result = query.execute(&mut *conn).await?;
            Ok(QueryOutput::Run(RunResult {
                last_id: result.last_insert_rowid(),
                changes: result.rows_affected(),
            }))
        }
        QueryMethod::Get => {
            let row = query.fetch_optional(&mut *conn).await?;
            Ok(QueryOutput::Get(row.as_ref().map(row_to_record).transpose()?))
        }
        QueryMethod::All => {
            let rows = query.fetch_all(&mut *conn).await?;
            let records = rows
                .iter()
                .map(row_to_record)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(QueryOutput::All(records))
        }
    }
}
