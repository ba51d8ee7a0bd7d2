// SPDX-License-Identifier: Apache-2.0

//! DuckDB Driver
//!
//! Implements the DataEngine trait for DuckDB using the native `duckdb` crate.
//!
//! ## DuckDB Specifics
//!
//! - DuckDB is a file-based embedded OLAP database
//! - `host` in ConnectionConfig contains the file path
//! - Supports `:memory:` for in-memory databases
//! - Accepts the `TABLE t` shorthand, `EXTRACT(HOUR FROM ..)` and `strftime`
//! - `ROUND(double, n)` works with or without a `::numeric` cast
//!
//! ## Concurrency Model
//!
//! The `duckdb` crate provides a synchronous API. All operations are wrapped
//! in `tokio::task::spawn_blocking`. The `Connection` is `Send` but `!Sync`,
//! so it is protected by a `std::sync::Mutex`.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use ::duckdb::types::{TimeUnit, Value as DuckValue};
use ::duckdb::Connection;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::identifier::TableName;
use crate::engine::sql_generator::{self, SqlDialect};
use crate::engine::statement;
use crate::engine::traits::DataEngine;
use crate::engine::types::{
    timestamp_text, BackendKind, ColumnInfo, ConnectionConfig, QueryResult, Row as QRow,
    TableData, Value,
};

const KIND: BackendKind = BackendKind::DuckDb;
const DIALECT: SqlDialect = SqlDialect::DuckDb;

/// DuckDB engine handle.
pub struct DuckDbDriver {
    /// The DuckDB connection, protected by a std Mutex (Connection is !Sync).
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbDriver {
    /// Opens the database file named by `config.host`, creating it if needed.
    pub async fn connect(config: &ConnectionConfig) -> EngineResult<Self> {
        Self::validate_path(&config.host)?;

        let db_path = config.host.trim().to_string();
        let path = db_path.clone();
        let conn = tokio::task::spawn_blocking(move || Self::open_connection(&path))
            .await
            .map_err(|e| EngineError::internal(format!("DuckDB task panicked: {e}")))??;

        tracing::debug!(path = %db_path, "DuckDB connection opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn open_connection(path: &str) -> EngineResult<Connection> {
        if path == ":memory:" {
            Connection::open_in_memory().map_err(|e| {
                EngineError::connection_failed(KIND, format!("Failed to open DuckDB in-memory: {e}"))
            })
        } else {
            Connection::open(path).map_err(|e| {
                EngineError::connection_failed(KIND, format!("Failed to open DuckDB file '{path}': {e}"))
            })
        }
    }

    /// Validates the DuckDB file path.
    fn validate_path(path: &str) -> EngineResult<()> {
        let path = path.trim();

        if path == ":memory:" {
            return Ok(());
        }

        if path.is_empty() {
            return Err(EngineError::connection_failed(KIND, "DuckDB path cannot be empty."));
        }

        if path.contains("://") {
            return Err(EngineError::connection_failed(
                KIND,
                format!("Invalid DuckDB path format: {path}"),
            ));
        }

        Ok(())
    }

    /// Runs a synchronous closure on the connection inside spawn_blocking.
    async fn with_conn<F, R>(&self, f: F) -> EngineResult<R>
    where
        F: FnOnce(&Connection) -> EngineResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| EngineError::internal(format!("Failed to lock DuckDB connection: {e}")))?;
            f(&conn)
        })
        .await
        .map_err(|e| EngineError::internal(format!("DuckDB task panicked: {e}")))?
    }
}

// ==================== Type Conversion ====================

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

/// Converts an owned DuckDB value into the harness Value.
fn duckdb_value_to_value(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Bool(b),
        DuckValue::TinyInt(i) => Value::Int(i as i64),
        DuckValue::SmallInt(i) => Value::Int(i as i64),
        DuckValue::Int(i) => Value::Int(i as i64),
        DuckValue::BigInt(i) => Value::Int(i),
        DuckValue::HugeInt(i) => i64::try_from(i)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Text(i.to_string())),
        DuckValue::UTinyInt(i) => Value::Int(i as i64),
        DuckValue::USmallInt(i) => Value::Int(i as i64),
        DuckValue::UInt(i) => Value::Int(i as i64),
        DuckValue::UBigInt(i) => i64::try_from(i)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Text(i.to_string())),
        DuckValue::Float(f) => Value::Float(f as f64),
        DuckValue::Double(f) => Value::Float(f),
        DuckValue::Decimal(d) => Value::Decimal(d),
        DuckValue::Timestamp(unit, v) => DateTime::from_timestamp_micros(to_micros(unit, v))
            .map(|dt| Value::Text(timestamp_text(&dt.naive_utc())))
            .unwrap_or(Value::Null),
        DuckValue::Date32(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days as i64)))
            .map(|d| Value::Text(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),
        DuckValue::Time64(unit, v) => {
            let micros = to_micros(unit, v);
            NaiveTime::from_num_seconds_from_midnight_opt(
                (micros / 1_000_000) as u32,
                ((micros % 1_000_000) * 1_000) as u32,
            )
            .map(|t| Value::Text(t.format("%H:%M:%S").to_string()))
            .unwrap_or(Value::Null)
        }
        DuckValue::Text(s) => Value::Text(s),
        DuckValue::Enum(s) => Value::Text(s),
        DuckValue::Blob(b) => Value::Bytes(b),
        other => Value::Text(format!("{other:?}")),
    }
}

/// Type label for a column, taken from the first non-null cell.
fn type_label(value: &DuckValue) -> Option<&'static str> {
    let label = match value {
        DuckValue::Null => return None,
        DuckValue::Boolean(_) => "BOOLEAN",
        DuckValue::TinyInt(_) => "TINYINT",
        DuckValue::SmallInt(_) => "SMALLINT",
        DuckValue::Int(_) => "INTEGER",
        DuckValue::BigInt(_) => "BIGINT",
        DuckValue::HugeInt(_) => "HUGEINT",
        DuckValue::UTinyInt(_) | DuckValue::USmallInt(_) | DuckValue::UInt(_) | DuckValue::UBigInt(_) => {
            "UBIGINT"
        }
        DuckValue::Float(_) => "FLOAT",
        DuckValue::Double(_) => "DOUBLE",
        DuckValue::Decimal(_) => "DECIMAL",
        DuckValue::Timestamp(..) => "TIMESTAMP",
        DuckValue::Date32(_) => "DATE",
        DuckValue::Time64(..) => "TIME",
        DuckValue::Text(_) | DuckValue::Enum(_) => "VARCHAR",
        DuckValue::Blob(_) => "BLOB",
        _ => "OTHER",
    };
    Some(label)
}

/// Executes a row-returning statement and returns a QueryResult.
///
/// NOTE: DuckDB crate requires that `column_name()` is called AFTER the statement
/// has been executed (i.e., after iterating rows). We collect rows first, then
/// extract column names.
fn execute_select(conn: &Connection, sql: &str, start: Instant) -> EngineResult<QueryResult> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| EngineError::query_failed(KIND, e.to_string()))?;

    let rows_iter = stmt
        .query_map([], |row| {
            let col_count = row.as_ref().column_count();
            let mut values = Vec::with_capacity(col_count);
            for i in 0..col_count {
                values.push(row.get::<_, DuckValue>(i)?);
            }
            Ok(values)
        })
        .map_err(|e| EngineError::query_failed(KIND, e.to_string()))?;

    let mut raw_rows: Vec<Vec<DuckValue>> = Vec::new();
    for row_result in rows_iter {
        raw_rows.push(row_result.map_err(|e| EngineError::query_failed(KIND, e.to_string()))?);
    }

    // After iteration, statement has been executed, so column_count/column_name work
    let column_count = stmt.column_count();
    let columns: Vec<ColumnInfo> = (0..column_count)
        .map(|i| {
            let name = stmt
                .column_name(i)
                .map(|s| s.to_string())
                .unwrap_or_else(|_| format!("col_{i}"));
            let data_type = raw_rows
                .iter()
                .find_map(|row| row.get(i).and_then(type_label))
                .unwrap_or("NULL");
            ColumnInfo::new(name, data_type)
        })
        .collect();

    let rows = raw_rows
        .into_iter()
        .map(|values| QRow::new(values.into_iter().map(duckdb_value_to_value).collect()))
        .collect();

    Ok(QueryResult {
        columns,
        rows,
        affected_rows: None,
        execution_time_ms: start.elapsed().as_micros() as f64 / 1000.0,
    })
}

/// Executes a statement that returns no rows and reports affected rows.
fn execute_dml(conn: &Connection, sql: &str, start: Instant) -> EngineResult<QueryResult> {
    let affected = conn
        .execute(sql, [])
        .map_err(|e| EngineError::query_failed(KIND, e.to_string()))?;

    Ok(QueryResult::with_affected_rows(
        affected as u64,
        start.elapsed().as_micros() as f64 / 1000.0,
    ))
}

// ==================== DataEngine Implementation ====================

#[async_trait]
impl DataEngine for DuckDbDriver {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn probe(&self) -> EngineResult<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i32>(0))
                .map_err(|e| EngineError::connection_failed(KIND, e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn execute(&self, query: &str) -> EngineResult<QueryResult> {
        let query = query.to_string();
        let returns_rows = statement::returns_rows(&query);

        self.with_conn(move |conn| {
            let start = Instant::now();
            if returns_rows {
                execute_select(conn, &query, start)
            } else {
                execute_dml(conn, &query, start)
            }
        })
        .await
    }

    async fn fetch_table(&self, table: &TableName) -> EngineResult<QueryResult> {
        self.execute(&sql_generator::select_all_sql(DIALECT, table)).await
    }

    async fn drop_table_if_exists(&self, table: &TableName) -> EngineResult<()> {
        let sql = sql_generator::drop_table_sql(DIALECT, table);
        self.with_conn(move |conn| {
            conn.execute_batch(&sql)
                .map_err(|e| EngineError::query_failed(KIND, e.to_string()))
        })
        .await
    }

    async fn replace_table(&self, table: &TableName, data: &TableData) -> EngineResult<u64> {
        let drop = sql_generator::drop_table_sql(DIALECT, table);
        let create = sql_generator::create_table_sql(DIALECT, table, &data.columns);
        let inserts = sql_generator::insert_statements(DIALECT, table, data);
        let row_count = data.rows.len() as u64;

        self.with_conn(move |conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| EngineError::query_failed(KIND, e.to_string()))?;

            tx.execute_batch(&drop)
                .map_err(|e| EngineError::query_failed(KIND, e.to_string()))?;
            tx.execute_batch(&create)
                .map_err(|e| EngineError::query_failed(KIND, e.to_string()))?;
            for insert in &inserts {
                tx.execute_batch(insert)
                    .map_err(|e| EngineError::query_failed(KIND, e.to_string()))?;
            }

            tx.commit()
                .map_err(|e| EngineError::query_failed(KIND, e.to_string()))?;
            Ok(row_count)
        })
        .await
        .map_err(|e| e.into_load_failure(table.as_str()))
    }

    async fn count_rows(&self, table: &TableName) -> EngineResult<u64> {
        let sql = sql_generator::count_rows_sql(DIALECT, table);
        self.with_conn(move |conn| {
            let count: i64 = conn
                .query_row(&sql, [], |row| row.get(0))
                .map_err(|e| EngineError::query_failed(KIND, e.to_string()))?;
            Ok(count.max(0) as u64)
        })
        .await
    }

    async fn close(&self) {
        // The connection closes when the last handle is dropped; make sure
        // nothing is buffered in the WAL first.
        if let Err(e) = self
            .with_conn(|conn| {
                conn.execute_batch("CHECKPOINT")
                    .map_err(|e| EngineError::query_failed(KIND, e.to_string()))
            })
            .await
        {
            tracing::warn!(error = %e, "DuckDB checkpoint on close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{ColumnDef, ColumnType};

    async fn memory_driver() -> DuckDbDriver {
        DuckDbDriver::connect(&ConnectionConfig::embedded(KIND, ":memory:"))
            .await
            .expect("in-memory DuckDB")
    }

    #[test]
    fn test_validate_path() {
        assert!(DuckDbDriver::validate_path(":memory:").is_ok());
        assert!(DuckDbDriver::validate_path("demo.duckdb").is_ok());
        assert!(DuckDbDriver::validate_path("").is_err());
        assert!(DuckDbDriver::validate_path("postgres://localhost/db").is_err());
    }

    #[test]
    fn test_temporal_conversion() {
        let ts = duckdb_value_to_value(DuckValue::Timestamp(TimeUnit::Microsecond, 1_714_557_600_000_000));
        assert_eq!(ts, Value::Text("2024-05-01 10:00:00".to_string()));
        let date = duckdb_value_to_value(DuckValue::Date32(19_844));
        assert_eq!(date, Value::Text("2024-05-01".to_string()));
        assert_eq!(duckdb_value_to_value(DuckValue::HugeInt(7)), Value::Int(7));
    }

    #[tokio::test]
    async fn test_execute_returns_named_typed_columns() {
        let driver = memory_driver().await;
        let result = driver
            .execute("-- comment first\nSELECT 1 AS a, 'x' AS b, true AS c, NULL AS d")
            .await
            .expect("select");

        let names: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert_eq!(result.columns[1].data_type, "VARCHAR");
        assert_eq!(
            result.rows[0].values,
            vec![Value::Int(1), Value::Text("x".into()), Value::Bool(true), Value::Null]
        );
    }

    #[tokio::test]
    async fn test_query_error_is_passed_through() {
        let driver = memory_driver().await;
        let err = driver.execute("SELECT * FROM no_such_table").await.unwrap_err();
        match err {
            EngineError::QueryFailed { backend, message } => {
                assert_eq!(backend, KIND);
                assert!(message.contains("no_such_table"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_replace_table_is_idempotent() {
        let driver = memory_driver().await;
        let table = TableName::parse("t2").unwrap();
        let data = TableData {
            columns: vec![
                ColumnDef { name: "aa".into(), column_type: ColumnType::BigInt },
                ColumnDef { name: "bb".into(), column_type: ColumnType::Text },
            ],
            rows: vec![
                QRow::new(vec![Value::Int(5), Value::Text("x".into())]),
                QRow::new(vec![Value::Int(6), Value::Text("y".into())]),
            ],
        };

        driver.drop_table_if_exists(&table).await.expect("drop of absent table");
        assert_eq!(driver.replace_table(&table, &data).await.unwrap(), 2);
        assert_eq!(driver.replace_table(&table, &data).await.unwrap(), 2);
        assert_eq!(driver.count_rows(&table).await.unwrap(), 2);

        let fetched = driver.fetch_table(&table).await.unwrap();
        assert_eq!(fetched.columns[0].data_type, "BIGINT");
        assert_eq!(fetched.row_count(), 2);
    }
}
