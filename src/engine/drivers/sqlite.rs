// SPDX-License-Identifier: Apache-2.0

//! SQLite Driver
//!
//! Implements the DataEngine trait for SQLite databases using SQLx.
//!
//! ## SQLite Specifics
//!
//! - SQLite is a file-based database, so `host` in ConnectionConfig contains the file path
//! - Supports `:memory:` for in-memory databases
//! - Dynamic typing: values are decoded by their storage class, so BOOLEAN
//!   columns come back as 0/1 integers and TIMESTAMP columns as text
//! - No `TABLE t` shorthand, no `EXTRACT(HOUR FROM ..)`; use `strftime`
//! - `ROUND(x, 3)` is required on doubles; a `::numeric` cast is a syntax error
//!
//! ## Pool
//!
//! The handle is exclusive to one sequential caller, so the pool holds a
//! single connection. That also keeps `:memory:` databases alive and shared.

use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Executor, Row, TypeInfo, ValueRef};

use crate::engine::drivers::sqlx_diagnostic;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::identifier::TableName;
use crate::engine::sql_generator::{self, SqlDialect};
use crate::engine::statement;
use crate::engine::traits::DataEngine;
use crate::engine::types::{
    BackendKind, ColumnInfo, ConnectionConfig, QueryResult, Row as QRow, TableData, Value,
};

const KIND: BackendKind = BackendKind::Sqlite;
const DIALECT: SqlDialect = SqlDialect::Sqlite;

/// SQLite engine handle.
pub struct SqliteDriver {
    pool: SqlitePool,
}

impl SqliteDriver {
    /// Opens (creating if missing) the SQLite file named by `config.host`.
    pub async fn connect(config: &ConnectionConfig) -> EngineResult<Self> {
        Self::validate_path(&config.host)?;

        let opts = Self::build_connect_options(config);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .map_err(|e| EngineError::connection_failed(KIND, sqlx_diagnostic(&e)))?;

        tracing::debug!(path = %config.host, "SQLite pool opened");
        Ok(Self { pool })
    }

    fn build_connect_options(config: &ConnectionConfig) -> SqliteConnectOptions {
        let path = config.host.trim();

        let conn_str = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}", path)
        };

        SqliteConnectOptions::from_str(&conn_str)
            .unwrap_or_else(|_| SqliteConnectOptions::new().filename(path))
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30))
    }

    /// Validates the SQLite connection path
    fn validate_path(path: &str) -> EngineResult<()> {
        let path = path.trim();

        if path == ":memory:" {
            return Ok(());
        }

        if path.is_empty() {
            return Err(EngineError::connection_failed(KIND, "SQLite path cannot be empty."));
        }

        if path.contains("://") {
            return Err(EngineError::connection_failed(
                KIND,
                format!("Invalid SQLite path format: {}", path),
            ));
        }

        Ok(())
    }

    /// Converts a SQLx row to our universal Row type
    fn convert_row(sqlite_row: &SqliteRow) -> QRow {
        let values = sqlite_row
            .columns()
            .iter()
            .map(|col| Self::extract_value(sqlite_row, col.ordinal()))
            .collect();

        QRow::new(values)
    }

    /// Extracts a value by its storage class.
    ///
    /// SQLite's declared column types are only affinities, so the decoded
    /// type follows what is actually stored in the cell.
    fn extract_value(row: &SqliteRow, idx: usize) -> Value {
        let storage = match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return Value::Null,
            Ok(raw) => raw.type_info().name().to_ascii_uppercase(),
            Err(_) => return Value::Null,
        };

        let decoded = match storage.as_str() {
            "INTEGER" => row.try_get_unchecked::<i64, _>(idx).map(Value::Int),
            "REAL" => row.try_get_unchecked::<f64, _>(idx).map(Value::Float),
            "BLOB" => row.try_get_unchecked::<Vec<u8>, _>(idx).map(Value::Bytes),
            _ => row.try_get_unchecked::<String, _>(idx).map(Value::Text),
        };
        decoded.unwrap_or(Value::Null)
    }

    /// Column metadata (declared type, or storage class for expressions)
    fn column_info<C: Column<Database = sqlx::Sqlite>>(columns: &[C]) -> Vec<ColumnInfo> {
        columns
            .iter()
            .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
            .collect()
    }

    async fn fetch(&self, query: &str) -> EngineResult<QueryResult> {
        let start = Instant::now();
        let sqlite_rows: Vec<SqliteRow> = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EngineError::query_failed(KIND, sqlx_diagnostic(&e)))?;
        let execution_time_ms = start.elapsed().as_micros() as f64 / 1000.0;

        let columns = match sqlite_rows.first() {
            Some(first) => Self::column_info(first.columns()),
            // No rows to read metadata from; ask the prepared statement instead.
            None => {
                let described = (&self.pool)
                    .describe(query)
                    .await
                    .map_err(|e| EngineError::query_failed(KIND, sqlx_diagnostic(&e)))?;
                Self::column_info(described.columns())
            }
        };
        let rows = sqlite_rows.iter().map(Self::convert_row).collect();

        Ok(QueryResult {
            columns,
            rows,
            affected_rows: None,
            execution_time_ms,
        })
    }
}

#[async_trait]
impl DataEngine for SqliteDriver {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn probe(&self) -> EngineResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::connection_failed(KIND, sqlx_diagnostic(&e)))?;
        Ok(())
    }

    async fn execute(&self, query: &str) -> EngineResult<QueryResult> {
        if statement::returns_rows(query) {
            return self.fetch(query).await;
        }

        let start = Instant::now();
        let result = sqlx::query(query)
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::query_failed(KIND, sqlx_diagnostic(&e)))?;

        Ok(QueryResult::with_affected_rows(
            result.rows_affected(),
            start.elapsed().as_micros() as f64 / 1000.0,
        ))
    }

    async fn fetch_table(&self, table: &TableName) -> EngineResult<QueryResult> {
        self.fetch(&sql_generator::select_all_sql(DIALECT, table)).await
    }

    async fn drop_table_if_exists(&self, table: &TableName) -> EngineResult<()> {
        sqlx::query(&sql_generator::drop_table_sql(DIALECT, table))
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::query_failed(KIND, sqlx_diagnostic(&e)))?;
        Ok(())
    }

    async fn replace_table(&self, table: &TableName, data: &TableData) -> EngineResult<u64> {
        let fail = |e: sqlx::Error| EngineError::load_failed(KIND, table.as_str(), sqlx_diagnostic(&e));

        let mut tx = self.pool.begin().await.map_err(fail)?;

        sqlx::query(&sql_generator::drop_table_sql(DIALECT, table))
            .execute(&mut *tx)
            .await
            .map_err(fail)?;
        sqlx::query(&sql_generator::create_table_sql(DIALECT, table, &data.columns))
            .execute(&mut *tx)
            .await
            .map_err(fail)?;

        let mut inserted = 0u64;
        for insert in sql_generator::insert_statements(DIALECT, table, data) {
            let result = sqlx::query(&insert).execute(&mut *tx).await.map_err(fail)?;
            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(fail)?;
        Ok(inserted)
    }

    async fn count_rows(&self, table: &TableName) -> EngineResult<u64> {
        let count: i64 = sqlx::query_scalar(&sql_generator::count_rows_sql(DIALECT, table))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| EngineError::query_failed(KIND, sqlx_diagnostic(&e)))?;
        Ok(count.max(0) as u64)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{ColumnDef, ColumnType};

    async fn memory_driver() -> SqliteDriver {
        SqliteDriver::connect(&ConnectionConfig::embedded(KIND, ":memory:"))
            .await
            .expect("in-memory SQLite")
    }

    fn flags() -> TableData {
        TableData {
            columns: vec![
                ColumnDef { name: "id".into(), column_type: ColumnType::BigInt },
                ColumnDef { name: "c".into(), column_type: ColumnType::Boolean },
                ColumnDef { name: "ts".into(), column_type: ColumnType::Timestamp },
            ],
            rows: vec![
                QRow::new(vec![
                    Value::Int(1),
                    Value::Bool(true),
                    Value::Text("2024-05-01 10:00:00".into()),
                ]),
                QRow::new(vec![Value::Int(2), Value::Bool(false), Value::Null]),
            ],
        }
    }

    #[test]
    fn test_validate_path() {
        assert!(SqliteDriver::validate_path(":memory:").is_ok());
        assert!(SqliteDriver::validate_path("demo.sqlite").is_ok());
        assert!(SqliteDriver::validate_path("  ").is_err());
        assert!(SqliteDriver::validate_path("sqlite://x").is_err());
    }

    #[tokio::test]
    async fn test_booleans_come_back_as_integers() {
        let driver = memory_driver().await;
        let table = TableName::parse("flags").unwrap();
        assert_eq!(driver.replace_table(&table, &flags()).await.unwrap(), 2);

        let result = driver
            .execute("SELECT id, c, ts FROM flags ORDER BY id")
            .await
            .unwrap();
        assert_eq!(
            result.rows[0].values,
            vec![Value::Int(1), Value::Int(1), Value::Text("2024-05-01 10:00:00".into())]
        );
        assert_eq!(result.rows[1].values[1], Value::Int(0));
        assert_eq!(result.rows[1].values[2], Value::Null);
    }

    #[tokio::test]
    async fn test_table_shorthand_is_rejected_verbatim() {
        let driver = memory_driver().await;
        let table = TableName::parse("flags").unwrap();
        driver.replace_table(&table, &flags()).await.unwrap();

        let err = driver.execute("TABLE flags;").await.unwrap_err();
        match err {
            EngineError::QueryFailed { backend, message } => {
                assert_eq!(backend, KIND);
                assert!(message.contains("syntax error"), "{message}");
                assert!(!message.starts_with("error returned from database"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_returning_clause_yields_rows() {
        let driver = memory_driver().await;
        let table = TableName::parse("flags").unwrap();
        driver.replace_table(&table, &flags()).await.unwrap();

        let result = driver
            .execute("DELETE FROM flags WHERE id = 2 RETURNING id")
            .await
            .unwrap();
        assert_eq!(result.columns[0].name, "id");
        assert_eq!(result.rows, vec![QRow::new(vec![Value::Int(2)])]);
        assert_eq!(driver.count_rows(&table).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_result_keeps_columns() {
        let driver = memory_driver().await;
        let table = TableName::parse("flags").unwrap();
        driver.replace_table(&table, &flags()).await.unwrap();

        let result = driver.execute("SELECT id, c FROM flags WHERE id > 99").await.unwrap();
        assert_eq!(result.row_count(), 0);
        let names: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "c"]);
    }

    #[tokio::test]
    async fn test_drop_and_count() {
        let driver = memory_driver().await;
        let table = TableName::parse("flags").unwrap();
        driver.drop_table_if_exists(&table).await.expect("absent table is fine");
        driver.replace_table(&table, &flags()).await.unwrap();
        assert_eq!(driver.count_rows(&table).await.unwrap(), 2);
        driver.drop_table_if_exists(&table).await.unwrap();
        assert!(driver.count_rows(&table).await.is_err());
    }
}
