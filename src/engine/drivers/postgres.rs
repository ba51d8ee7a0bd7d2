// SPDX-License-Identifier: Apache-2.0

//! PostgreSQL Driver
//!
//! Implements the DataEngine trait for PostgreSQL databases using SQLx.
//!
//! ## Reachability
//!
//! PostgreSQL is the only backend that lives outside this process, so
//! `connect` bounds the first connection by the configured timeout and then
//! probes with a `SELECT 'pong'` round-trip. Callers treat a failure here as
//! fatal for every step that would touch the server.
//!
//! ## Dialect
//!
//! Strict typing: `ROUND(double, int)` does not exist, so lessons cast to
//! `::numeric` first. Those come back here as `Value::Decimal`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Executor, Row, TypeInfo};

use crate::engine::drivers::sqlx_diagnostic;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::identifier::TableName;
use crate::engine::sql_generator::{self, SqlDialect};
use crate::engine::statement;
use crate::engine::traits::DataEngine;
use crate::engine::types::{
    timestamp_text, BackendKind, ColumnInfo, ConnectionConfig, QueryResult, Row as QRow, TableData,
    Value,
};

const KIND: BackendKind = BackendKind::Postgres;
const DIALECT: SqlDialect = SqlDialect::Postgres;
const DEFAULT_CONNECT_TIMEOUT_SECS: u32 = 5;

/// PostgreSQL engine handle
pub struct PostgresDriver {
    pool: PgPool,
}

impl PostgresDriver {
    /// Connects and probes. Unreachable servers and bad credentials both
    /// surface as connection-class errors.
    pub async fn connect(config: &ConnectionConfig) -> EngineResult<Self> {
        let timeout = config
            .connect_timeout_secs
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS)
            .max(1);

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(timeout as u64))
            .connect_with(Self::build_connect_options(config))
            .await
            .map_err(Self::classify_connect_error)?;

        let driver = Self { pool };
        driver.probe().await?;

        tracing::debug!(server = %config.display_target(), "PostgreSQL reachable");
        Ok(driver)
    }

    fn build_connect_options(config: &ConnectionConfig) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .password(config.password.expose())
            .database(config.database.as_deref().unwrap_or("postgres"))
            .application_name("sqltour")
    }

    fn classify_connect_error(err: sqlx::Error) -> EngineError {
        let msg = sqlx_diagnostic(&err);
        let bad_credentials = match &err {
            sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("28P01") | Some("28000")),
            _ => false,
        } || msg.contains("password authentication failed");

        if bad_credentials {
            EngineError::auth_failed(KIND, msg)
        } else {
            EngineError::connection_failed(KIND, msg)
        }
    }

    /// Converts a SQLx row to our universal Row type
    fn convert_row(pg_row: &PgRow) -> QRow {
        let values: Vec<Value> = pg_row
            .columns()
            .iter()
            .map(|col| Self::extract_value(pg_row, col.ordinal()))
            .collect();

        QRow::new(values)
    }

    /// Extracts a value from a PgRow at the given index
    fn extract_value(row: &PgRow, idx: usize) -> Value {
        // try_get with Option<T> handles NULLs; the first compatible type wins
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return v.map(Value::Int).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
            return v.map(Value::Bool).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return v.map(Value::Float).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
            return v.map(|f| Value::Float(f as f64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<rust_decimal::Decimal>, _>(idx) {
            return v.map(Value::Decimal).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            return v.map(Value::Text).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
            return v.map(Value::Bytes).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
            return v.map(|dt| Value::Text(dt.to_rfc3339())).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
            return v.map(|dt| Value::Text(timestamp_text(&dt))).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
            return v.map(|d| Value::Text(d.format("%Y-%m-%d").to_string())).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveTime>, _>(idx) {
            return v.map(|t| Value::Text(t.format("%H:%M:%S").to_string())).unwrap_or(Value::Null);
        }

        tracing::debug!(
            column = row.columns()[idx].name(),
            pg_type = row.columns()[idx].type_info().name(),
            "unsupported PostgreSQL type, rendering as NULL"
        );
        Value::Null
    }

    fn column_info<C: Column<Database = sqlx::Postgres>>(columns: &[C]) -> Vec<ColumnInfo> {
        columns
            .iter()
            .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
            .collect()
    }

    async fn fetch(&self, query: &str) -> EngineResult<QueryResult> {
        let start = Instant::now();
        let pg_rows: Vec<PgRow> = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EngineError::query_failed(KIND, sqlx_diagnostic(&e)))?;
        let execution_time_ms = start.elapsed().as_micros() as f64 / 1000.0;

        let columns = match pg_rows.first() {
            Some(first) => Self::column_info(first.columns()),
            None => {
                let described = (&self.pool)
                    .describe(query)
                    .await
                    .map_err(|e| EngineError::query_failed(KIND, sqlx_diagnostic(&e)))?;
                Self::column_info(described.columns())
            }
        };
        let rows = pg_rows.iter().map(Self::convert_row).collect();

        Ok(QueryResult {
            columns,
            rows,
            affected_rows: None,
            execution_time_ms,
        })
    }
}

#[async_trait]
impl DataEngine for PostgresDriver {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn probe(&self) -> EngineResult<()> {
        let answer: String = sqlx::query_scalar("SELECT 'pong'")
            .fetch_one(&self.pool)
            .await
            .map_err(Self::classify_connect_error)?;

        if answer != "pong" {
            return Err(EngineError::connection_failed(
                KIND,
                format!("unexpected probe answer: {answer}"),
            ));
        }
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

        // DDL is transactional in PostgreSQL, so the drop is rolled back too
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
    use crate::observability::Sensitive;

    fn config(port: u16) -> ConnectionConfig {
        ConnectionConfig {
            backend: KIND,
            host: "127.0.0.1".into(),
            port,
            username: "postgres".into(),
            password: Sensitive::new("pybites".into()),
            database: None,
            connect_timeout_secs: Some(2),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_connection_error() {
        // Grab a free port, then release it so nothing is listening there
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = match PostgresDriver::connect(&config(port)).await {
            Ok(_) => panic!("nothing listens on port {port}"),
            Err(err) => err,
        };
        assert!(err.is_connection(), "{err:?}");
        assert_eq!(err.backend(), Some(KIND));
    }

    #[test]
    fn test_connect_options_use_config() {
        let opts = PostgresDriver::build_connect_options(&config(6543));
        assert_eq!(opts.get_host(), "127.0.0.1");
        assert_eq!(opts.get_port(), 6543);
        assert_eq!(opts.get_username(), "postgres");
        assert_eq!(opts.get_database(), Some("postgres"));
    }
}
