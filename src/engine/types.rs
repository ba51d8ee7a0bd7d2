//! Universal data types for the sqltour engine layer
//!
//! These types give the three backends one normalized representation of
//! connections, tabular results and fixture data.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, Timelike};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::observability::Sensitive;

/// The three relational engines the harness drives.
///
/// Declaration order is the fixed order in which fixtures are loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Embedded columnar engine backed by a local file.
    DuckDb,
    /// Client/server engine reached over the network.
    Postgres,
    /// Embedded row-store backed by a local file.
    Sqlite,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [BackendKind::DuckDb, BackendKind::Postgres, BackendKind::Sqlite];

    /// Short machine identifier ("duckdb", "postgres", "sqlite").
    pub fn id(&self) -> &'static str {
        match self {
            BackendKind::DuckDb => "duckdb",
            BackendKind::Postgres => "postgres",
            BackendKind::Sqlite => "sqlite",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::DuckDb => "DuckDB",
            BackendKind::Postgres => "PostgreSQL",
            BackendKind::Sqlite => "SQLite",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "duckdb" | "ddb" => Some(BackendKind::DuckDb),
            "postgres" | "postgresql" | "pg" => Some(BackendKind::Postgres),
            "sqlite" | "sqlite3" | "lite" => Some(BackendKind::Sqlite),
            _ => None,
        }
    }

    /// Embedded engines run in-process against a local file.
    pub fn is_embedded(&self) -> bool {
        !matches!(self, BackendKind::Postgres)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s).ok_or_else(|| {
            format!("unknown engine '{s}' (expected one of: duckdb, postgres, sqlite)")
        })
    }
}

/// Connection parameters for one backend.
///
/// For the embedded engines `host` holds the database file path and the
/// network fields are ignored.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionConfig {
    pub backend: BackendKind,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Sensitive<String>,
    pub database: Option<String>,
    pub connect_timeout_secs: Option<u32>,
}

impl ConnectionConfig {
    /// Config for an embedded engine living in `path` (or `:memory:`).
    pub fn embedded(backend: BackendKind, path: impl Into<String>) -> Self {
        Self {
            backend,
            host: path.into(),
            port: 0,
            username: String::new(),
            password: Sensitive::new(String::new()),
            database: None,
            connect_timeout_secs: None,
        }
    }

    /// Human-readable target, never including the password.
    pub fn display_target(&self) -> String {
        if self.backend.is_embedded() {
            self.host.clone()
        } else {
            format!(
                "{}@{}:{}/{}",
                self.username,
                self.host,
                self.port,
                self.database.as_deref().unwrap_or("postgres")
            )
        }
    }
}

/// Universal value representation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view used by plotting; booleans and text are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    /// Canonical text used to compare rows coming from different engines.
    ///
    /// Folds the documented per-engine coercions: booleans compare equal to
    /// 0/1 integers, integral floats equal integers, decimals equal floats
    /// rounded to nine decimal places.
    ///
    /// Each form carries a class prefix (`n:` numeric, `s:` text, `x:`
    /// bytes) so that NULL, the string 'NULL' and the string '1' stay
    /// distinct from each other and from numbers.
    pub fn canonical(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => if *b { "n:1" } else { "n:0" }.to_string(),
            Value::Int(i) => format!("n:{i}"),
            Value::Float(f) => format!("n:{}", canonical_float(*f)),
            Value::Decimal(d) => format!(
                "n:{}",
                d.to_f64().map(canonical_float).unwrap_or_else(|| d.to_string())
            ),
            Value::Text(s) => format!("s:{s}"),
            Value::Bytes(b) => format!("x:{}", hex(b)),
        }
    }
}

/// Text form shared by every backend for timestamps without time zone.
///
/// Fractional seconds are only printed when present so that fixtures read
/// back from SQLite (stored as text) compare equal to typed timestamps.
pub fn timestamp_text(ts: &NaiveDateTime) -> String {
    if ts.nanosecond() == 0 {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }
}

fn canonical_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
        return format!("{}", f as i64);
    }
    let rounded = format!("{:.9}", f);
    rounded
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(b) => f.write_str(&hex(b)),
        }
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::Serializer;

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }
}

/// Column metadata as reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A single row of data (indexed by column order)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Canonical key for multiset comparison across engines.
    pub fn canonical_key(&self) -> Vec<String> {
        self.values.iter().map(Value::canonical).collect()
    }
}

/// Query execution result
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// Column information, in the order the engine returned them
    pub columns: Vec<ColumnInfo>,
    /// Result rows
    pub rows: Vec<Row>,
    /// Number of affected rows (for statements that return no rows)
    pub affected_rows: Option<u64>,
    /// Execution time in milliseconds
    pub execution_time_ms: f64,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            affected_rows: None,
            execution_time_ms: 0.0,
        }
    }

    pub fn with_affected_rows(affected: u64, time_ms: f64) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            affected_rows: Some(affected),
            execution_time_ms: time_ms,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Position of the first column named `name` (case-sensitive).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Cells of one column, top to bottom.
    pub fn column_values<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a Value> + 'a> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(move |row| row.values.get(idx).unwrap_or(&Value::Null)),
        )
    }

    /// First cell of the first row, if any.
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.values.first())
    }
}

/// Logical column type inferred from a fixture file.
///
/// Each driver maps these onto its own dialect's type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Boolean,
    BigInt,
    Double,
    Date,
    Timestamp,
    Text,
}

/// Column definition for a table created from a fixture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

/// Fully materialized fixture contents, ready to be written to any engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableData {
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Row>,
}

impl TableData {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
