// SPDX-License-Identifier: Apache-2.0

//! SQL Generator
//!
//! Generates backend-specific DDL and INSERT statements used to replicate a
//! fixture onto each engine. Identifiers come in as allow-listed
//! [`TableName`]s or fixture header names and are always quoted; values are
//! rendered as dialect-escaped literals.

use crate::engine::identifier::TableName;
use crate::engine::types::{ColumnDef, ColumnType, TableData, Value};

/// Rows per generated INSERT statement.
pub const INSERT_BATCH_SIZE: usize = 500;

/// SQL dialect for each backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    DuckDb,
    Postgres,
    Sqlite,
}

impl SqlDialect {
    /// Quote an identifier according to the dialect
    pub fn quote_ident(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Type name used when creating a fixture column.
    ///
    /// SQLite keeps the declared names pandas would emit; its type affinity
    /// turns BOOLEAN into 0/1 integers and TIMESTAMP into text.
    pub fn column_type(&self, column_type: ColumnType) -> &'static str {
        match (self, column_type) {
            (_, ColumnType::Boolean) => "BOOLEAN",
            (_, ColumnType::BigInt) => "BIGINT",
            (SqlDialect::DuckDb, ColumnType::Double) => "DOUBLE",
            (SqlDialect::Postgres, ColumnType::Double) => "DOUBLE PRECISION",
            (SqlDialect::Sqlite, ColumnType::Double) => "FLOAT",
            (_, ColumnType::Date) => "DATE",
            (_, ColumnType::Timestamp) => "TIMESTAMP",
            (SqlDialect::DuckDb, ColumnType::Text) => "VARCHAR",
            (_, ColumnType::Text) => "TEXT",
        }
    }

    /// Format a value as a SQL literal
    pub fn format_value(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => match self {
                SqlDialect::DuckDb | SqlDialect::Postgres => {
                    if *b { "TRUE" } else { "FALSE" }.to_string()
                }
                SqlDialect::Sqlite => if *b { "1" } else { "0" }.to_string(),
            },
            Value::Int(i) => i.to_string(),
            Value::Float(f) => {
                if f.is_nan() {
                    match self {
                        SqlDialect::Sqlite => "NULL".to_string(),
                        _ => "'NaN'".to_string(),
                    }
                } else if f.is_infinite() {
                    match self {
                        SqlDialect::Sqlite => if *f > 0.0 { "9e999" } else { "-9e999" }.to_string(),
                        _ => if *f > 0.0 { "'Infinity'" } else { "'-Infinity'" }.to_string(),
                    }
                } else {
                    format!("{:?}", f)
                }
            }
            Value::Decimal(d) => d.to_string(),
            Value::Text(s) => self.escape_string(s),
            Value::Bytes(b) => self.format_bytes(b),
        }
    }

    /// Escape a string for SQL
    fn escape_string(&self, s: &str) -> String {
        match self {
            SqlDialect::Postgres => {
                let mut escaped = String::with_capacity(s.len());
                let mut needs_e_prefix = false;

                for ch in s.chars() {
                    match ch {
                        '\\' => {
                            needs_e_prefix = true;
                            escaped.push_str("\\\\");
                        }
                        '\'' => escaped.push_str("''"),
                        '\n' => {
                            needs_e_prefix = true;
                            escaped.push_str("\\n");
                        }
                        '\r' => {
                            needs_e_prefix = true;
                            escaped.push_str("\\r");
                        }
                        '\t' => {
                            needs_e_prefix = true;
                            escaped.push_str("\\t");
                        }
                        _ => escaped.push(ch),
                    }
                }

                if needs_e_prefix {
                    format!("E'{}'", escaped)
                } else {
                    format!("'{}'", escaped)
                }
            }
            SqlDialect::DuckDb | SqlDialect::Sqlite => {
                format!("'{}'", s.replace('\'', "''"))
            }
        }
    }

    /// Format bytes as a SQL literal
    fn format_bytes(&self, bytes: &[u8]) -> String {
        let hex_string: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        match self {
            SqlDialect::Postgres => format!("'\\x{}'::bytea", hex_string),
            SqlDialect::DuckDb => {
                let escaped: String = bytes.iter().map(|b| format!("\\x{:02X}", b)).collect();
                format!("'{}'::BLOB", escaped)
            }
            SqlDialect::Sqlite => format!("X'{}'", hex_string),
        }
    }
}

/// `DROP TABLE IF EXISTS` for an allow-listed table.
pub fn drop_table_sql(dialect: SqlDialect, table: &TableName) -> String {
    format!("DROP TABLE IF EXISTS {}", dialect.quote_ident(table.as_str()))
}

/// `CREATE TABLE` with columns in fixture order. No constraints are declared.
pub fn create_table_sql(dialect: SqlDialect, table: &TableName, columns: &[ColumnDef]) -> String {
    let col_defs: Vec<String> = columns
        .iter()
        .map(|c| {
            format!(
                "{} {}",
                dialect.quote_ident(&c.name),
                dialect.column_type(c.column_type)
            )
        })
        .collect();

    format!(
        "CREATE TABLE {} ({})",
        dialect.quote_ident(table.as_str()),
        col_defs.join(", ")
    )
}

/// Multi-row INSERT statements covering every row of `data`.
pub fn insert_statements(dialect: SqlDialect, table: &TableName, data: &TableData) -> Vec<String> {
    if data.rows.is_empty() || data.columns.is_empty() {
        return Vec::new();
    }

    let column_list = data
        .columns
        .iter()
        .map(|c| dialect.quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let width = data.columns.len();

    data.rows
        .chunks(INSERT_BATCH_SIZE)
        .map(|chunk| {
            let tuples: Vec<String> = chunk
                .iter()
                .map(|row| {
                    let literals: Vec<String> = (0..width)
                        .map(|idx| dialect.format_value(row.values.get(idx).unwrap_or(&Value::Null)))
                        .collect();
                    format!("({})", literals.join(", "))
                })
                .collect();
            format!(
                "INSERT INTO {} ({}) VALUES {}",
                dialect.quote_ident(table.as_str()),
                column_list,
                tuples.join(", ")
            )
        })
        .collect()
}

/// `SELECT count(*)` for an allow-listed table.
pub fn count_rows_sql(dialect: SqlDialect, table: &TableName) -> String {
    format!("SELECT count(*) FROM {}", dialect.quote_ident(table.as_str()))
}

/// `SELECT *` for an allow-listed table.
pub fn select_all_sql(dialect: SqlDialect, table: &TableName) -> String {
    format!("SELECT * FROM {}", dialect.quote_ident(table.as_str()))
}
