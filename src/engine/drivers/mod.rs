// SPDX-License-Identifier: Apache-2.0

// Database drivers module

pub mod duckdb;
pub mod postgres;
pub mod sqlite;

/// The engine's own diagnostic for a SQLx error.
///
/// Database errors carry the server/library message without SQLx's
/// "error returned from database:" wrapper; anything else (I/O, protocol,
/// pool) falls back to SQLx's display text.
pub(crate) fn sqlx_diagnostic(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db) => db.message().to_string(),
        other => other.to_string(),
    }
}
