// SPDX-License-Identifier: Apache-2.0

//! Error types for the sqltour engine layer
//!
//! Driver-specific errors are mapped to these variants at the driver seam.
//! Engine diagnostics are carried verbatim in `message`; nothing here
//! translates one backend's vocabulary into another's.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::types::BackendKind;

/// Unified error type for all engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{backend} connection failed: {message}")]
    ConnectionFailed { backend: BackendKind, message: String },

    #[error("{backend} authentication failed: {message}")]
    AuthenticationFailed { backend: BackendKind, message: String },

    #[error("{backend} rejected the query: {message}")]
    QueryFailed { backend: BackendKind, message: String },

    #[error("loading table '{table}' into {backend} failed: {message}")]
    LoadFailed {
        backend: BackendKind,
        table: String,
        message: String,
    },

    #[error("invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    #[error("cannot read fixture {}: {message}", path.display())]
    FixtureRead { path: PathBuf, message: String },

    #[error("plot request failed: {message}")]
    PlotFailed { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl EngineError {
    pub fn connection_failed(backend: BackendKind, msg: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            backend,
            message: msg.into(),
        }
    }

    pub fn auth_failed(backend: BackendKind, msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            backend,
            message: msg.into(),
        }
    }

    pub fn query_failed(backend: BackendKind, msg: impl Into<String>) -> Self {
        Self::QueryFailed {
            backend,
            message: msg.into(),
        }
    }

    pub fn load_failed(
        backend: BackendKind,
        table: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::LoadFailed {
            backend,
            table: table.into(),
            message: msg.into(),
        }
    }

    pub fn invalid_identifier(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn fixture_read(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::FixtureRead {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn plot_failed(msg: impl Into<String>) -> Self {
        Self::PlotFailed { message: msg.into() }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal { message: msg.into() }
    }

    /// True for errors caused by an unreachable or misconfigured backend.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::AuthenticationFailed { .. }
        )
    }

    /// The backend this error is attributed to, if any.
    pub fn backend(&self) -> Option<BackendKind> {
        match self {
            Self::ConnectionFailed { backend, .. }
            | Self::AuthenticationFailed { backend, .. }
            | Self::QueryFailed { backend, .. }
            | Self::LoadFailed { backend, .. } => Some(*backend),
            _ => None,
        }
    }

    /// Re-attributes a query-level failure to a fixture load.
    ///
    /// Statements issued while replacing a table surface as `QueryFailed`;
    /// the loader reports them per (table, backend).
    pub fn into_load_failure(self, table: &str) -> Self {
        match self {
            Self::QueryFailed { backend, message } => Self::load_failed(backend, table, message),
            other => other,
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_failures_keep_the_engine_message_verbatim() {
        let err = EngineError::query_failed(
            BackendKind::Sqlite,
            "near \"TABLE\": syntax error",
        );
        match &err {
            EngineError::QueryFailed { message, .. } => {
                assert_eq!(message, "near \"TABLE\": syntax error")
            }
            other => panic!("unexpected variant: {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "SQLite rejected the query: near \"TABLE\": syntax error"
        );
    }

    #[test]
    fn connection_class_errors_are_detected() {
        assert!(EngineError::connection_failed(BackendKind::Postgres, "refused").is_connection());
        assert!(EngineError::auth_failed(BackendKind::Postgres, "bad password").is_connection());
        assert!(!EngineError::query_failed(BackendKind::Postgres, "oops").is_connection());
    }

    #[test]
    fn query_failure_becomes_load_failure_for_table() {
        let err = EngineError::query_failed(BackendKind::DuckDb, "Catalog Error")
            .into_load_failure("t1");
        match err {
            EngineError::LoadFailed {
                backend,
                table,
                message,
            } => {
                assert_eq!(backend, BackendKind::DuckDb);
                assert_eq!(table, "t1");
                assert_eq!(message, "Catalog Error");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
