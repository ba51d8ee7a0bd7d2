//! DataEngine trait definition
//!
//! This is the capability every backend adapter implements. A value of this
//! trait is an engine handle: it owns one open session to its backend for
//! the lifetime of the process. Opening the session is each driver's
//! `connect` constructor; everything after that goes through this trait.

use async_trait::async_trait;

use crate::engine::error::EngineResult;
use crate::engine::identifier::TableName;
use crate::engine::types::{BackendKind, QueryResult, TableData};

#[async_trait]
pub trait DataEngine: Send + Sync {
    /// Which backend this handle is bound to
    fn kind(&self) -> BackendKind;

    /// Minimal round-trip proving the backend answers
    async fn probe(&self) -> EngineResult<()>;

    /// Submits literal query text and returns the engine's tabular answer
    ///
    /// Failures come back as `QueryFailed` with the engine diagnostic
    /// untouched. The text is neither rewritten nor cached.
    async fn execute(&self, query: &str) -> EngineResult<QueryResult>;

    /// Every row of `table`, in whatever order the engine yields them
    async fn fetch_table(&self, table: &TableName) -> EngineResult<QueryResult>;

    /// Drops `table` if present; absence is not an error
    async fn drop_table_if_exists(&self, table: &TableName) -> EngineResult<()>;

    /// Drops, recreates and fills `table` from `data` in one local transaction
    ///
    /// Returns the number of rows inserted.
    async fn replace_table(&self, table: &TableName, data: &TableData) -> EngineResult<u64>;

    /// `SELECT count(*)` on `table`
    async fn count_rows(&self, table: &TableName) -> EngineResult<u64>;

    /// Releases the session
    async fn close(&self);
}
