// Data Engine Module
// One abstraction over the DuckDB, PostgreSQL and SQLite backends

pub mod drivers;
pub mod error;
pub mod identifier;
pub mod provider;
pub mod registry;
pub mod sql_generator;
pub mod statement;
pub mod traits;
pub mod types;

pub use error::{EngineError, EngineResult};
pub use identifier::TableName;
pub use provider::{connect_all, connect_engine};
pub use registry::EngineRegistry;
pub use traits::DataEngine;
pub use types::*;
