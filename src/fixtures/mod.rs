// SPDX-License-Identifier: Apache-2.0

//! Fixture discovery and loading.
//!
//! A fixture is one `*.csv` file; its base name is the table it becomes.

pub mod csv_source;
pub mod loader;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::identifier::TableName;

pub use loader::{load_all, verify_counts, CountCheck, LoadOutcome, LoadReport};

const FIXTURE_EXTENSION: &str = "csv";

/// One source file and the table it maps to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fixture {
    pub table: TableName,
    pub path: PathBuf,
}

/// A file that looked like a fixture but cannot become a table
#[derive(Debug)]
pub struct RejectedFixture {
    pub path: PathBuf,
    pub error: EngineError,
}

/// Result of scanning the fixtures directory
#[derive(Debug, Default)]
pub struct Discovery {
    /// Sorted by table name so every run loads in the same order
    pub fixtures: Vec<Fixture>,
    pub rejected: Vec<RejectedFixture>,
}

/// Lists the `*.csv` files directly inside `dir`.
///
/// Files whose base name is not a safe identifier are rejected (and
/// logged) rather than failing the whole scan.
pub fn discover_fixtures(dir: &Path) -> EngineResult<Discovery> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| EngineError::fixture_read(dir, format!("cannot list fixtures directory: {e}")))?;

    let mut discovery = Discovery::default();
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::fixture_read(dir, e.to_string()))?;
        let path = entry.path();

        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(FIXTURE_EXTENSION))
            .unwrap_or(false);
        if !is_csv || !path.is_file() {
            continue;
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        match TableName::parse(&stem) {
            Ok(table) => discovery.fixtures.push(Fixture { table, path }),
            Err(error) => {
                tracing::warn!(path = %path.display(), error = %error, "skipping fixture");
                discovery.rejected.push(RejectedFixture { path, error });
            }
        }
    }

    discovery
        .fixtures
        .sort_by(|a, b| a.table.as_str().cmp(b.table.as_str()));
    discovery.rejected.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(discovery)
}
