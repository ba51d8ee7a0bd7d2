// SPDX-License-Identifier: Apache-2.0

//! Replicates fixtures into every enabled engine.
//!
//! Each fixture file is read once; the typed rows are then written to each
//! engine in registry order. A failure is scoped to one (table, engine)
//! pair: it is recorded and the loader moves on. Nothing is rolled back on
//! the engines that already succeeded.

use std::io::Write;

use serde::Serialize;
use tracing::instrument;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::identifier::TableName;
use crate::engine::registry::EngineRegistry;
use crate::engine::traits::DataEngine;
use crate::engine::types::{BackendKind, TableData};
use crate::fixtures::csv_source;
use crate::fixtures::Fixture;

const OK_MARK: &str = "\u{2713}";
const FAIL_MARK: &str = "\u{2717}";

/// What happened to one table on one engine
#[derive(Debug)]
pub struct LoadOutcome {
    pub table: TableName,
    pub backend: BackendKind,
    pub result: EngineResult<u64>,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub outcomes: Vec<LoadOutcome>,
    /// Fixtures whose file could not be read; no engine was touched for them
    pub unreadable: Vec<(TableName, EngineError)>,
}

impl LoadReport {
    pub fn is_success(&self) -> bool {
        self.unreadable.is_empty() && self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &EngineError> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err())
            .chain(self.unreadable.iter().map(|(_, e)| e))
    }

    pub fn rows_loaded(&self, table: &str, backend: BackendKind) -> Option<u64> {
        self.outcomes
            .iter()
            .find(|o| o.table.as_str() == table && o.backend == backend)
            .and_then(|o| o.result.as_ref().ok().copied())
    }
}

/// Loads every fixture into every engine, writing progress markers to `out`.
///
/// Only failures that prevent reporting (writing to `out`) abort the run.
pub async fn load_all(
    engines: &EngineRegistry,
    fixtures: &[Fixture],
    out: &mut (dyn Write + Send),
) -> EngineResult<LoadReport> {
    let mut report = LoadReport::default();

    for fixture in fixtures {
        write!(out, "Creating table {} on {} engine(s). ", fixture.table, engines.len())
            .map_err(report_io)?;

        let data = match csv_source::read_table(&fixture.path) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(table = %fixture.table, error = %e, "fixture unreadable");
                writeln!(out, "{FAIL_MARK} {e}").map_err(report_io)?;
                report.unreadable.push((fixture.table.clone(), e));
                continue;
            }
        };

        let mut first = true;
        for engine in engines.iter() {
            let result = load_one(engine.as_ref(), &fixture.table, &data).await;
            let mark = if result.is_ok() { OK_MARK } else { FAIL_MARK };
            let sep = if first { "" } else { " " };
            write!(out, "{sep}{} {mark}.", engine.kind()).map_err(report_io)?;
            first = false;

            report.outcomes.push(LoadOutcome {
                table: fixture.table.clone(),
                backend: engine.kind(),
                result,
            });
        }
        writeln!(out).map_err(report_io)?;
    }

    Ok(report)
}

#[instrument(skip(engine, data), fields(engine = %engine.kind(), table = %table, rows = data.row_count()))]
async fn load_one(engine: &dyn DataEngine, table: &TableName, data: &TableData) -> EngineResult<u64> {
    match engine.replace_table(table, data).await {
        Ok(rows) => {
            tracing::info!(inserted = rows, "table loaded");
            Ok(rows)
        }
        Err(e) => {
            let e = e.into_load_failure(table.as_str());
            tracing::error!(error = %e, "table load failed");
            Err(e)
        }
    }
}

fn report_io(e: std::io::Error) -> EngineError {
    EngineError::internal(format!("cannot write load progress: {e}"))
}

/// `count(*)` of one table on every engine
#[derive(Debug, Serialize)]
pub struct CountCheck {
    pub table: TableName,
    pub counts: Vec<(BackendKind, Result<u64, String>)>,
}

impl CountCheck {
    /// True when every engine answered with the same count
    pub fn agrees(&self) -> bool {
        let mut answered = self.counts.iter().map(|(_, c)| c.as_ref().ok());
        match answered.next() {
            Some(Some(first)) => answered.all(|c| c == Some(first)),
            _ => false,
        }
    }
}

/// Counts rows of every fixture table on every engine.
pub async fn verify_counts(engines: &EngineRegistry, fixtures: &[Fixture]) -> Vec<CountCheck> {
    let mut checks = Vec::with_capacity(fixtures.len());
    for fixture in fixtures {
        let mut counts = Vec::with_capacity(engines.len());
        for engine in engines.iter() {
            let count = engine
                .count_rows(&fixture.table)
                .await
                .map_err(|e| e.to_string());
            counts.push((engine.kind(), count));
        }
        let check = CountCheck {
            table: fixture.table.clone(),
            counts,
        };
        if !check.agrees() {
            tracing::warn!(table = %check.table, counts = ?check.counts, "row counts differ");
        }
        checks.push(check);
    }
    checks
}
