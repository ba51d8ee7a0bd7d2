// SPDX-License-Identifier: Apache-2.0

//! `query`, `compare` and `plot`.

use std::io::Write;
use std::path::Path;

use crate::dispatch::Comparison;
use crate::engine::error::EngineError;
use crate::engine::types::BackendKind;
use crate::harness::HarnessContext;
use crate::present::plot::{self, PlotRequest};
use crate::present::{format_table, OutputFormat, ResultFormatter};

use super::error::{CommandError, CommandResult};

pub async fn query(
    ctx: &HarnessContext,
    engine: BackendKind,
    format: OutputFormat,
    sql: &str,
    out: &mut (dyn Write + Send),
) -> CommandResult<()> {
    let result = ctx.query(engine, sql).await?;
    let text = ResultFormatter::new(format).format_result(&result)?;
    writeln!(out, "{text}")?;
    Ok(())
}

/// Runs `sql` everywhere; disagreement is reported as a failure.
pub async fn compare(
    ctx: &HarnessContext,
    sql: &str,
    json: bool,
    out: &mut (dyn Write + Send),
) -> CommandResult<()> {
    let comparison = ctx.compare(sql).await;

    if json {
        let text = serde_json::to_string_pretty(&comparison)
            .map_err(|e| EngineError::internal(format!("cannot serialize comparison: {e}")))?;
        writeln!(out, "{text}")?;
    } else {
        for answer in &comparison.answers {
            writeln!(out, "--- {}", answer.backend)?;
            match (&answer.result, &answer.error) {
                (Some(result), _) => writeln!(out, "{}\n", format_table(result))?,
                (None, Some(error)) => writeln!(out, "error: {error}\n")?,
                (None, None) => writeln!(out, "(no answer)\n")?,
            }
        }
        writeln!(out, "{}", verdict(&comparison))?;
    }

    if comparison.agrees() {
        Ok(())
    } else {
        Err(CommandError::failed("engines disagree"))
    }
}

/// One-line summary of a comparison
pub fn verdict(comparison: &Comparison) -> String {
    if comparison.agrees() {
        return format!("All {} engine(s) agree.", comparison.answers.len());
    }

    let mut parts: Vec<String> = comparison
        .groups
        .iter()
        .map(|group| {
            group
                .iter()
                .map(BackendKind::to_string)
                .collect::<Vec<_>>()
                .join(" = ")
        })
        .collect();
    parts.extend(
        comparison
            .answers
            .iter()
            .filter(|a| !a.success)
            .map(|a| format!("{} (error)", a.backend)),
    );
    format!("Engines disagree: {}", parts.join(" | "))
}

pub async fn plot(
    ctx: &HarnessContext,
    engine: BackendKind,
    request: &PlotRequest,
    sql: &str,
    path: &Path,
    out: &mut (dyn Write + Send),
) -> CommandResult<()> {
    let result = ctx.query(engine, sql).await?;
    let data = plot::write_plot(&result, request, path)?;
    let points: usize = data.series.iter().map(|s| s.points.len()).sum();
    writeln!(
        out,
        "Wrote {} ({} series, {} points)",
        path.display(),
        data.series.len(),
        points
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::EngineAnswer;

    fn answer(backend: BackendKind, success: bool) -> EngineAnswer {
        EngineAnswer {
            backend,
            success,
            result: None,
            error: (!success).then(|| "boom".to_string()),
        }
    }

    #[test]
    fn test_verdict_agreement() {
        let comparison = Comparison {
            answers: vec![answer(BackendKind::DuckDb, true), answer(BackendKind::Sqlite, true)],
            groups: vec![vec![BackendKind::DuckDb, BackendKind::Sqlite]],
        };
        assert_eq!(verdict(&comparison), "All 2 engine(s) agree.");
    }

    #[test]
    fn test_verdict_lists_groups_and_errors() {
        let comparison = Comparison {
            answers: vec![
                answer(BackendKind::DuckDb, true),
                answer(BackendKind::Postgres, true),
                answer(BackendKind::Sqlite, false),
            ],
            groups: vec![vec![BackendKind::DuckDb], vec![BackendKind::Postgres]],
        };
        assert_eq!(
            verdict(&comparison),
            "Engines disagree: DuckDB | PostgreSQL | SQLite (error)"
        );
    }
}
