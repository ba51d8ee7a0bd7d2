// SPDX-License-Identifier: Apache-2.0

//! Output formatters for query results
//!
//! Text grid for reading in a terminal, CSV and JSON for piping elsewhere,
//! and SVG line plots (see [`plot`]).

pub mod plot;

use clap::ValueEnum;
use serde::Serialize;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{ColumnInfo, QueryResult, Value};

/// Maximum column width before truncation
const MAX_COLUMN_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

/// Formats query results for display
pub struct ResultFormatter {
    format: OutputFormat,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_result(&self, result: &QueryResult) -> EngineResult<String> {
        match self.format {
            OutputFormat::Table => Ok(format_table(result)),
            OutputFormat::Csv => format_csv(result),
            OutputFormat::Json => format_json(result),
        }
    }
}

/// Truncate a string to max width with ellipsis
fn truncate_value(value: &str, max_width: usize) -> String {
    if value.chars().count() <= max_width {
        value.to_string()
    } else if max_width <= 3 {
        value.chars().take(max_width).collect()
    } else {
        let take = max_width - 3;
        format!("{}...", value.chars().take(take).collect::<String>())
    }
}

fn pad(value: &str, width: usize) -> String {
    let len = value.chars().count();
    format!("{}{}", value, " ".repeat(width.saturating_sub(len)))
}

fn border(widths: &[usize], left: char, mid: char, right: char) -> String {
    let mut line = String::new();
    line.push(left);
    for (idx, width) in widths.iter().enumerate() {
        line.push_str(&"─".repeat(width + 2));
        line.push(if idx == widths.len() - 1 { right } else { mid });
    }
    line.push('\n');
    line
}

/// Boxed text grid followed by a psql-style row count and timing line.
pub fn format_table(result: &QueryResult) -> String {
    if result.columns.is_empty() {
        return format!(
            "Query OK, {} rows affected\n\nTook: {:.3} ms",
            result.affected_rows.unwrap_or(0),
            result.execution_time_ms
        );
    }

    let string_rows: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.values.iter().map(Value::to_string).collect())
        .collect();

    let mut col_widths: Vec<usize> = result.columns.iter().map(|c| c.name.chars().count()).collect();
    for srow in &string_rows {
        for (i, value) in srow.iter().enumerate() {
            if let Some(width) = col_widths.get_mut(i) {
                *width = (*width).max(value.chars().count());
            }
        }
    }
    for width in col_widths.iter_mut() {
        *width = (*width).clamp(1, MAX_COLUMN_WIDTH);
    }

    let mut output = border(&col_widths, '┌', '┬', '┐');

    output.push('│');
    for (col, width) in result.columns.iter().zip(&col_widths) {
        output.push(' ');
        output.push_str(&pad(&truncate_value(&col.name, *width), *width));
        output.push_str(" │");
    }
    output.push('\n');

    output.push_str(&border(&col_widths, '├', '┼', '┤'));

    for srow in &string_rows {
        output.push('│');
        for (value, width) in srow.iter().zip(&col_widths) {
            output.push(' ');
            output.push_str(&pad(&truncate_value(value, *width), *width));
            output.push_str(" │");
        }
        output.push('\n');
    }

    output.push_str(&border(&col_widths, '└', '┴', '┘'));

    let row_count = string_rows.len();
    let row_label = if row_count == 1 { "row" } else { "rows" };
    output.push_str(&format!("({} {})\n\nTook: {:.3} ms", row_count, row_label, result.execution_time_ms));
    output
}

/// CSV with a header row; NULL is an empty field
pub fn format_csv(result: &QueryResult) -> EngineResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let csv_err = |e: csv::Error| EngineError::internal(format!("CSV output failed: {e}"));

    writer
        .write_record(result.columns.iter().map(|c| c.name.as_str()))
        .map_err(csv_err)?;
    for row in &result.rows {
        writer
            .write_record(row.values.iter().map(|v| match v {
                Value::Null => String::new(),
                other => other.to_string(),
            }))
            .map_err(csv_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| EngineError::internal(format!("CSV output failed: {e}")))?;
    String::from_utf8(bytes).map_err(|e| EngineError::internal(format!("CSV output failed: {e}")))
}

#[derive(Serialize)]
struct JsonResult<'a> {
    columns: &'a [ColumnInfo],
    rows: Vec<&'a [Value]>,
    row_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    affected_rows: Option<u64>,
}

/// Pretty JSON: columns with engine type names, rows as arrays
pub fn format_json(result: &QueryResult) -> EngineResult<String> {
    let body = JsonResult {
        columns: &result.columns,
        rows: result.rows.iter().map(|r| r.values.as_slice()).collect(),
        row_count: result.row_count(),
        affected_rows: result.affected_rows,
    };
    serde_json::to_string_pretty(&body)
        .map_err(|e| EngineError::internal(format!("JSON output failed: {e}")))
}
