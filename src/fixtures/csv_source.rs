// SPDX-License-Identifier: Apache-2.0

//! CSV fixture reader with column type inference.
//!
//! The whole file is read up front so every engine receives exactly the
//! same typed rows. Inference looks at every non-empty cell in a column and
//! picks the narrowest type that accepts all of them:
//! Boolean, BigInt, Double, Date, Timestamp, then Text.
//! An empty cell is NULL and never constrains the type.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{timestamp_text, ColumnDef, ColumnType, Row, TableData, Value};

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Reads and types one fixture file.
pub fn read_table(path: &Path) -> EngineResult<TableData> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| EngineError::fixture_read(path, e.to_string()))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| EngineError::fixture_read(path, e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(EngineError::fixture_read(path, "missing header row"));
    }
    if let Some(blank) = headers.iter().position(|h| h.is_empty()) {
        return Err(EngineError::fixture_read(
            path,
            format!("column {} has an empty header", blank + 1),
        ));
    }

    let mut cells: Vec<Vec<Option<String>>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| EngineError::fixture_read(path, e.to_string()))?;
        cells.push(
            record
                .iter()
                .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                .collect(),
        );
    }

    let columns: Vec<ColumnDef> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| ColumnDef {
            name: name.clone(),
            column_type: infer_column(cells.iter().filter_map(|row| row[idx].as_deref())),
        })
        .collect();

    let rows = cells
        .into_iter()
        .map(|row| {
            Row::new(
                row.into_iter()
                    .zip(&columns)
                    .map(|(cell, col)| convert_cell(cell.as_deref(), col.column_type))
                    .collect(),
            )
        })
        .collect();

    tracing::debug!(
        path = %path.display(),
        columns = ?columns.iter().map(|c| (c.name.as_str(), c.column_type)).collect::<Vec<_>>(),
        "fixture typed"
    );

    Ok(TableData { columns, rows })
}

/// Candidate types still consistent with every cell seen so far
#[derive(Debug, Clone, Copy)]
struct Candidates {
    boolean: bool,
    bigint: bool,
    double: bool,
    date: bool,
    timestamp: bool,
    seen: bool,
}

impl Candidates {
    fn all() -> Self {
        Self {
            boolean: true,
            bigint: true,
            double: true,
            date: true,
            timestamp: true,
            seen: false,
        }
    }

    fn observe(&mut self, cell: &str) {
        self.seen = true;
        self.boolean &= parse_bool(cell).is_some();
        self.bigint &= cell.parse::<i64>().is_ok();
        self.double &= parse_double(cell).is_some();
        self.date &= NaiveDate::parse_from_str(cell, DATE_FORMAT).is_ok();
        self.timestamp &= parse_timestamp(cell).is_some();
    }

    fn resolve(self) -> ColumnType {
        if !self.seen {
            ColumnType::Text
        } else if self.boolean {
            ColumnType::Boolean
        } else if self.bigint {
            ColumnType::BigInt
        } else if self.double {
            ColumnType::Double
        } else if self.date {
            ColumnType::Date
        } else if self.timestamp {
            ColumnType::Timestamp
        } else {
            ColumnType::Text
        }
    }
}

fn infer_column<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut candidates = Candidates::all();
    for cell in cells {
        candidates.observe(cell);
    }
    candidates.resolve()
}

fn parse_bool(cell: &str) -> Option<bool> {
    if cell.eq_ignore_ascii_case("true") {
        Some(true)
    } else if cell.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

// "inf"/"NaN" parse as f64 but are not numbers anyone writes in a fixture
fn parse_double(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Timestamps without zone; a bare date counts as midnight so mixed
/// date/timestamp columns widen to Timestamp.
pub(crate) fn parse_timestamp(cell: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(cell, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(cell, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn convert_cell(cell: Option<&str>, column_type: ColumnType) -> Value {
    let Some(cell) = cell else {
        return Value::Null;
    };
    // Inference guarantees the parse succeeds; fall back to text regardless
    let typed = match column_type {
        ColumnType::Boolean => parse_bool(cell).map(Value::Bool),
        ColumnType::BigInt => cell.parse::<i64>().ok().map(Value::Int),
        ColumnType::Double => parse_double(cell).map(Value::Float),
        ColumnType::Date => NaiveDate::parse_from_str(cell, DATE_FORMAT)
            .ok()
            .map(|d| Value::Text(d.format(DATE_FORMAT).to_string())),
        ColumnType::Timestamp => parse_timestamp(cell).map(|ts| Value::Text(timestamp_text(&ts))),
        ColumnType::Text => None,
    };
    typed.unwrap_or_else(|| Value::Text(cell.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    fn types(data: &TableData) -> Vec<ColumnType> {
        data.columns.iter().map(|c| c.column_type).collect()
    }

    #[test]
    fn test_infers_types_per_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "mixed.csv",
            "id,flag,score,day,at,label\n\
             1,true,1.5,2024-05-01,2024-05-01 10:00:00,x\n\
             2,FALSE,2,2024-05-02,2024-05-01T11:30:00.250,y\n",
        );

        let data = read_table(&path).unwrap();
        assert_eq!(
            types(&data),
            vec![
                ColumnType::BigInt,
                ColumnType::Boolean,
                ColumnType::Double,
                ColumnType::Date,
                ColumnType::Timestamp,
                ColumnType::Text,
            ]
        );
        assert_eq!(data.rows[1].values[1], Value::Bool(false));
        assert_eq!(data.rows[1].values[2], Value::Float(2.0));
        assert_eq!(
            data.rows[1].values[4],
            Value::Text("2024-05-01 11:30:00.250000".into())
        );
    }

    #[test]
    fn test_empty_cells_are_null_and_do_not_widen() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "employee.csv",
            "emp_id,emp_name,boss_id\n1,Ann,\n2,Bob,1\n",
        );

        let data = read_table(&path).unwrap();
        assert_eq!(
            types(&data),
            vec![ColumnType::BigInt, ColumnType::Text, ColumnType::BigInt]
        );
        assert_eq!(data.rows[0].values[2], Value::Null);
        assert_eq!(data.rows[1].values[2], Value::Int(1));
    }

    #[test]
    fn test_all_null_column_is_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "blank.csv", "a,b\n1,\n2,\n");
        let data = read_table(&path).unwrap();
        assert_eq!(types(&data), vec![ColumnType::BigInt, ColumnType::Text]);
    }

    #[test]
    fn test_ragged_rows_are_a_fixture_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "ragged.csv", "a,b\n1,2\n3\n");
        let err = read_table(&path).unwrap_err();
        assert!(matches!(err, EngineError::FixtureRead { .. }), "{err:?}");
    }

    #[test]
    fn test_missing_file_is_a_fixture_error() {
        let err = read_table(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, EngineError::FixtureRead { .. }));
    }
}
