// SPDX-License-Identifier: Apache-2.0

//! Line plots of query results, rendered as standalone SVG.
//!
//! The x column may be numeric or a timestamp/date (as any of the engines
//! return it); every y column must be numeric. Rows whose x or y is NULL
//! are left out of that series. With `series_by`, one line is drawn per
//! distinct value of that column for each y column.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{QueryResult, Value};
use crate::fixtures::csv_source::parse_timestamp;

const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 540.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 200.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 70.0;
const TICKS: usize = 6;

const PALETTE: [&str; 8] = [
    "#1f77b4", "#d62728", "#2ca02c", "#ff7f0e", "#9467bd", "#8c564b", "#e377c2", "#17becf",
];

/// What to plot from a result
#[derive(Debug, Clone, Default)]
pub struct PlotRequest {
    pub x: String,
    pub y: Vec<String>,
    pub series_by: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    /// Sorted by x
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct PlotData {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// x values are Unix seconds
    pub x_is_time: bool,
    pub series: Vec<Series>,
}

#[derive(Clone, Copy, PartialEq)]
enum XKind {
    Numeric,
    Time,
}

fn column_index(result: &QueryResult, name: &str) -> EngineResult<usize> {
    result.column_index(name).ok_or_else(|| {
        let available: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
        EngineError::plot_failed(format!(
            "column '{name}' is not in the result (available: {})",
            available.join(", ")
        ))
    })
}

fn time_value(value: &Value) -> Option<f64> {
    let Value::Text(text) = value else {
        return None;
    };
    if let Some(ts) = parse_timestamp(text) {
        return Some(ts.and_utc().timestamp_millis() as f64 / 1000.0);
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.timestamp_millis() as f64 / 1000.0)
}

/// Decides how to read the x column from its first non-null cell, then
/// requires every other cell to agree.
fn x_values(result: &QueryResult, idx: usize, name: &str) -> EngineResult<(XKind, Vec<Option<f64>>)> {
    let kind = result
        .rows
        .iter()
        .map(|r| &r.values[idx])
        .find(|v| !v.is_null())
        .map(|v| if v.as_f64().is_some() { XKind::Numeric } else { XKind::Time })
        .unwrap_or(XKind::Numeric);

    let mut xs = Vec::with_capacity(result.rows.len());
    for (row_no, row) in result.rows.iter().enumerate() {
        let value = &row.values[idx];
        if value.is_null() {
            xs.push(None);
            continue;
        }
        let parsed = match kind {
            XKind::Numeric => value.as_f64(),
            XKind::Time => time_value(value),
        };
        match parsed {
            Some(x) => xs.push(Some(x)),
            None => {
                return Err(EngineError::plot_failed(format!(
                    "x column '{name}' must be numeric or a timestamp (row {}: '{value}')",
                    row_no + 1
                )))
            }
        }
    }
    Ok((kind, xs))
}

/// Validates `request` against `result` and extracts the series.
pub fn prepare(result: &QueryResult, request: &PlotRequest) -> EngineResult<PlotData> {
    if request.y.is_empty() {
        return Err(EngineError::plot_failed("at least one y column is required"));
    }

    let x_idx = column_index(result, &request.x)?;
    let y_idx: Vec<usize> = request
        .y
        .iter()
        .map(|name| column_index(result, name))
        .collect::<EngineResult<_>>()?;
    let group_idx = request
        .series_by
        .as_deref()
        .map(|name| column_index(result, name))
        .transpose()?;

    for (name, idx) in request.y.iter().zip(&y_idx) {
        if let Some((row_no, bad)) = result
            .rows
            .iter()
            .enumerate()
            .map(|(i, r)| (i, &r.values[*idx]))
            .find(|(_, v)| !v.is_null() && v.as_f64().is_none())
        {
            return Err(EngineError::plot_failed(format!(
                "y column '{name}' is not numeric (row {}: '{bad}')",
                row_no + 1
            )));
        }
    }

    let (x_kind, xs) = x_values(result, x_idx, &request.x)?;

    // (group, y column) -> points; BTreeMap orders groups canonically
    let mut buckets: BTreeMap<(String, usize), Vec<(f64, f64)>> = BTreeMap::new();
    for (row, x) in result.rows.iter().zip(&xs) {
        let Some(x) = x else { continue };
        let group = group_idx
            .map(|g| row.values[g].to_string())
            .unwrap_or_default();
        for (pos, idx) in y_idx.iter().enumerate() {
            if let Some(y) = row.values[*idx].as_f64() {
                buckets.entry((group.clone(), pos)).or_default().push((*x, y));
            }
        }
    }

    if buckets.is_empty() {
        return Err(EngineError::plot_failed("the result has no plottable rows"));
    }

    let series = buckets
        .into_iter()
        .map(|((group, pos), mut points)| {
            points.sort_by(|a, b| a.0.total_cmp(&b.0));
            let y_name = &request.y[pos];
            let label = match request.series_by.as_deref() {
                Some(by) => format!("{by}={group} {y_name}"),
                None => y_name.clone(),
            };
            Series { label, points }
        })
        .collect();

    Ok(PlotData {
        title: request
            .title
            .clone()
            .unwrap_or_else(|| format!("{} over {}", request.y.join(", "), request.x)),
        x_label: request.x.clone(),
        y_label: request.y.join(", "),
        x_is_time: x_kind == XKind::Time,
        series,
    })
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if lo == hi {
        (lo - 1.0, hi + 1.0)
    } else {
        (lo, hi)
    }
}

fn tick_label(value: f64, as_time: bool) -> String {
    if as_time {
        return DateTime::from_timestamp_millis((value * 1000.0) as i64)
            .map(|dt| dt.naive_utc())
            .map(|dt: NaiveDateTime| dt.format("%m-%d %H:%M").to_string())
            .unwrap_or_default();
    }
    if value.abs() >= 1000.0 || value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

/// Renders the plot as a standalone SVG document.
pub fn render_svg(plot: &PlotData) -> String {
    let (x_min, x_max) = bounds(plot.series.iter().flat_map(|s| s.points.iter().map(|p| p.0)));
    let (y_min, y_max) = bounds(plot.series.iter().flat_map(|s| s.points.iter().map(|p| p.1)));

    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let sx = |x: f64| MARGIN_LEFT + (x - x_min) / (x_max - x_min) * plot_w;
    let sy = |y: f64| MARGIN_TOP + plot_h - (y - y_min) / (y_max - y_min) * plot_h;

    let mut svg = String::new();
    // Writing into a String cannot fail
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif" font-size="12">"#
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="28" text-anchor="middle" font-size="16">{}</text>"#,
        MARGIN_LEFT + plot_w / 2.0,
        escape(&plot.title)
    );

    // Grid and ticks
    for i in 0..TICKS {
        let t = i as f64 / (TICKS - 1) as f64;
        let xv = x_min + t * (x_max - x_min);
        let yv = y_min + t * (y_max - y_min);
        let (px, py) = (sx(xv), sy(yv));
        let _ = writeln!(
            svg,
            r##"<line x1="{px:.1}" y1="{MARGIN_TOP}" x2="{px:.1}" y2="{:.1}" stroke="#e0e0e0"/>"##,
            MARGIN_TOP + plot_h
        );
        let _ = writeln!(
            svg,
            r##"<line x1="{MARGIN_LEFT}" y1="{py:.1}" x2="{:.1}" y2="{py:.1}" stroke="#e0e0e0"/>"##,
            MARGIN_LEFT + plot_w
        );
        let _ = writeln!(
            svg,
            r#"<text x="{px:.1}" y="{:.1}" text-anchor="end" transform="rotate(-30 {px:.1} {:.1})">{}</text>"#,
            MARGIN_TOP + plot_h + 18.0,
            MARGIN_TOP + plot_h + 18.0,
            escape(&tick_label(xv, plot.x_is_time))
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="end">{}</text>"#,
            MARGIN_LEFT - 8.0,
            py + 4.0,
            escape(&tick_label(yv, false))
        );
    }

    // Axes
    let _ = writeln!(
        svg,
        r#"<rect x="{MARGIN_LEFT}" y="{MARGIN_TOP}" width="{plot_w}" height="{plot_h}" fill="none" stroke="black"/>"#
    );
    let _ = writeln!(
        svg,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
        MARGIN_LEFT + plot_w / 2.0,
        HEIGHT - 12.0,
        escape(&plot.x_label)
    );
    let _ = writeln!(
        svg,
        r#"<text x="18" y="{:.1}" text-anchor="middle" transform="rotate(-90 18 {:.1})">{}</text>"#,
        MARGIN_TOP + plot_h / 2.0,
        MARGIN_TOP + plot_h / 2.0,
        escape(&plot.y_label)
    );

    // Series and legend
    for (i, series) in plot.series.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        let points: Vec<String> = series
            .points
            .iter()
            .map(|(x, y)| format!("{:.1},{:.1}", sx(*x), sy(*y)))
            .collect();
        let _ = writeln!(
            svg,
            r#"<polyline fill="none" stroke="{color}" stroke-width="2" points="{}"/>"#,
            points.join(" ")
        );
        for (x, y) in &series.points {
            let _ = writeln!(
                svg,
                r#"<circle cx="{:.1}" cy="{:.1}" r="3" fill="{color}"/>"#,
                sx(*x),
                sy(*y)
            );
        }

        let ly = MARGIN_TOP + 10.0 + i as f64 * 20.0;
        let lx = MARGIN_LEFT + plot_w + 16.0;
        let _ = writeln!(
            svg,
            r#"<line x1="{lx}" y1="{ly}" x2="{}" y2="{ly}" stroke="{color}" stroke-width="2"/>"#,
            lx + 24.0
        );
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}">{}</text>"#,
            lx + 30.0,
            ly + 4.0,
            escape(&series.label)
        );
    }

    svg.push_str("</svg>\n");
    svg
}

/// Validates, renders and writes the plot to `path`.
pub fn write_plot(result: &QueryResult, request: &PlotRequest, path: &Path) -> EngineResult<PlotData> {
    let plot = prepare(result, request)?;
    std::fs::write(path, render_svg(&plot))
        .map_err(|e| EngineError::plot_failed(format!("cannot write {}: {e}", path.display())))?;
    tracing::info!(
        path = %path.display(),
        series = plot.series.len(),
        "plot written"
    );
    Ok(plot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{ColumnInfo, Row};

    fn sensors() -> QueryResult {
        let row = |id: i64, ts: &str, v: Value| {
            Row::new(vec![Value::Int(id), Value::Text(ts.into()), v])
        };
        QueryResult {
            columns: vec![
                ColumnInfo::new("sensor_id", "BIGINT"),
                ColumnInfo::new("timestamp", "TIMESTAMP"),
                ColumnInfo::new("value", "DOUBLE"),
            ],
            rows: vec![
                row(2, "2024-05-01 10:00:00", Value::Float(5.0)),
                row(1, "2024-05-01 11:00:00", Value::Float(2.0)),
                row(1, "2024-05-01 10:00:00", Value::Float(1.0)),
                row(2, "2024-05-01 11:00:00", Value::Null),
            ],
            affected_rows: None,
            execution_time_ms: 0.0,
        }
    }

    fn request(y: &[&str]) -> PlotRequest {
        PlotRequest {
            x: "timestamp".into(),
            y: y.iter().map(|s| s.to_string()).collect(),
            series_by: Some("sensor_id".into()),
            title: None,
        }
    }

    #[test]
    fn test_series_per_group_sorted_by_x() {
        let plot = prepare(&sensors(), &request(&["value"])).unwrap();
        assert!(plot.x_is_time);
        assert_eq!(plot.series.len(), 2);
        assert_eq!(plot.series[0].label, "sensor_id=1 value");
        let ys: Vec<f64> = plot.series[0].points.iter().map(|p| p.1).collect();
        assert_eq!(ys, vec![1.0, 2.0]);
        // NULL value skipped
        assert_eq!(plot.series[1].points.len(), 1);
    }

    #[test]
    fn test_missing_column_fails() {
        let err = prepare(&sensors(), &request(&["mv_avg_val"])).unwrap_err();
        match err {
            EngineError::PlotFailed { message } => assert!(message.contains("mv_avg_val")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_numeric_y_fails() {
        let mut req = request(&["timestamp"]);
        req.x = "sensor_id".into();
        let err = prepare(&sensors(), &req).unwrap_err();
        assert!(matches!(err, EngineError::PlotFailed { .. }));
    }

    #[test]
    fn test_empty_y_fails() {
        assert!(prepare(&sensors(), &request(&[])).is_err());
    }

    #[test]
    fn test_svg_contains_series() {
        let plot = prepare(&sensors(), &request(&["value"])).unwrap();
        let svg = render_svg(&plot);
        assert!(svg.starts_with("<svg"));
        assert_eq!(svg.matches("<polyline").count(), 2);
        assert!(svg.contains("sensor_id=2 value"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_write_plot_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot.svg");
        write_plot(&sensors(), &request(&["value"]), &path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("<svg"));
    }
}
