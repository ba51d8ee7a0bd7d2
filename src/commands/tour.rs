// SPDX-License-Identifier: Apache-2.0

//! `tour`: runs lessons from the catalog and shows how each engine answers.

use std::io::Write;
use std::path::Path;

use crate::harness::HarnessContext;
use crate::lessons::{self, Lesson, LessonPlot, LESSONS};
use crate::present::format_table;
use crate::present::plot::{self, PlotRequest};

use super::error::{CommandError, CommandResult};

/// Catalog listing; needs no engine
pub fn list_lessons(out: &mut dyn Write) -> CommandResult<()> {
    let id_width = LESSONS.iter().map(|l| l.id.len()).max().unwrap_or(0);
    for lesson in LESSONS {
        let engines: Vec<&str> = lesson.engines.iter().map(|k| k.id()).collect();
        writeln!(
            out,
            "{:width$}  {} ({}) [{}]",
            lesson.id,
            lesson.title,
            lesson.topic,
            engines.join(","),
            width = id_width
        )?;
    }
    Ok(())
}

pub fn select(id: Option<&str>) -> CommandResult<Vec<&'static Lesson>> {
    match id {
        Some(id) => lessons::find(id).map(|l| vec![l]).ok_or_else(|| CommandError::Input {
            message: format!("unknown lesson '{id}' (see `sqltour tour --list`)"),
        }),
        None => Ok(LESSONS.iter().collect()),
    }
}

/// Runs the selected lessons in order.
///
/// An engine rejecting a query the lesson expects it to reject is part of
/// the tour, not a failure. Any other error is collected and reported once
/// every lesson has run.
pub async fn tour(
    ctx: &HarnessContext,
    selected: &[&Lesson],
    plot_dir: Option<&Path>,
    out: &mut (dyn Write + Send),
) -> CommandResult<()> {
    if let Some(dir) = plot_dir {
        std::fs::create_dir_all(dir).map_err(|e| CommandError::Input {
            message: format!("cannot create plot directory {}: {}", dir.display(), e),
        })?;
    }

    let mut unexpected = Vec::new();
    for lesson in selected {
        run_lesson(ctx, lesson, plot_dir, out, &mut unexpected).await?;
    }

    if unexpected.is_empty() {
        Ok(())
    } else {
        Err(CommandError::failed(format!(
            "{} lesson step(s) failed: {}",
            unexpected.len(),
            unexpected.join(", ")
        )))
    }
}

async fn run_lesson(
    ctx: &HarnessContext,
    lesson: &Lesson,
    plot_dir: Option<&Path>,
    out: &mut (dyn Write + Send),
    unexpected: &mut Vec<String>,
) -> CommandResult<()> {
    writeln!(out, "\n=== [{}] {} ({})", lesson.id, lesson.title, lesson.topic)?;
    for line in lesson.query.lines() {
        writeln!(out, "    {line}")?;
    }

    for &kind in lesson.engines {
        if !ctx.config.is_enabled(kind) {
            writeln!(out, "--- {kind}: skipped (not enabled)")?;
            continue;
        }
        writeln!(out, "--- {kind}")?;

        match ctx.query(kind, lesson.query).await {
            Ok(result) => {
                writeln!(out, "{}", format_table(&result))?;
                if lesson.expects_error_on(kind) {
                    writeln!(out, "(this {kind} version accepted a query it usually rejects)")?;
                }
                if let (Some(lesson_plot), Some(dir)) = (lesson.plot, plot_dir) {
                    let path = dir.join(format!("{}-{}.svg", lesson.id, kind.id()));
                    match plot::write_plot(&result, &plot_request(lesson, lesson_plot), &path) {
                        Ok(data) => writeln!(
                            out,
                            "Plot: {} ({} series)",
                            path.display(),
                            data.series.len()
                        )?,
                        Err(e) => {
                            writeln!(out, "Plot failed: {e}")?;
                            unexpected.push(format!("{}/{}", lesson.id, kind.id()));
                        }
                    }
                }
            }
            Err(e) if lesson.expects_error_on(kind) && !e.is_connection() => {
                writeln!(out, "Expected error: {e}")?;
            }
            Err(e) => {
                tracing::warn!(lesson = lesson.id, backend = %kind, error = %e, "lesson step failed");
                writeln!(out, "Unexpected error: {e}")?;
                unexpected.push(format!("{}/{}", lesson.id, kind.id()));
            }
        }

        if let Some(note) = lesson.note_for(kind) {
            writeln!(out, "Note: {note}")?;
        }
    }
    Ok(())
}

fn plot_request(lesson: &Lesson, lesson_plot: LessonPlot) -> PlotRequest {
    PlotRequest {
        x: lesson_plot.x.to_string(),
        y: lesson_plot.y.iter().map(|c| c.to_string()).collect(),
        series_by: lesson_plot.series_by.map(str::to_string),
        title: Some(lesson.title.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_covers_every_lesson() {
        let mut buf = Vec::new();
        list_lessons(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), LESSONS.len());
        assert!(text.contains("table-shorthand"));
    }

    #[test]
    fn test_select() {
        assert_eq!(select(None).unwrap().len(), LESSONS.len());
        assert_eq!(select(Some("self-join")).unwrap()[0].id, "self-join");
        assert!(matches!(select(Some("nope")), Err(CommandError::Input { .. })));
    }

    #[test]
    fn test_plot_request_from_lesson() {
        let lesson = lessons::find("moving-average").unwrap();
        let request = plot_request(lesson, lesson.plot.unwrap());
        assert_eq!(request.x, "timestamp");
        assert_eq!(request.y, vec!["value", "mv_avg_val"]);
        assert_eq!(request.series_by.as_deref(), Some("sensor_id"));
    }
}
