// SPDX-License-Identifier: Apache-2.0

//! Command handlers behind the `sqltour` binary.

pub mod args;
pub mod error;
pub mod fixtures;
pub mod query;
pub mod tour;

use std::io::Write;

use crate::harness::HarnessContext;
use crate::present::plot::PlotRequest;

use args::{Cli, Command};
pub use error::{CommandError, CommandResult, EXIT_FAILURE, EXIT_OK, EXIT_UNAVAILABLE};

/// Runs one parsed command line and returns the process exit status.
pub async fn execute(cli: Cli, out: &mut (dyn Write + Send)) -> u8 {
    match run_command(cli, out).await {
        Ok(()) => EXIT_OK,
        Err(e) => {
            let _ = out.flush();
            eprintln!("{}", e.report());
            e.exit_code()
        }
    }
}

async fn run_command(cli: Cli, out: &mut (dyn Write + Send)) -> CommandResult<()> {
    let Cli { global, command } = cli;

    if let Command::Tour { list: true, .. } = &command {
        return tour::list_lessons(out);
    }

    let config = global.into_config();
    tracing::debug!(engines = ?config.engines, tables_dir = %config.tables_dir.display(), "connecting");
    let ctx = HarnessContext::connect(config).await?;

    let outcome = run_connected(&ctx, command, out).await;
    ctx.close().await;
    outcome
}

async fn run_connected(
    ctx: &HarnessContext,
    command: Command,
    out: &mut (dyn Write + Send),
) -> CommandResult<()> {
    match command {
        Command::Load => fixtures::load(ctx, out).await,
        Command::Verify => fixtures::verify(ctx, out).await,
        Command::Query {
            engine,
            format,
            source,
        } => {
            let sql = source.read()?;
            query::query(ctx, engine, format, &sql, out).await
        }
        Command::Compare { json, source } => {
            let sql = source.read()?;
            query::compare(ctx, &sql, json, out).await
        }
        Command::Tour {
            lesson, plot_dir, ..
        } => {
            let selected = tour::select(lesson.as_deref())?;
            tour::tour(ctx, &selected, plot_dir.as_deref(), out).await
        }
        Command::Plot {
            engine,
            x,
            y,
            series_by,
            title,
            out: path,
            source,
        } => {
            let sql = source.read()?;
            let request = PlotRequest {
                x,
                y,
                series_by,
                title,
            };
            query::plot(ctx, engine, &request, &sql, &path, out).await
        }
    }
}
