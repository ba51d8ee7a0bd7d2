// SPDX-License-Identifier: Apache-2.0

//! sqltour: loads CSV fixtures into DuckDB, SQLite and PostgreSQL and runs
//! the same SQL against each of them so their answers can be compared.

pub mod commands;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod fixtures;
pub mod harness;
pub mod lessons;
pub mod observability;
pub mod present;

use std::process::ExitCode;

use clap::Parser;

use commands::args::Cli;
use commands::EXIT_FAILURE;

/// Entry point of the `sqltour` binary.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    observability::init_tracing(&cli.global.log_options());

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: cannot start the async runtime: {e}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let mut stdout = std::io::stdout();
    let status = runtime.block_on(commands::execute(cli, &mut stdout));
    ExitCode::from(status)
}
