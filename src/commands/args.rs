// SPDX-License-Identifier: Apache-2.0

//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{
    HarnessConfig, PostgresSettings, DEFAULT_DUCKDB_PATH, DEFAULT_PG_PASSWORD, DEFAULT_SQLITE_PATH,
    DEFAULT_TABLES_DIR, PG_PASSWORD_ENV,
};
use crate::engine::types::BackendKind;
use crate::observability::{LogOptions, Sensitive};
use crate::present::OutputFormat;

use super::error::{CommandError, CommandResult};

/// sqltour - run the same SQL lessons against DuckDB, SQLite and PostgreSQL
#[derive(Parser, Debug)]
#[command(name = "sqltour")]
#[command(version)]
#[command(about = "Load CSV fixtures into three engines and compare how they answer the same SQL", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Directory holding the *.csv fixtures
    #[arg(long = "tables-dir", env = "SQLTOUR_TABLES_DIR", default_value = DEFAULT_TABLES_DIR, global = true)]
    pub tables_dir: PathBuf,

    /// DuckDB database file
    #[arg(long = "duckdb-path", env = "SQLTOUR_DUCKDB_PATH", default_value = DEFAULT_DUCKDB_PATH, global = true)]
    pub duckdb_path: String,

    /// SQLite database file
    #[arg(long = "sqlite-path", env = "SQLTOUR_SQLITE_PATH", default_value = DEFAULT_SQLITE_PATH, global = true)]
    pub sqlite_path: String,

    #[arg(long = "pg-host", default_value = "localhost", global = true)]
    pub pg_host: String,

    #[arg(long = "pg-port", default_value_t = 5432, global = true)]
    pub pg_port: u16,

    #[arg(long = "pg-user", default_value = "postgres", global = true)]
    pub pg_user: String,

    #[arg(
        long = "pg-password",
        env = PG_PASSWORD_ENV,
        default_value = DEFAULT_PG_PASSWORD,
        hide_env_values = true,
        hide_default_value = true,
        global = true
    )]
    pub pg_password: String,

    #[arg(long = "pg-database", default_value = "postgres", global = true)]
    pub pg_database: String,

    /// PostgreSQL connect timeout
    #[arg(long = "pg-connect-timeout", value_name = "SECONDS", default_value_t = 5, global = true)]
    pub pg_connect_timeout: u32,

    /// Engines to drive, comma separated
    #[arg(
        long = "engines",
        value_delimiter = ',',
        default_value = "duckdb,postgres,sqlite",
        global = true
    )]
    pub engines: Vec<BackendKind>,

    /// Also write JSON logs to this directory
    #[arg(long = "log-dir", global = true)]
    pub log_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    pub fn into_config(self) -> HarnessConfig {
        HarnessConfig {
            tables_dir: self.tables_dir,
            duckdb_path: self.duckdb_path,
            sqlite_path: self.sqlite_path,
            postgres: PostgresSettings {
                host: self.pg_host,
                port: self.pg_port,
                user: self.pg_user,
                password: Sensitive::new(self.pg_password),
                database: self.pg_database,
                connect_timeout_secs: self.pg_connect_timeout,
            },
            engines: Vec::new(),
        }
        .with_engines(self.engines)
    }

    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            verbose: self.verbose,
            log_dir: self.log_dir.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// (Re)create every fixture table on every enabled engine
    Load,

    /// Compare row counts of every fixture table across engines
    Verify,

    /// Run one statement on one engine
    Query {
        #[arg(short = 'e', long = "engine")]
        engine: BackendKind,

        #[arg(long = "format", value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        #[command(flatten)]
        source: SqlSource,
    },

    /// Run one statement on every enabled engine and compare the rows
    Compare {
        /// Print the comparison as JSON
        #[arg(long = "json")]
        json: bool,

        #[command(flatten)]
        source: SqlSource,
    },

    /// Walk through the lesson catalog
    Tour {
        /// Run only this lesson
        #[arg(long = "lesson")]
        lesson: Option<String>,

        /// List lessons without connecting
        #[arg(long = "list", conflicts_with = "lesson")]
        list: bool,

        /// Write the plots of plotting lessons here
        #[arg(long = "plot-dir")]
        plot_dir: Option<PathBuf>,
    },

    /// Run a query and plot columns of its result as SVG
    Plot {
        #[arg(short = 'e', long = "engine")]
        engine: BackendKind,

        /// Column for the horizontal axis
        #[arg(long = "x")]
        x: String,

        /// Value column(s) to plot
        #[arg(long = "y", required = true, num_args = 1..)]
        y: Vec<String>,

        /// Draw one series per distinct value of this column
        #[arg(long = "series-by")]
        series_by: Option<String>,

        #[arg(long = "title")]
        title: Option<String>,

        /// Output SVG file
        #[arg(short = 'o', long = "out")]
        out: PathBuf,

        #[command(flatten)]
        source: SqlSource,
    },
}

/// SQL given inline or read from a file
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct SqlSource {
    /// SQL statement
    pub sql: Option<String>,

    /// Read the statement from this file
    #[arg(short = 'f', long = "file")]
    pub file: Option<PathBuf>,
}

impl SqlSource {
    pub fn read(&self) -> CommandResult<String> {
        let sql = match (&self.sql, &self.file) {
            (Some(sql), _) => sql.clone(),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| CommandError::Input {
                message: format!("cannot read {}: {}", path.display(), e),
            })?,
            (None, None) => {
                return Err(CommandError::Input {
                    message: "no SQL given".to_string(),
                })
            }
        };
        if sql.trim().is_empty() {
            return Err(CommandError::Input {
                message: "the SQL statement is empty".to_string(),
            });
        }
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_engines_flag_is_parsed_and_ordered() {
        let cli = Cli::try_parse_from(["sqltour", "--engines", "sqlite,duckdb", "load"]).unwrap();
        let config = cli.global.into_config();
        assert_eq!(config.engines, vec![BackendKind::DuckDb, BackendKind::Sqlite]);
    }

    #[test]
    fn test_unknown_engine_is_rejected() {
        let err = Cli::try_parse_from(["sqltour", "--engines", "oracle", "load"]).unwrap_err();
        assert!(err.to_string().contains("oracle"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "sqltour",
            "query",
            "--engine",
            "sqlite",
            "SELECT 1",
            "--sqlite-path",
            "/tmp/x.sqlite",
            "--pg-port",
            "6543",
        ])
        .unwrap();
        assert_eq!(cli.global.sqlite_path, "/tmp/x.sqlite");
        let config = cli.global.into_config();
        assert_eq!(config.postgres.port, 6543);
    }

    #[test]
    fn test_query_needs_exactly_one_source() {
        assert!(Cli::try_parse_from(["sqltour", "query", "--engine", "duckdb"]).is_err());
        assert!(Cli::try_parse_from([
            "sqltour", "query", "--engine", "duckdb", "SELECT 1", "--file", "q.sql"
        ])
        .is_err());

        let cli = Cli::try_parse_from(["sqltour", "query", "-e", "duckdb", "--format", "csv", "SELECT 1"]).unwrap();
        match cli.command {
            Command::Query { engine, format, source } => {
                assert_eq!(engine, BackendKind::DuckDb);
                assert_eq!(format, OutputFormat::Csv);
                assert_eq!(source.read().unwrap(), "SELECT 1");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_plot_takes_several_y_columns() {
        let cli = Cli::try_parse_from([
            "sqltour", "plot", "-e", "duckdb", "--x", "timestamp", "--y", "value", "n",
            "--series-by", "sensor_id", "--out", "s.svg", "--file", "q.sql",
        ])
        .unwrap();
        match cli.command {
            Command::Plot { y, series_by, .. } => {
                assert_eq!(y, vec!["value".to_string(), "n".to_string()]);
                assert_eq!(series_by.as_deref(), Some("sensor_id"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_sql_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.sql");
        std::fs::write(&path, "SELECT 42;\n").unwrap();
        let source = SqlSource { sql: None, file: Some(path) };
        assert_eq!(source.read().unwrap(), "SELECT 42;\n");

        let blank = SqlSource { sql: Some("  ".into()), file: None };
        assert!(matches!(blank.read(), Err(CommandError::Input { .. })));
    }
}
