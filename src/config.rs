// SPDX-License-Identifier: Apache-2.0

//! Harness configuration.
//!
//! Built once from the command line (see `commands::args`) and handed to
//! `HarnessContext`. Nothing reads the environment after this point.

use std::path::PathBuf;

use serde::Serialize;

use crate::engine::types::{BackendKind, ConnectionConfig};
use crate::observability::Sensitive;

pub const DEFAULT_TABLES_DIR: &str = "tables";
pub const DEFAULT_DUCKDB_PATH: &str = "demo.duckdb";
pub const DEFAULT_SQLITE_PATH: &str = "demo.sqlite";
pub const DEFAULT_PG_PASSWORD: &str = "pybites";
pub const PG_PASSWORD_ENV: &str = "POSTGRES_PASSWORD";

/// Where the PostgreSQL server lives
#[derive(Debug, Clone, Serialize)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Sensitive<String>,
    pub database: String,
    pub connect_timeout_secs: u32,
}

impl Default for PostgresSettings {
    fn default() -> Self {
        let password = std::env::var(PG_PASSWORD_ENV).unwrap_or_else(|_| DEFAULT_PG_PASSWORD.to_string());
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: Sensitive::new(password),
            database: "postgres".to_string(),
            connect_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HarnessConfig {
    pub tables_dir: PathBuf,
    pub duckdb_path: String,
    pub sqlite_path: String,
    pub postgres: PostgresSettings,
    /// Enabled engines, deduplicated and in load order
    pub engines: Vec<BackendKind>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            tables_dir: PathBuf::from(DEFAULT_TABLES_DIR),
            duckdb_path: DEFAULT_DUCKDB_PATH.to_string(),
            sqlite_path: DEFAULT_SQLITE_PATH.to_string(),
            postgres: PostgresSettings::default(),
            engines: BackendKind::ALL.to_vec(),
        }
    }
}

impl HarnessConfig {
    /// Replaces the engine selection; order and duplicates in `kinds` do not matter.
    pub fn with_engines(mut self, kinds: impl IntoIterator<Item = BackendKind>) -> Self {
        let mut engines: Vec<BackendKind> = kinds.into_iter().collect();
        engines.sort();
        engines.dedup();
        self.engines = engines;
        self
    }

    pub fn is_enabled(&self, kind: BackendKind) -> bool {
        self.engines.contains(&kind)
    }

    pub fn connection_config(&self, kind: BackendKind) -> ConnectionConfig {
        match kind {
            BackendKind::DuckDb => ConnectionConfig::embedded(kind, self.duckdb_path.clone()),
            BackendKind::Sqlite => ConnectionConfig::embedded(kind, self.sqlite_path.clone()),
            BackendKind::Postgres => ConnectionConfig {
                backend: kind,
                host: self.postgres.host.clone(),
                port: self.postgres.port,
                username: self.postgres.user.clone(),
                password: self.postgres.password.clone(),
                database: Some(self.postgres.database.clone()),
                connect_timeout_secs: Some(self.postgres.connect_timeout_secs),
            },
        }
    }

    /// One connection config per enabled engine, in load order
    pub fn connection_configs(&self) -> Vec<ConnectionConfig> {
        self.engines
            .iter()
            .map(|kind| self.connection_config(*kind))
            .collect()
    }
}
