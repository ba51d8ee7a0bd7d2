// SPDX-License-Identifier: Apache-2.0

//! Engine Handle Provider
//!
//! Turns a `ConnectionConfig` into a ready engine handle. Runs once at
//! startup; no retry policy. An unreachable backend is a configuration
//! problem for the operator, so the first failure stops everything.

use std::sync::Arc;

use tokio::time::{timeout, Duration};
use tracing::instrument;

use crate::engine::drivers::duckdb::DuckDbDriver;
use crate::engine::drivers::postgres::PostgresDriver;
use crate::engine::drivers::sqlite::SqliteDriver;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::registry::EngineRegistry;
use crate::engine::traits::DataEngine;
use crate::engine::types::{BackendKind, ConnectionConfig};

/// Starts a throwaway PostgreSQL matching the default connection settings.
pub const POSTGRES_DOCKER_HINT: &str =
    "docker run --rm -d --name sqltour-postgres -e POSTGRES_PASSWORD=pybites -p 5432:5432 postgres";

/// Upper bound for opening an embedded file (a stuck file lock, mostly)
const EMBEDDED_OPEN_TIMEOUT_SECS: u64 = 30;

/// Opens one engine handle
#[instrument(
    skip(config),
    fields(engine = %config.backend, target = %config.display_target())
)]
pub async fn connect_engine(config: &ConnectionConfig) -> EngineResult<Arc<dyn DataEngine>> {
    let budget = match config.backend {
        // The driver applies the configured timeout itself; leave room for the probe
        BackendKind::Postgres => config.connect_timeout_secs.unwrap_or(5) as u64 * 2 + 1,
        _ => EMBEDDED_OPEN_TIMEOUT_SECS,
    };

    let connect_future = async {
        let engine: Arc<dyn DataEngine> = match config.backend {
            BackendKind::DuckDb => Arc::new(DuckDbDriver::connect(config).await?),
            BackendKind::Postgres => Arc::new(PostgresDriver::connect(config).await?),
            BackendKind::Sqlite => Arc::new(SqliteDriver::connect(config).await?),
        };
        Ok::<_, EngineError>(engine)
    };

    match timeout(Duration::from_secs(budget), connect_future).await {
        Ok(Ok(engine)) => {
            tracing::info!("engine ready");
            Ok(engine)
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "engine unavailable");
            Err(e)
        }
        Err(_) => {
            tracing::error!(timeout_secs = budget, "engine connect timed out");
            Err(EngineError::connection_failed(
                config.backend,
                format!("no answer from {} within {budget}s", config.display_target()),
            ))
        }
    }
}

/// Opens every configured engine in order, stopping at the first failure.
///
/// Handles opened before the failure are closed again so embedded files
/// are left checkpointed.
pub async fn connect_all(configs: &[ConnectionConfig]) -> EngineResult<EngineRegistry> {
    let mut registry = EngineRegistry::new();
    let mut ordered: Vec<&ConnectionConfig> = configs.iter().collect();
    ordered.sort_by_key(|c| c.backend);

    for config in ordered {
        match connect_engine(config).await {
            Ok(engine) => registry.register(engine),
            Err(e) => {
                registry.close_all().await;
                return Err(e);
            }
        }
    }
    Ok(registry)
}

/// What the operator should do about a connection-class failure.
pub fn remediation(err: &EngineError) -> Option<String> {
    match err {
        EngineError::ConnectionFailed { backend: BackendKind::Postgres, .. } => Some(format!(
            "PostgreSQL is required but not reachable. Start it with:\n    {POSTGRES_DOCKER_HINT}\n\
             or point --pg-host/--pg-port at a running server (or drop postgres from --engines)."
        )),
        EngineError::AuthenticationFailed { backend: BackendKind::Postgres, .. } => Some(
            "PostgreSQL rejected the credentials. Check --pg-user and POSTGRES_PASSWORD \
             (the password the server was started with)."
                .to_string(),
        ),
        EngineError::ConnectionFailed { backend, .. } => Some(format!(
            "{backend} could not open its database file. Check the path and its permissions."
        )),
        _ => None,
    }
}
