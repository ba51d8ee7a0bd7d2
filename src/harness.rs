// SPDX-License-Identifier: Apache-2.0

//! The harness context: configuration plus the live engine handles.
//!
//! Built once per run and passed to every step. Steps run strictly one
//! after another; nothing here spawns concurrent work against an engine.

use std::io::Write;

use crate::config::HarnessConfig;
use crate::dispatch::{self, Comparison};
use crate::engine::error::EngineResult;
use crate::engine::provider;
use crate::engine::registry::EngineRegistry;
use crate::engine::types::{BackendKind, QueryResult};
use crate::fixtures::{self, CountCheck, Discovery, LoadReport};

pub struct HarnessContext {
    pub config: HarnessConfig,
    pub engines: EngineRegistry,
}

impl HarnessContext {
    /// Opens every enabled engine, failing on the first one that is unreachable.
    pub async fn connect(config: HarnessConfig) -> EngineResult<Self> {
        let engines = provider::connect_all(&config.connection_configs()).await?;
        Ok(Self { config, engines })
    }

    pub fn discover(&self) -> EngineResult<Discovery> {
        fixtures::discover_fixtures(&self.config.tables_dir)
    }

    /// Discovers and (re)loads every fixture into every enabled engine.
    pub async fn load(&self, out: &mut (dyn Write + Send)) -> EngineResult<(Discovery, LoadReport)> {
        let discovery = self.discover()?;
        let report = fixtures::load_all(&self.engines, &discovery.fixtures, out).await?;
        Ok((discovery, report))
    }

    pub async fn verify(&self) -> EngineResult<Vec<CountCheck>> {
        let discovery = self.discover()?;
        Ok(fixtures::verify_counts(&self.engines, &discovery.fixtures).await)
    }

    pub async fn query(&self, kind: BackendKind, sql: &str) -> EngineResult<QueryResult> {
        let engine = self.engines.require(kind)?;
        dispatch::run_query(engine.as_ref(), sql).await
    }

    pub async fn compare(&self, sql: &str) -> Comparison {
        dispatch::compare(&self.engines, sql).await
    }

    pub async fn close(self) {
        self.engines.close_all().await;
    }
}
