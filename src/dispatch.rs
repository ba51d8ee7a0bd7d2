// SPDX-License-Identifier: Apache-2.0

//! Query dispatch.
//!
//! Query text goes to the engine exactly as written: no rewriting, no
//! retries, no caching. Engine diagnostics come back untouched.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::instrument;

use crate::engine::error::EngineResult;
use crate::engine::registry::EngineRegistry;
use crate::engine::traits::DataEngine;
use crate::engine::types::{BackendKind, QueryResult};

/// Submits `query` to one engine.
#[instrument(skip(engine, query), fields(engine = %engine.kind(), query_len = query.len()))]
pub async fn run_query(engine: &dyn DataEngine, query: &str) -> EngineResult<QueryResult> {
    match engine.execute(query).await {
        Ok(result) => {
            tracing::debug!(
                rows = result.row_count(),
                elapsed_ms = result.execution_time_ms,
                "query answered"
            );
            Ok(result)
        }
        Err(e) => {
            tracing::debug!(error = %e, "query rejected");
            Err(e)
        }
    }
}

/// One engine's answer in a comparison
#[derive(Debug, Serialize)]
pub struct EngineAnswer {
    pub backend: BackendKind,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The same query run on every enabled engine
#[derive(Debug, Serialize)]
pub struct Comparison {
    pub answers: Vec<EngineAnswer>,
    /// Engines grouped by identical row multisets; one group means agreement
    pub groups: Vec<Vec<BackendKind>>,
}

impl Comparison {
    /// Every engine answered and all row multisets are equal.
    ///
    /// Row order is ignored: without `ORDER BY` engines may return rows in
    /// any order.
    pub fn agrees(&self) -> bool {
        self.answers.iter().all(|a| a.success) && self.groups.len() == 1
    }
}

/// Runs `query` on every engine in registry order and compares answers.
pub async fn compare(engines: &EngineRegistry, query: &str) -> Comparison {
    let mut answers = Vec::with_capacity(engines.len());
    for engine in engines.iter() {
        let answer = match run_query(engine.as_ref(), query).await {
            Ok(result) => EngineAnswer {
                backend: engine.kind(),
                success: true,
                result: Some(result),
                error: None,
            },
            Err(e) => EngineAnswer {
                backend: engine.kind(),
                success: false,
                result: None,
                error: Some(e.to_string()),
            },
        };
        answers.push(answer);
    }

    let groups = group_by_rows(&answers);
    Comparison { answers, groups }
}

/// Canonical, order-independent fingerprint of a result's rows
pub fn row_multiset(result: &QueryResult) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = result.rows.iter().map(|r| r.canonical_key()).collect();
    rows.sort();
    rows
}

fn group_by_rows(answers: &[EngineAnswer]) -> Vec<Vec<BackendKind>> {
    // BTreeMap keeps groups in a stable order for printing
    let mut groups: BTreeMap<Vec<Vec<String>>, Vec<BackendKind>> = BTreeMap::new();
    for answer in answers {
        if let Some(result) = &answer.result {
            groups.entry(row_multiset(result)).or_default().push(answer.backend);
        }
    }
    let mut groups: Vec<Vec<BackendKind>> = groups.into_values().collect();
    groups.sort();
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{Row, Value};

    fn result(rows: Vec<Vec<Value>>) -> QueryResult {
        QueryResult {
            columns: vec![],
            rows: rows.into_iter().map(Row::new).collect(),
            affected_rows: None,
            execution_time_ms: 0.0,
        }
    }

    fn answer(backend: BackendKind, res: QueryResult) -> EngineAnswer {
        EngineAnswer {
            backend,
            success: true,
            result: Some(res),
            error: None,
        }
    }

    #[test]
    fn test_multiset_ignores_order_and_bool_coercion() {
        let duck = result(vec![
            vec![Value::Int(1), Value::Bool(true)],
            vec![Value::Int(2), Value::Bool(false)],
        ]);
        let lite = result(vec![
            vec![Value::Int(2), Value::Int(0)],
            vec![Value::Int(1), Value::Int(1)],
        ]);
        assert_eq!(row_multiset(&duck), row_multiset(&lite));
    }

    #[test]
    fn test_multiset_keeps_duplicates() {
        let twice = result(vec![vec![Value::Int(1)], vec![Value::Int(1)]]);
        let once = result(vec![vec![Value::Int(1)]]);
        assert_ne!(row_multiset(&twice), row_multiset(&once));
    }

    #[test]
    fn test_groups_split_disagreeing_engines() {
        let answers = vec![
            answer(BackendKind::DuckDb, result(vec![vec![Value::Float(2.0)]])),
            answer(BackendKind::Postgres, result(vec![vec![Value::Int(2)]])),
            answer(BackendKind::Sqlite, result(vec![vec![Value::Int(3)]])),
        ];
        let groups = group_by_rows(&answers);
        assert_eq!(groups.len(), 2);
        assert!(groups.contains(&vec![BackendKind::DuckDb, BackendKind::Postgres]));
        assert!(groups.contains(&vec![BackendKind::Sqlite]));
    }

    #[test]
    fn test_null_and_null_string_disagree() {
        let answers = vec![
            answer(BackendKind::DuckDb, result(vec![vec![Value::Null]])),
            answer(BackendKind::Sqlite, result(vec![vec![Value::Text("NULL".into())]])),
        ];
        let groups = group_by_rows(&answers);
        assert_eq!(groups, vec![vec![BackendKind::DuckDb], vec![BackendKind::Sqlite]]);
    }

    #[test]
    fn test_failed_engine_breaks_agreement() {
        let comparison = Comparison {
            answers: vec![
                answer(BackendKind::DuckDb, result(vec![])),
                EngineAnswer {
                    backend: BackendKind::Sqlite,
                    success: false,
                    result: None,
                    error: Some("near \"TABLE\": syntax error".into()),
                },
            ],
            groups: vec![vec![BackendKind::DuckDb]],
        };
        assert!(!comparison.agrees());
    }
}
