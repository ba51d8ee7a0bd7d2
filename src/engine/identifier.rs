// SPDX-License-Identifier: Apache-2.0

//! Allow-listed SQL identifiers
//!
//! Table names are derived from fixture file names and end up interpolated
//! into DDL on three engines. Only plain ASCII identifiers that every
//! backend accepts unquoted are let through; everything else is rejected
//! before any statement is built.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::engine::error::{EngineError, EngineResult};

/// PostgreSQL truncates identifiers beyond NAMEDATALEN - 1 bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

const RESERVED: &[&str] = &[
    "all", "and", "as", "by", "create", "cross", "delete", "drop", "from", "full", "group",
    "having", "in", "inner", "insert", "into", "is", "join", "left", "limit", "not", "null",
    "on", "or", "order", "outer", "right", "select", "table", "union", "update", "using",
    "values", "where", "with",
];

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
    })
}

/// A table name that passed the identifier allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TableName(String);

impl TableName {
    pub fn parse(name: &str) -> EngineResult<Self> {
        if name.is_empty() {
            return Err(EngineError::invalid_identifier(name, "name is empty"));
        }
        if name.len() > MAX_IDENTIFIER_LEN {
            return Err(EngineError::invalid_identifier(
                name,
                format!("longer than {MAX_IDENTIFIER_LEN} bytes"),
            ));
        }
        if !identifier_pattern().is_match(name) {
            return Err(EngineError::invalid_identifier(
                name,
                "only ASCII letters, digits and '_' are allowed, and it must not start with a digit",
            ));
        }
        if RESERVED.contains(&name.to_ascii_lowercase().as_str()) {
            return Err(EngineError::invalid_identifier(name, "reserved SQL keyword"));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
