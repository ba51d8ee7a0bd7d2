// SPDX-License-Identifier: Apache-2.0

//! Statement classification
//!
//! Drivers need to know whether to fetch rows or only count affected rows.
//! Data changes count as row-returning only with a top-level `RETURNING`.
//! This looks at the leading keyword after comments; it does not parse or
//! validate the statement, the engine remains the only judge of the text.

const ROW_RETURNING: &[&str] = &[
    "SELECT", "WITH", "TABLE", "VALUES", "SHOW", "EXPLAIN", "PRAGMA", "DESCRIBE", "SUMMARIZE",
    "FROM",
];

/// Leading keyword of `query`, uppercased, skipping whitespace, `--` line
/// comments, `/* */` block comments and opening parentheses.
pub fn leading_keyword(query: &str) -> Option<String> {
    let mut rest = query;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(after) = rest.strip_prefix("--") {
            rest = match after.find('\n') {
                Some(pos) => &after[pos + 1..],
                None => "",
            };
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = match after.find("*/") {
                Some(pos) => &after[pos + 2..],
                None => "",
            };
        } else {
            break;
        }
    }

    let keyword: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if keyword.is_empty() {
        None
    } else {
        Some(keyword.to_ascii_uppercase())
    }
}

/// True when the statement is expected to produce a result set.
///
/// Unknown or empty statements are treated as row-returning so that the
/// engine, not this heuristic, reports what is wrong with them.
pub fn returns_rows(query: &str) -> bool {
    match leading_keyword(query) {
        Some(keyword) if is_data_change(&keyword) => has_top_level_returning(query),
        Some(keyword) => ROW_RETURNING.contains(&keyword.as_str()) || !is_known_command(&keyword),
        None => true,
    }
}

fn is_data_change(keyword: &str) -> bool {
    matches!(keyword, "INSERT" | "UPDATE" | "DELETE")
}

/// True when `RETURNING` appears outside parentheses, quotes and comments.
fn has_top_level_returning(query: &str) -> bool {
    let bytes = query.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 1;
            }
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            c if depth == 0 && c.is_ascii_alphabetic() => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let preceded_by_word = start > 0 && (bytes[start - 1].is_ascii_alphanumeric() || bytes[start - 1] == b'_');
                if !preceded_by_word && query[start..i].eq_ignore_ascii_case("RETURNING") {
                    return true;
                }
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    false
}

fn is_known_command(keyword: &str) -> bool {
    matches!(
        keyword,
        "INSERT"
            | "UPDATE"
            | "DELETE"
            | "CREATE"
            | "DROP"
            | "ALTER"
            | "TRUNCATE"
            | "BEGIN"
            | "COMMIT"
            | "ROLLBACK"
            | "SET"
            | "ANALYZE"
            | "VACUUM"
            | "ATTACH"
            | "DETACH"
            | "COPY"
            | "GRANT"
            | "REVOKE"
            | "INSTALL"
            | "LOAD"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_leading_comments() {
        let query = "\n    -- Duckdb  (connection ddb_eng)\n    SELECT * FROM t1, t2;\n";
        assert_eq!(leading_keyword(query).as_deref(), Some("SELECT"));
        assert_eq!(leading_keyword("/* note */ with x as (select 1) select * from x").as_deref(), Some("WITH"));
        assert_eq!(leading_keyword("(SELECT 1)").as_deref(), Some("SELECT"));
        assert_eq!(leading_keyword("-- only a comment"), None);
    }

    #[test]
    fn classifies_statements() {
        assert!(returns_rows("SELECT 1"));
        assert!(returns_rows("TABLE t1;"));
        assert!(returns_rows("WITH RECURSIVE x AS (SELECT 1) SELECT * FROM x"));
        assert!(returns_rows("pragma table_info(t1)"));
        assert!(!returns_rows("DROP TABLE IF EXISTS t1"));
        assert!(!returns_rows("-- setup\nCREATE TABLE t (a INT)"));
        assert!(!returns_rows("insert into t values (1)"));
        assert!(returns_rows("SELEC 1"), "typos go to the engine for a diagnostic");
    }

    #[test]
    fn data_changes_with_returning_produce_rows() {
        assert!(returns_rows("INSERT INTO t2 VALUES (9, 'q') RETURNING aa"));
        assert!(returns_rows("update t1 set b = 'x'\nreturning *;"));
        assert!(returns_rows("DELETE FROM t2 WHERE aa = 5 RETURNING aa, bb"));
        assert!(!returns_rows("INSERT INTO t2 VALUES (9, 'returning')"));
        assert!(!returns_rows("UPDATE t1 SET b = 'x' -- returning nothing\n"));
        assert!(!returns_rows("INSERT INTO t2 SELECT * FROM (SELECT 1 AS returning) s"));
        assert!(!returns_rows("DELETE FROM t2 WHERE aa IN (SELECT returning_id FROM r)"));
    }
}
