// SPDX-License-Identifier: Apache-2.0

//! Built-in lesson catalog.
//!
//! Each lesson is a literal query against the bundled fixtures, the engines
//! it is meant to run on, and what each engine's dialect makes of it. A
//! lesson listed with `expect_error` on an engine is there to show that
//! engine rejecting the text; the rejection is the expected outcome.

use crate::engine::types::BackendKind;

use BackendKind::{DuckDb, Postgres, Sqlite};

/// Plot to draw from a lesson's result
#[derive(Debug, Clone, Copy)]
pub struct LessonPlot {
    pub x: &'static str,
    pub y: &'static [&'static str],
    pub series_by: Option<&'static str>,
}

#[derive(Debug, Clone, Copy)]
pub struct Lesson {
    pub id: &'static str,
    pub topic: &'static str,
    pub title: &'static str,
    pub query: &'static str,
    /// Engines the lesson runs on, in tour order
    pub engines: &'static [BackendKind],
    /// Engines expected to reject the query
    pub expect_error: &'static [BackendKind],
    /// Per-engine dialect remarks
    pub notes: &'static [(BackendKind, &'static str)],
    pub plot: Option<LessonPlot>,
}

impl Lesson {
    pub fn expects_error_on(&self, kind: BackendKind) -> bool {
        self.expect_error.contains(&kind)
    }

    pub fn note_for(&self, kind: BackendKind) -> Option<&'static str> {
        self.notes.iter().find(|(k, _)| *k == kind).map(|(_, n)| *n)
    }
}

const ALL: &[BackendKind] = &[DuckDb, Postgres, Sqlite];

pub const LESSONS: &[Lesson] = &[
    Lesson {
        id: "cartesian",
        topic: "joins",
        title: "Selecting from two tables: the cartesian product",
        query: "SELECT * FROM t1, t2;",
        engines: ALL,
        expect_error: &[],
        notes: &[(Sqlite, "the boolean column c comes back as 1/0")],
        plot: None,
    },
    Lesson {
        id: "table-shorthand",
        topic: "syntax",
        title: "TABLE t is shorthand for SELECT * FROM t",
        query: "TABLE t1;",
        engines: &[Postgres, Sqlite],
        expect_error: &[Sqlite],
        notes: &[(Sqlite, "TABLE is not supported; use SELECT * FROM t1")],
        plot: None,
    },
    Lesson {
        id: "cross-join",
        topic: "joins",
        title: "CROSS JOIN spells the cartesian product out",
        query: "SELECT *\nFROM t1\nCROSS JOIN t2;",
        engines: &[DuckDb],
        expect_error: &[],
        notes: &[],
        plot: None,
    },
    Lesson {
        id: "equi-join-where",
        topic: "joins",
        title: "Equi-join by filtering the cartesian product",
        query: "SELECT t1.*, t2.bb\nFROM t1, t2\nWHERE t1.t2_aa = t2.aa;",
        engines: &[Sqlite],
        expect_error: &[],
        notes: &[],
        plot: None,
    },
    Lesson {
        id: "inner-join",
        topic: "joins",
        title: "INNER JOIN .. ON with row variables",
        query: "SELECT lft.*, rght.bb\nFROM t1 AS lft\nINNER JOIN t2 AS rght\nON lft.t2_aa = rght.aa;",
        engines: &[Sqlite],
        expect_error: &[],
        notes: &[],
        plot: None,
    },
    Lesson {
        id: "left-join",
        topic: "outer joins",
        title: "LEFT JOIN keeps unmatched rows from the left",
        query: "SELECT *\nFROM t1 AS lft\nLEFT JOIN t2 AS rgt\nON lft.t2_aa = rgt.aa;",
        engines: &[Postgres],
        expect_error: &[],
        notes: &[],
        plot: None,
    },
    Lesson {
        id: "right-join",
        topic: "outer joins",
        title: "RIGHT JOIN keeps unmatched rows from the right",
        query: "SELECT *\nFROM t1 AS lft\nRIGHT JOIN t2 AS rgt\nON lft.t2_aa = rgt.aa;",
        engines: &[Postgres],
        expect_error: &[],
        notes: &[],
        plot: None,
    },
    Lesson {
        id: "full-outer-join",
        topic: "outer joins",
        title: "FULL OUTER JOIN keeps unmatched rows from both sides",
        query: "SELECT *\nFROM t1 AS lft\nFULL OUTER JOIN t2 AS rgt\nON lft.t2_aa = rgt.aa;",
        engines: &[Postgres],
        expect_error: &[],
        notes: &[],
        plot: None,
    },
    Lesson {
        id: "unmatched-rows",
        topic: "outer joins",
        title: "Rows without a counterpart, testing the whole row variable for NULL",
        query: "SELECT *\nFROM t1\nFULL JOIN t2\nON t1.t2_aa = t2.aa\nWHERE t1 IS NULL OR t2 IS NULL;",
        engines: &[Postgres],
        expect_error: &[],
        notes: &[
            (Postgres, "a table alias used as a value is the whole row"),
            (Sqlite, "row variables are not values; test a column such as t1.a instead"),
        ],
        plot: None,
    },
    Lesson {
        id: "boolean-literals",
        topic: "NULL and booleans",
        title: "Strings that PostgreSQL accepts as booleans",
        query: "SELECT 'Yes' = true AS a, 'No' = true AS b;",
        engines: &[Postgres],
        expect_error: &[],
        notes: &[(Postgres, "'Yes', 'no', 'on', 'off', 'y', 'n' all parse; thin ice elsewhere")],
        plot: None,
    },
    Lesson {
        id: "employees",
        topic: "recursion",
        title: "The employee table",
        query: "SELECT * FROM employee;",
        engines: &[Sqlite],
        expect_error: &[],
        notes: &[],
        plot: None,
    },
    Lesson {
        id: "self-join",
        topic: "recursion",
        title: "Self-join: each employee with their boss",
        query: "SELECT emp.*, boss.emp_name AS boss_name\nFROM employee AS emp\nLEFT JOIN employee AS boss\nON emp.boss_id = boss.emp_id\nORDER BY 2;",
        engines: &[Postgres],
        expect_error: &[],
        notes: &[(DuckDb, "SELECT * works here too, but yields two emp_name columns")],
        plot: None,
    },
    Lesson {
        id: "hierarchy",
        topic: "recursion",
        title: "Recursive CTE: the reporting hierarchy with levels",
        query: "WITH RECURSIVE\n    top_brass AS (\n        SELECT * FROM employee WHERE boss_id IS NULL\n    ),\n    the_rest AS (\n        SELECT * FROM employee WHERE boss_id IS NOT NULL\n    ),\n    hier_emp AS (\n        SELECT *, 1 AS level FROM top_brass\n        UNION ALL\n        SELECT tr.*, he.level + 1\n        FROM the_rest AS tr\n        JOIN hier_emp AS he ON tr.boss_id = he.emp_id\n    )\nSELECT he.emp_id, he.emp_name, bn.emp_name AS boss_name, he.level\nFROM hier_emp AS he\nLEFT JOIN employee AS bn ON he.boss_id = bn.emp_id\nORDER BY he.level, boss_name;",
        engines: &[Postgres],
        expect_error: &[],
        notes: &[],
        plot: None,
    },
    Lesson {
        id: "sensor-sample",
        topic: "grouping",
        title: "A look at the sensor readings",
        query: "SELECT *\nFROM sensors AS s\nORDER BY s.sensor_id, s.value\nLIMIT 10;",
        engines: &[Sqlite],
        expect_error: &[],
        notes: &[(Sqlite, "timestamp is stored as ISO text")],
        plot: None,
    },
    Lesson {
        id: "group-by",
        topic: "grouping",
        title: "Average value per sensor with GROUP BY",
        query: "SELECT s.sensor_id, avg(s.value) AS avg_value, count(s.value) AS n_rows\nFROM sensors AS s\nGROUP BY s.sensor_id\nORDER BY s.sensor_id;",
        engines: ALL,
        expect_error: &[],
        notes: &[],
        plot: None,
    },
    Lesson {
        id: "where-extract",
        topic: "grouping",
        title: "Only readings after 11:00 using EXTRACT",
        query: "SELECT s.sensor_id, avg(s.value) AS avg_value, count(value) AS n_rows\nFROM sensors AS s\nWHERE EXTRACT(HOUR FROM s.timestamp) > 10\nGROUP BY s.sensor_id\nORDER BY s.sensor_id;",
        engines: ALL,
        expect_error: &[Sqlite],
        notes: &[(Sqlite, "no EXTRACT; use strftime('%H', s.timestamp) > '10'")],
        plot: None,
    },
    Lesson {
        id: "where-strftime",
        topic: "grouping",
        title: "Only readings after 11:00 using strftime",
        query: "SELECT s.sensor_id, avg(s.value) AS avg_value, count(value) AS n_rows\nFROM sensors AS s\nWHERE strftime('%H', s.timestamp) > '10'\nGROUP BY s.sensor_id\nORDER BY s.sensor_id;",
        engines: ALL,
        expect_error: &[Postgres],
        notes: &[(Postgres, "no strftime; use EXTRACT(HOUR FROM s.timestamp) > 10")],
        plot: None,
    },
    Lesson {
        id: "having",
        topic: "grouping",
        title: "Filtering groups with HAVING",
        query: "SELECT s.sensor_id\n    , round(n % 3) AS magic\n    , avg(s.value) AS avg_value\n    , count(value) AS n_rows\nFROM sensors AS s\nWHERE EXTRACT(HOUR FROM s.timestamp) > 10\nGROUP BY s.sensor_id, magic\nHAVING magic % 2 = 0\nORDER BY s.sensor_id, magic;",
        engines: &[DuckDb],
        expect_error: &[],
        notes: &[(DuckDb, "grouping and HAVING on a select-list alias is a DuckDB convenience")],
        plot: None,
    },
    Lesson {
        id: "sensor-plot",
        topic: "window functions",
        title: "Sensor values over time",
        query: "SELECT s.sensor_id, s.timestamp, s.value FROM sensors s ORDER BY s.sensor_id, s.timestamp;",
        engines: &[DuckDb],
        expect_error: &[],
        notes: &[],
        plot: Some(LessonPlot {
            x: "timestamp",
            y: &["value"],
            series_by: Some("sensor_id"),
        }),
    },
    Lesson {
        id: "moving-average",
        topic: "window functions",
        title: "Moving average over a 7-row window",
        query: "SELECT s.sensor_id, s.timestamp, s.value,\n    avg(s.value) OVER (\n        PARTITION BY s.sensor_id\n        ORDER BY s.timestamp\n        ROWS BETWEEN 3 PRECEDING AND 3 FOLLOWING\n    ) AS mv_avg_val\nFROM sensors AS s\nORDER BY s.sensor_id, s.timestamp;",
        engines: ALL,
        expect_error: &[],
        notes: &[],
        plot: Some(LessonPlot {
            x: "timestamp",
            y: &["value", "mv_avg_val"],
            series_by: Some("sensor_id"),
        }),
    },
    Lesson {
        id: "lag-delta",
        topic: "window functions",
        title: "Change from the previous reading with LAG",
        query: "SELECT s.sensor_id, s.timestamp, s.value,\n    ROUND(\n        (s.value - LAG(s.value, 1, s.value) OVER (\n            PARTITION BY s.sensor_id\n            ORDER BY s.timestamp\n        )), 3\n    ) AS value_difference\nFROM sensors AS s\nWHERE sensor_id = 1\nORDER BY s.timestamp;",
        engines: ALL,
        expect_error: &[Postgres],
        notes: &[
            (Postgres, "ROUND(double precision, integer) does not exist; see lag-delta-numeric"),
            (DuckDb, "ROUND is optional here"),
            (Sqlite, "ROUND is mandatory here; a ::numeric cast is a syntax error"),
        ],
        plot: Some(LessonPlot {
            x: "timestamp",
            y: &["value_difference"],
            series_by: None,
        }),
    },
    Lesson {
        id: "lag-delta-numeric",
        topic: "window functions",
        title: "The same delta with the ::numeric cast PostgreSQL needs",
        query: "SELECT s.sensor_id, s.timestamp, s.value,\n    ROUND(\n        (s.value - LAG(s.value, 1, s.value) OVER (\n            PARTITION BY s.sensor_id\n            ORDER BY s.timestamp\n        ))::numeric, 3\n    ) AS value_difference\nFROM sensors AS s\nWHERE sensor_id = 1\nORDER BY s.timestamp;",
        engines: ALL,
        expect_error: &[Sqlite],
        notes: &[(Sqlite, "'::' casts are not SQLite syntax")],
        plot: None,
    },
];

pub fn find(id: &str) -> Option<&'static Lesson> {
    LESSONS.iter().find(|l| l.id.eq_ignore_ascii_case(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<&str> = LESSONS.iter().map(|l| l.id).collect();
        assert_eq!(ids.len(), LESSONS.len());
    }

    #[test]
    fn test_expected_errors_are_on_listed_engines() {
        for lesson in LESSONS {
            assert!(!lesson.engines.is_empty(), "{} has no engine", lesson.id);
            for kind in lesson.expect_error {
                assert!(lesson.engines.contains(kind), "{}: {kind}", lesson.id);
            }
        }
    }

    #[test]
    fn test_find_is_case_insensitive() {
        assert_eq!(find("Cartesian").map(|l| l.id), Some("cartesian"));
        assert!(find("nope").is_none());
        assert!(find("table-shorthand").unwrap().expects_error_on(Sqlite));
        assert!(find("table-shorthand").unwrap().note_for(Sqlite).is_some());
    }
}
