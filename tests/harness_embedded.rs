use std::path::PathBuf;

use sqltour_lib::commands::{self, args::Cli, EXIT_FAILURE, EXIT_OK};
use sqltour_lib::config::HarnessConfig;
use sqltour_lib::dispatch;
use sqltour_lib::engine::error::EngineError;
use sqltour_lib::engine::types::{BackendKind, Value};
use sqltour_lib::harness::HarnessContext;
use sqltour_lib::lessons;
use tempfile::TempDir;

use clap::Parser;

fn bundled_tables() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tables")
}

fn embedded_config(dir: &TempDir) -> HarnessConfig {
    HarnessConfig {
        tables_dir: bundled_tables(),
        duckdb_path: dir.path().join("demo.duckdb").to_string_lossy().into_owned(),
        sqlite_path: dir.path().join("demo.sqlite").to_string_lossy().into_owned(),
        ..HarnessConfig::default()
    }
    .with_engines([BackendKind::DuckDb, BackendKind::Sqlite])
}

async fn loaded_context(dir: &TempDir) -> HarnessContext {
    let ctx = HarnessContext::connect(embedded_config(dir))
        .await
        .expect("embedded engines should open");
    let mut progress = Vec::new();
    let (_, report) = ctx.load(&mut progress).await.expect("load should run");
    assert!(report.is_success(), "load failures: {:?}", report.failures().collect::<Vec<_>>());
    ctx
}

#[tokio::test]
async fn test_load_prints_markers_and_counts_agree() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = HarnessContext::connect(embedded_config(&dir)).await.unwrap();

    let mut progress = Vec::new();
    let (discovery, report) = ctx.load(&mut progress).await.unwrap();
    let progress = String::from_utf8(progress).unwrap();

    let tables: Vec<&str> = discovery.fixtures.iter().map(|f| f.table.as_str()).collect();
    assert_eq!(tables, vec!["employee", "sensors", "t1", "t2"]);
    assert!(progress.contains("Creating table t2 on 2 engine(s). DuckDB ✓. SQLite ✓.\n"));
    assert_eq!(report.rows_loaded("t1", BackendKind::Sqlite), Some(2));
    assert_eq!(report.rows_loaded("sensors", BackendKind::DuckDb), Some(20));

    let checks = ctx.verify().await.unwrap();
    assert_eq!(checks.len(), 4);
    assert!(checks.iter().all(|c| c.agrees()));

    ctx.close().await;
}

#[tokio::test]
async fn test_reload_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = loaded_context(&dir).await;

    let mut progress = Vec::new();
    let (_, report) = ctx.load(&mut progress).await.unwrap();
    assert!(report.is_success());

    for kind in [BackendKind::DuckDb, BackendKind::Sqlite] {
        let result = ctx.query(kind, "SELECT count(*) FROM employee").await.unwrap();
        assert_eq!(result.scalar().and_then(Value::as_f64), Some(7.0), "{kind}");
    }
    ctx.close().await;
}

#[tokio::test]
async fn test_join_lessons_agree_across_engines() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = loaded_context(&dir).await;

    let cartesian = ctx.compare("SELECT * FROM t1, t2").await;
    assert!(cartesian.agrees());
    for answer in &cartesian.answers {
        assert_eq!(answer.result.as_ref().unwrap().row_count(), 6);
    }

    // Booleans come back as 0/1 from SQLite and still compare equal
    let join = ctx
        .compare("SELECT t1.*, t2.bb FROM t1 JOIN t2 ON t1.t2_aa = t2.aa")
        .await;
    assert!(join.agrees(), "groups: {:?}", join.groups);
    let duck = join.answers[0].result.as_ref().unwrap();
    assert_eq!(duck.row_count(), 1);
    let bb = duck.column_index("bb").unwrap();
    assert_eq!(duck.rows[0].values[bb], Value::Text("x".into()));

    ctx.close().await;
}

#[tokio::test]
async fn test_repeated_queries_are_stable() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = loaded_context(&dir).await;

    let ordered = "SELECT sensor_id, timestamp, value FROM sensors ORDER BY sensor_id, timestamp";
    let unordered = "SELECT t1.a, t2.aa FROM t1, t2";
    for kind in [BackendKind::DuckDb, BackendKind::Sqlite] {
        let first = ctx.query(kind, ordered).await.unwrap();
        let second = ctx.query(kind, ordered).await.unwrap();
        assert_eq!(first.row_count(), 20);
        assert_eq!(first.rows, second.rows, "{kind}");

        // Without ORDER BY only the multiset of rows is guaranteed
        let first = ctx.query(kind, unordered).await.unwrap();
        let second = ctx.query(kind, unordered).await.unwrap();
        assert_eq!(
            dispatch::row_multiset(&first),
            dispatch::row_multiset(&second),
            "{kind}"
        );
    }
    ctx.close().await;
}

#[tokio::test]
async fn test_self_join_keeps_employee_without_boss() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = loaded_context(&dir).await;
    let lesson = lessons::find("self-join").unwrap();

    for kind in [BackendKind::DuckDb, BackendKind::Sqlite] {
        let result = ctx.query(kind, lesson.query).await.unwrap();
        assert_eq!(result.row_count(), 7);
        let name = result.column_index("emp_name").unwrap();
        let boss = result.column_index("boss_name").unwrap();
        let alice = result
            .rows
            .iter()
            .find(|r| r.values[name] == Value::Text("Alice".into()))
            .expect("Alice is in the result");
        assert!(alice.values[boss].is_null(), "{kind}");
    }
    ctx.close().await;
}

#[tokio::test]
async fn test_sqlite_rejects_table_shorthand_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = loaded_context(&dir).await;

    let err = ctx.query(BackendKind::Sqlite, "TABLE t1").await.unwrap_err();
    match &err {
        EngineError::QueryFailed { backend, message } => {
            assert_eq!(*backend, BackendKind::Sqlite);
            assert!(message.contains("syntax error"), "{message}");
        }
        other => panic!("expected a query failure, got {other:?}"),
    }
    ctx.close().await;
}

#[tokio::test]
async fn test_disabled_engine_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = loaded_context(&dir).await;
    let err = ctx.query(BackendKind::Postgres, "SELECT 1").await.unwrap_err();
    assert!(err.to_string().contains("not enabled"));
    ctx.close().await;
}

fn cli(dir: &TempDir, args: &[&str]) -> Cli {
    let duck = dir.path().join("demo.duckdb");
    let lite = dir.path().join("demo.sqlite");
    let tables = bundled_tables();
    let mut argv = vec![
        "sqltour".to_string(),
        "--engines".to_string(),
        "duckdb,sqlite".to_string(),
        "--tables-dir".to_string(),
        tables.to_string_lossy().into_owned(),
        "--duckdb-path".to_string(),
        duck.to_string_lossy().into_owned(),
        "--sqlite-path".to_string(),
        lite.to_string_lossy().into_owned(),
    ];
    argv.extend(args.iter().map(|a| a.to_string()));
    Cli::try_parse_from(argv).unwrap()
}

async fn run(dir: &TempDir, args: &[&str]) -> (u8, String) {
    let mut out = Vec::new();
    let status = commands::execute(cli(dir, args), &mut out).await;
    (status, String::from_utf8(out).unwrap())
}

#[tokio::test]
async fn test_cli_load_then_tour_lessons() {
    let dir = tempfile::tempdir().unwrap();

    let (status, out) = run(&dir, &["load"]).await;
    assert_eq!(status, EXIT_OK, "{out}");
    assert!(out.contains("Loaded 4 table(s) into 2 engine(s)."));

    let (status, out) = run(&dir, &["verify"]).await;
    assert_eq!(status, EXIT_OK, "{out}");
    assert!(out.contains("t1: DuckDB 2, SQLite 2 ✓"));

    // SQLite rejecting TABLE is part of the lesson, not a failure
    let (status, out) = run(&dir, &["tour", "--lesson", "table-shorthand"]).await;
    assert_eq!(status, EXIT_OK, "{out}");
    assert!(out.contains("--- PostgreSQL: skipped (not enabled)"));
    assert!(out.contains("Expected error: SQLite rejected the query"));
    assert!(out.contains("Note: TABLE is not supported"));

    let plots = dir.path().join("plots");
    let plot_dir = plots.to_string_lossy().into_owned();
    let (status, out) = run(&dir, &["tour", "--lesson", "moving-average", "--plot-dir", &plot_dir]).await;
    assert_eq!(status, EXIT_OK, "{out}");
    assert!(plots.join("moving-average-duckdb.svg").exists());
    assert!(plots.join("moving-average-sqlite.svg").exists());
}

#[tokio::test]
async fn test_cli_query_formats_and_failures() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(run(&dir, &["load"]).await.0, EXIT_OK);

    let (status, out) = run(
        &dir,
        &["query", "--engine", "sqlite", "--format", "csv", "SELECT aa, bb FROM t2 ORDER BY aa"],
    )
    .await;
    assert_eq!(status, EXIT_OK);
    assert_eq!(out, "aa,bb\n5,x\n6,y\n8,z\n\n");

    let (status, _) = run(&dir, &["query", "--engine", "sqlite", "TABLE t1"]).await;
    assert_eq!(status, EXIT_FAILURE);

    let (status, out) = run(&dir, &["compare", "SELECT count(*) AS n FROM sensors"]).await;
    assert_eq!(status, EXIT_OK, "{out}");
    assert!(out.contains("All 2 engine(s) agree."));

    let svg = dir.path().join("sensors.svg");
    let svg_path = svg.to_string_lossy().into_owned();
    let (status, out) = run(
        &dir,
        &[
            "plot", "--engine", "duckdb", "--x", "timestamp", "--y", "value", "--series-by",
            "sensor_id", "--out", &svg_path, "SELECT * FROM sensors",
        ],
    )
    .await;
    assert_eq!(status, EXIT_OK, "{out}");
    assert!(out.contains("(2 series, 20 points)"));
    assert!(std::fs::read_to_string(&svg).unwrap().starts_with("<svg"));
}

#[tokio::test]
async fn test_tour_list_needs_no_engine() {
    let mut out = Vec::new();
    let parsed = Cli::try_parse_from([
        "sqltour",
        "--duckdb-path",
        "/nonexistent/dir/demo.duckdb",
        "--pg-port",
        "1",
        "tour",
        "--list",
    ])
    .unwrap();
    let status = commands::execute(parsed, &mut out).await;
    assert_eq!(status, EXIT_OK);
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), lessons::LESSONS.len());
}
