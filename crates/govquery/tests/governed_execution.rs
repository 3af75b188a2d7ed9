use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use govquery::governance::Policy;
use govquery::models::QueryStatus;
use govquery::orchestrator::{Answer, answer_question};
use govquery::tools::{ExecuteResponse, GovernedTools, LocalTools, ToolError};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}-{nanos}"))
}

fn seeded_mart(prefix: &str) -> PathBuf {
    let dir = unique_temp_dir(prefix);
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    let mart_path = dir.join("mart.sqlite");
    let mut connection =
        govquery::sqlite::open_sqlite_connection(&mart_path).expect("mart should open");
    govquery::sqlite::seed_demo_mart(&mut connection).expect("seed should succeed");
    mart_path
}

fn logged_statuses(mart_path: &Path) -> Vec<QueryStatus> {
    let connection =
        govquery::sqlite::open_read_only_connection(mart_path).expect("mart should open");
    govquery::sqlite::recent_query_logs(&connection, 50)
        .expect("query log should be readable")
        .into_iter()
        .map(|entry| entry.status)
        .collect()
}

#[test]
fn valid_sql_executes_with_enforced_limit() {
    let mart_path = seeded_mart("govquery-exec-valid");
    let tools = LocalTools::new(Policy::default(), &mart_path);

    let response = tools
        .execute(
            "SELECT region_name FROM dim_region ORDER BY region_name;",
            None,
        )
        .expect("execution should succeed");

    let ExecuteResponse::Success(success) = response else {
        panic!("expected success response");
    };
    assert_eq!(success.row_count, 4);
    assert_eq!(
        success.sql,
        "SELECT region_name FROM dim_region ORDER BY region_name LIMIT 500"
    );
    assert_eq!(logged_statuses(&mart_path), vec![QueryStatus::Success]);
}

#[test]
fn unenforced_limit_still_caps_rows_and_reports_truncation() {
    let mart_path = seeded_mart("govquery-exec-truncated");
    let policy = Policy::new(["fact_sales"], 5, false).expect("policy builds");
    let tools = LocalTools::new(policy, &mart_path);

    let response = tools
        .execute("SELECT sale_id FROM fact_sales", None)
        .expect("execution should succeed");

    assert!(response.truncated());
    let ExecuteResponse::Success(success) = response else {
        panic!("expected success response");
    };
    assert_eq!(success.row_count, 5);
    assert_eq!(success.sql, "SELECT sale_id FROM fact_sales");

    let complete = tools
        .execute("SELECT sale_id FROM fact_sales LIMIT 3", None)
        .expect("execution should succeed");
    assert!(!complete.truncated());
    assert_eq!(complete.rows().len(), 3);
}

#[test]
fn repeated_trailing_semicolons_execute_once() {
    let mart_path = seeded_mart("govquery-exec-semicolons");
    let tools = LocalTools::new(Policy::default(), &mart_path);

    let response = tools
        .execute("SELECT region_name FROM dim_region ; ;", None)
        .expect("execution should succeed");

    assert_eq!(response.sql(), Some("SELECT region_name FROM dim_region LIMIT 500"));
    assert_eq!(response.rows().len(), 4);
}

#[test]
fn question_flows_through_plan_validate_execute() {
    let mart_path = seeded_mart("govquery-exec-ask");
    let tools = LocalTools::new(Policy::default(), &mart_path);

    let answer = answer_question(&tools, "total sales by region").expect("answer should run");
    let Answer::Executed(executed) = answer else {
        panic!("expected executed answer");
    };

    let rows = executed.result.rows();
    assert_eq!(rows.len(), 4);
    assert!(rows[0].get("region_name").is_some());
    assert!(rows[0].get("total_sales").is_some());
    assert_eq!(
        executed.executed_sql,
        format!("{} LIMIT 500", executed.generated_sql)
    );

    let totals = rows
        .iter()
        .filter_map(|row| row["total_sales"].as_f64())
        .collect::<Vec<_>>();
    assert!(
        totals.windows(2).all(|pair| pair[0] >= pair[1]),
        "rows should be ordered by metric descending: {totals:?}"
    );

    let connection =
        govquery::sqlite::open_read_only_connection(&mart_path).expect("mart should open");
    let entries = govquery::sqlite::recent_query_logs(&connection, 1).expect("log read");
    assert_eq!(entries[0].question.as_deref(), Some("total sales by region"));
    assert_eq!(entries[0].row_count, Some(4));
}

#[test]
fn blocked_sql_is_logged_and_never_run() {
    let mart_path = seeded_mart("govquery-exec-blocked");
    let tools = LocalTools::new(Policy::default(), &mart_path);

    let response = tools
        .execute("DELETE FROM fact_sales", Some("wipe it"))
        .expect("blocked is not an error");

    let ExecuteResponse::Blocked(blocked) = response else {
        panic!("expected blocked response");
    };
    assert!(!blocked.ok);
    assert_eq!(blocked.error, "sql_validation_failed");
    assert_eq!(
        blocked.violations,
        vec!["only_select_allowed", "disallowed_keyword:DELETE"]
    );

    let connection =
        govquery::sqlite::open_read_only_connection(&mart_path).expect("mart should open");
    let lines: i64 = connection
        .query_row("SELECT COUNT(*) FROM fact_sales", [], |row| row.get(0))
        .expect("count");
    assert_eq!(lines, 240);
    assert_eq!(logged_statuses(&mart_path), vec![QueryStatus::Blocked]);
}

#[test]
fn execution_errors_surface_and_are_logged() {
    let mart_path = seeded_mart("govquery-exec-error");
    let tools = LocalTools::new(Policy::default(), &mart_path);

    let error = tools
        .execute("SELECT no_such_column FROM fact_sales", None)
        .expect_err("unknown column should fail");
    assert!(matches!(error, ToolError::Execution(_)), "unexpected: {error}");

    let connection =
        govquery::sqlite::open_read_only_connection(&mart_path).expect("mart should open");
    let entries = govquery::sqlite::recent_query_logs(&connection, 1).expect("log read");
    assert_eq!(entries[0].status, QueryStatus::Error);
    assert!(entries[0].validated_sql.is_none());
}

#[test]
fn slow_statements_time_out_as_execution_errors() {
    let mart_path = seeded_mart("govquery-exec-timeout");
    let tools = LocalTools::new(Policy::default(), &mart_path)
        .with_statement_timeout(Duration::from_millis(20));

    let error = tools
        .execute(
            "SELECT COUNT(*) FROM fact_sales a JOIN fact_sales b JOIN fact_sales c JOIN fact_sales d",
            None,
        )
        .expect_err("cross join should exceed the timeout");

    let ToolError::Execution(message) = error else {
        panic!("expected execution error");
    };
    assert!(message.contains("statement timeout"), "unexpected: {message}");
}

#[test]
fn telemetry_records_every_outcome_newest_first() {
    let mart_path = seeded_mart("govquery-exec-telemetry");
    let tools = LocalTools::new(Policy::default(), &mart_path);

    tools
        .execute("SELECT COUNT(*) FROM fact_sales", None)
        .expect("success");
    tools
        .execute("SELECT * FROM query_log", None)
        .expect("blocked is not an error");
    tools
        .execute("SELECT missing FROM dim_date", None)
        .expect_err("error");

    assert_eq!(
        logged_statuses(&mart_path),
        vec![
            QueryStatus::Error,
            QueryStatus::Blocked,
            QueryStatus::Success
        ]
    );
}
