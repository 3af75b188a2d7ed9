use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_VALIDATION_FAILURE: i32 = 2;
const EXIT_USAGE_ERROR: i32 = 64;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}-{nanos}"))
}

fn govquery(temp: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_govquery"))
        .arg("--home-dir")
        .arg(temp)
        .arg("--cwd")
        .arg(temp)
        .arg("--out-dir")
        .arg(temp.join("out"))
        .args(args)
        .output()
        .expect("command should execute")
}

fn seeded_workspace(prefix: &str) -> PathBuf {
    let temp = unique_temp_dir(prefix);
    std::fs::create_dir_all(&temp).expect("temp dir should be creatable");
    let output = govquery(&temp, &["seed"]);
    assert_eq!(output.status.code(), Some(EXIT_SUCCESS), "seed failed");
    temp
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be one json document")
}

#[test]
fn missing_required_args_exits_with_usage_code() {
    let status = Command::new(env!("CARGO_BIN_EXE_govquery"))
        .arg("validate")
        .status()
        .expect("command should execute");

    assert_eq!(status.code(), Some(EXIT_USAGE_ERROR));
}

#[test]
fn relative_home_dir_exits_with_runtime_code() {
    let status = Command::new(env!("CARGO_BIN_EXE_govquery"))
        .args(["--home-dir", "relative", "plan", "total sales"])
        .status()
        .expect("command should execute");

    assert_eq!(status.code(), Some(EXIT_RUNTIME_FAILURE));
}

#[test]
fn valid_sql_validates_with_success_code() {
    let temp = unique_temp_dir("govquery-exit-validate-ok");
    let output = govquery(&temp, &["validate", "SELECT * FROM dim_region"]);

    assert_eq!(output.status.code(), Some(EXIT_SUCCESS));
    let envelope = stdout_json(&output);
    assert_eq!(envelope["ok"], Value::Bool(true));
    assert_eq!(
        envelope["data"]["sanitized_sql"],
        "SELECT * FROM dim_region LIMIT 500"
    );
}

#[test]
fn rejected_sql_exits_with_validation_code() {
    let temp = unique_temp_dir("govquery-exit-validate-bad");
    let output = govquery(&temp, &["validate", "DROP TABLE fact_sales"]);

    assert_eq!(output.status.code(), Some(EXIT_VALIDATION_FAILURE));
    let envelope = stdout_json(&output);
    assert_eq!(envelope["ok"], Value::Bool(false));
    assert_eq!(envelope["error"]["code"], "sql_validation_failed");
}

#[test]
fn execute_without_seeded_mart_exits_with_runtime_code() {
    let temp = unique_temp_dir("govquery-exit-unseeded");
    let output = govquery(&temp, &["execute", "SELECT * FROM dim_region"]);

    assert_eq!(output.status.code(), Some(EXIT_RUNTIME_FAILURE));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("govquery seed"), "unexpected stderr: {stderr}");
}

#[test]
fn ask_answers_against_seeded_mart() {
    let temp = seeded_workspace("govquery-exit-ask");
    let output = govquery(&temp, &["ask", "total sales by region"]);

    assert_eq!(output.status.code(), Some(EXIT_SUCCESS));
    let envelope = stdout_json(&output);
    assert_eq!(envelope["tool"], "agent.ask");
    assert_eq!(envelope["data"]["metric"], "total_sales");
    assert_eq!(envelope["data"]["result"]["row_count"], 4);
}

#[test]
fn ask_blocked_by_policy_exits_with_validation_code() {
    let temp = seeded_workspace("govquery-exit-ask-blocked");
    let policy_path = temp.join("policy.yml");
    std::fs::write(
        &policy_path,
        "allowed_tables: [fact_sales, dim_region]\nmax_limit: 100\n",
    )
    .expect("policy should be writable");

    let output = govquery(
        &temp,
        &["--policy", "policy.yml", "ask", "total sales by product"],
    );

    assert_eq!(output.status.code(), Some(EXIT_VALIDATION_FAILURE));
    let envelope = stdout_json(&output);
    assert_eq!(envelope["error"]["details"]["stage"], "validate");
    assert_eq!(
        envelope["error"]["details"]["violations"][0],
        "table_not_allowed:dim_product"
    );
}

#[test]
fn logs_read_back_recent_executions() {
    let temp = seeded_workspace("govquery-exit-logs");
    let blocked = govquery(&temp, &["execute", "DELETE FROM fact_sales"]);
    assert_eq!(blocked.status.code(), Some(EXIT_VALIDATION_FAILURE));

    let output = govquery(&temp, &["logs", "--limit", "5"]);
    assert_eq!(output.status.code(), Some(EXIT_SUCCESS));
    let envelope = stdout_json(&output);
    assert_eq!(envelope["data"][0]["status"], "blocked");
    assert_eq!(envelope["data"][0]["raw_sql"], "DELETE FROM fact_sales");
}

#[test]
fn truncated_execution_warns_and_names_policy_source() {
    let temp = seeded_workspace("govquery-exit-truncated");
    std::fs::write(
        temp.join("policy.yml"),
        "allowed_tables: [fact_sales]\nmax_limit: 5\nenforce_limit: false\n",
    )
    .expect("policy should be writable");

    let output = govquery(
        &temp,
        &["--policy", "policy.yml", "execute", "SELECT sale_id FROM fact_sales"],
    );

    assert_eq!(output.status.code(), Some(EXIT_SUCCESS));
    let envelope = stdout_json(&output);
    assert_eq!(envelope["data"]["row_count"], 5);
    assert_eq!(envelope["data"]["truncated"], true);
    assert_eq!(envelope["warnings"][0]["code"], "result_truncated");
    assert_eq!(
        envelope["meta"]["policy"]["source"],
        temp.join("policy.yml").display().to_string()
    );
    assert_eq!(envelope["meta"]["policy"]["enforce_limit"], false);
}
