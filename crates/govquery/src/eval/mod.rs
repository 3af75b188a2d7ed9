use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::orchestrator::{Answer, answer_question};
use crate::tools::GovernedTools;
use crate::utils::time::utc_now;

pub const DEFAULT_EVAL_CONFIG_PATH: &str = "evaluation/golden_questions.yml";
pub const DEFAULT_EVAL_REPORT_PATH: &str = "evaluation/latest.json";
const DEFAULT_MCP_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvalDocument {
    #[serde(default)]
    pub config: EvalConfig,

    #[serde(default)]
    pub tests: Vec<EvalCase>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvalConfig {
    #[serde(default = "default_mcp_base_url")]
    pub mcp_base_url: String,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            mcp_base_url: default_mcp_base_url(),
        }
    }
}

fn default_mcp_base_url() -> String {
    DEFAULT_MCP_BASE_URL.to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvalCase {
    pub id: String,
    pub question: String,

    #[serde(default)]
    pub expect: EvalExpectation,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct EvalExpectation {
    pub ok: Option<bool>,
    pub min_rows: Option<usize>,
    pub columns: Option<Vec<String>>,

    #[serde(default)]
    pub forbidden_sql_patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalCaseResult {
    pub id: String,
    pub ok: bool,
    pub error: Option<String>,
    pub details: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EvalSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalReport {
    pub generated_at_utc: String,
    pub mcp_base_url: String,
    pub summary: EvalSummary,
    pub results: Vec<EvalCaseResult>,
}

impl EvalReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.summary.failed == 0
    }
}

pub fn load_eval_document(path: &Path) -> Result<EvalDocument> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read evaluation config: {}", path.display()))?;
    serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse evaluation config: {}", path.display()))
}

#[must_use]
pub fn eval_report_path(out_dir: &Path) -> PathBuf {
    out_dir.join(DEFAULT_EVAL_REPORT_PATH)
}

pub fn write_eval_report(path: &Path, report: &EvalReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("failed to create evaluation report dir: {}", parent.display())
        })?;
    }
    let encoded =
        serde_json::to_string_pretty(report).context("failed to encode evaluation report")?;
    std::fs::write(path, encoded)
        .with_context(|| format!("failed to write evaluation report: {}", path.display()))?;
    Ok(())
}

/// Runs every case in document order through the orchestrator.
pub fn run_eval<T>(tools: &T, document: &EvalDocument) -> EvalReport
where
    T: GovernedTools + ?Sized,
{
    let results = document
        .tests
        .iter()
        .map(|case| run_case(tools, case))
        .collect::<Vec<_>>();
    let passed = results.iter().filter(|result| result.ok).count();

    EvalReport {
        generated_at_utc: utc_now(),
        mcp_base_url: document.config.mcp_base_url.clone(),
        summary: EvalSummary {
            total: results.len(),
            passed,
            failed: results.len() - passed,
        },
        results,
    }
}

pub fn run_case<T>(tools: &T, case: &EvalCase) -> EvalCaseResult
where
    T: GovernedTools + ?Sized,
{
    match answer_question(tools, &case.question) {
        Ok(answer) => check_answer(&case.id, &case.expect, &answer),
        Err(error) => failed(
            &case.id,
            "exception",
            json!({ "exception": error.to_string() }),
        ),
    }
}

fn check_answer(id: &str, expect: &EvalExpectation, answer: &Answer) -> EvalCaseResult {
    let response = serde_json::to_value(answer).unwrap_or(Value::Null);

    if expect.ok == Some(true) && !answer.ok() {
        return failed(id, "expected_ok_but_failed", json!({ "response": response }));
    }

    if !expect.forbidden_sql_patterns.is_empty() {
        let generated_sql = answer.generated_sql();
        let executed_sql = answer.executed_sql().unwrap_or_default();
        let haystack = format!("{generated_sql}\n{executed_sql}");
        let hits = match forbidden_pattern_hits(&haystack, &expect.forbidden_sql_patterns) {
            Ok(hits) => hits,
            Err(error) => {
                return failed(id, "exception", json!({ "exception": format!("{error:#}") }));
            }
        };
        if !hits.is_empty() {
            return failed(
                id,
                "forbidden_sql_detected",
                json!({
                    "hits": hits,
                    "generated_sql": generated_sql,
                    "executed_sql": executed_sql,
                }),
            );
        }
    }

    let rows: &[Value] = match answer {
        Answer::Executed(executed) => executed.result.rows(),
        Answer::Blocked(_) => &[],
    };

    if let Some(min_rows) = expect.min_rows
        && rows.len() < min_rows
    {
        return failed(
            id,
            "min_rows_not_met",
            json!({
                "expected_min_rows": min_rows,
                "actual_rows": rows.len(),
                "response": response,
            }),
        );
    }

    if let Some(columns) = expect.columns.as_ref().filter(|columns| !columns.is_empty())
        && !has_columns(rows, columns)
    {
        return failed(
            id,
            "missing_expected_columns",
            json!({
                "expected_columns": columns,
                "sample_row": rows.first(),
                "response": response,
            }),
        );
    }

    EvalCaseResult {
        id: id.to_string(),
        ok: true,
        error: None,
        details: json!({ "response": response }),
    }
}

fn forbidden_pattern_hits(haystack: &str, patterns: &[String]) -> Result<Vec<String>> {
    let mut hits = Vec::new();
    for pattern in patterns {
        let regex = Regex::new(pattern)
            .with_context(|| format!("invalid forbidden_sql_pattern `{pattern}`"))?;
        if regex.is_match(haystack) {
            hits.push(pattern.clone());
        }
    }
    Ok(hits)
}

fn has_columns(rows: &[Value], expected: &[String]) -> bool {
    let Some(first) = rows.first().and_then(Value::as_object) else {
        return false;
    };
    expected.iter().all(|column| first.contains_key(column))
}

fn failed(id: &str, error: &str, details: Value) -> EvalCaseResult {
    EvalCaseResult {
        id: id.to_string(),
        ok: false,
        error: Some(error.to_string()),
        details,
    }
}
