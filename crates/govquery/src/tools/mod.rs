use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::governance::{Policy, ValidationResult, validate};
use crate::models::{QueryLogEntry, QueryStatus, ToolErrorCode};
use crate::semantic::{DimensionDefinition, MetricDefinition, dimension_catalog, metric_catalog};
use crate::sqlite::DEFAULT_STATEMENT_TIMEOUT;
use crate::utils::time::elapsed_ms;

pub const TOOL_LIST_METRICS: &str = "catalog.list_metrics";
pub const TOOL_SEMANTIC_MODEL: &str = "catalog.get_semantic_model";
pub const TOOL_VALIDATE: &str = "sql.validate";
pub const TOOL_EXECUTE: &str = "query.execute";
pub const SQL_VALIDATION_FAILED: &str = ToolErrorCode::SqlValidationFailed.as_str();

/// Failures of a tool call itself. Governance rejections are not errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("query execution failed: {0}")]
    Execution(String),

    /// Raised by `GovernedTools` implementations that reach the tools over a
    /// network; `LocalTools` never produces it.
    #[error("tool `{tool}` could not be reached: {message}")]
    Transport { tool: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteSuccess {
    pub ok: bool,
    pub row_count: usize,
    pub rows: Vec<Value>,
    pub sql: String,

    /// More rows matched than the row cap let through.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteBlocked {
    pub ok: bool,
    pub error: String,
    pub violations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecuteResponse {
    Success(ExecuteSuccess),
    Blocked(ExecuteBlocked),
}

impl ExecuteResponse {
    #[must_use]
    pub fn blocked(violations: Vec<String>) -> Self {
        Self::Blocked(ExecuteBlocked {
            ok: false,
            error: SQL_VALIDATION_FAILED.to_string(),
            violations,
        })
    }

    #[must_use]
    pub fn ok(&self) -> bool {
        match self {
            Self::Success(success) => success.ok,
            Self::Blocked(_) => false,
        }
    }

    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Success(success) => Some(success.sql.as_str()),
            Self::Blocked(_) => None,
        }
    }

    #[must_use]
    pub fn truncated(&self) -> bool {
        match self {
            Self::Success(success) => success.truncated,
            Self::Blocked(_) => false,
        }
    }

    #[must_use]
    pub fn rows(&self) -> &[Value] {
        match self {
            Self::Success(success) => &success.rows,
            Self::Blocked(_) => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticModel {
    pub allowed_tables: Vec<String>,
    pub metrics: Vec<MetricDefinition>,
    pub dimensions: Vec<DimensionDefinition>,
}

/// The validate and execute capabilities the orchestrator depends on.
pub trait GovernedTools {
    fn validate(&self, sql: &str) -> Result<ValidationResult, ToolError>;

    fn execute(&self, sql: &str, question: Option<&str>) -> Result<ExecuteResponse, ToolError>;
}

#[must_use]
pub fn list_metrics() -> Vec<MetricDefinition> {
    metric_catalog()
}

#[must_use]
pub fn get_semantic_model(policy: &Policy) -> SemanticModel {
    SemanticModel {
        allowed_tables: policy.allowed_tables().iter().cloned().collect(),
        metrics: metric_catalog(),
        dimensions: dimension_catalog(),
    }
}

/// Tools backed by the local SQLite mart, with telemetry in its query log.
#[derive(Debug, Clone)]
pub struct LocalTools {
    policy: Policy,
    mart_path: PathBuf,
    row_cap: usize,
    statement_timeout: Duration,
}

impl LocalTools {
    #[must_use]
    pub fn new(policy: Policy, mart_path: impl Into<PathBuf>) -> Self {
        let row_cap = usize::try_from(policy.max_limit()).unwrap_or(usize::MAX);
        Self {
            policy,
            mart_path: mart_path.into(),
            row_cap,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    #[must_use]
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    #[must_use]
    pub fn mart_path(&self) -> &Path {
        &self.mart_path
    }

    fn run_validated(
        &self,
        safe_sql: &str,
    ) -> anyhow::Result<crate::sqlite::QueryExecutionResult> {
        let connection = crate::sqlite::open_read_only_connection(&self.mart_path)?;
        crate::sqlite::execute_read_only_query(
            &connection,
            safe_sql,
            self.row_cap,
            self.statement_timeout,
        )
    }
}

impl GovernedTools for LocalTools {
    fn validate(&self, sql: &str) -> Result<ValidationResult, ToolError> {
        Ok(validate(sql, &self.policy))
    }

    fn execute(&self, sql: &str, question: Option<&str>) -> Result<ExecuteResponse, ToolError> {
        let started = Instant::now();
        let validation = validate(sql, &self.policy);

        let sanitized = validation.sanitized_sql.clone();
        let Some(safe_sql) = sanitized.filter(|_| validation.is_valid) else {
            let codes = validation.violation_codes();
            let entry = execution_entry(QueryStatus::Blocked, sql, question, started)
                .with_violation_codes(codes.clone());
            crate::telemetry::record(&self.mart_path, &entry);
            return Ok(ExecuteResponse::blocked(codes));
        };

        match self.run_validated(&safe_sql) {
            Ok(result) => {
                let entry = execution_entry(QueryStatus::Success, sql, question, started)
                    .with_validated_sql(&safe_sql)
                    .with_row_count(result.row_count);
                crate::telemetry::record(&self.mart_path, &entry);
                if result.truncated {
                    tracing::warn!(
                        row_cap = self.row_cap,
                        sql = %safe_sql,
                        "result truncated at row cap"
                    );
                }
                Ok(ExecuteResponse::Success(ExecuteSuccess {
                    ok: true,
                    row_count: result.row_count,
                    rows: result.rows,
                    sql: safe_sql,
                    truncated: result.truncated,
                }))
            }
            Err(error) => {
                let message = format!("{error:#}");
                let entry = execution_entry(QueryStatus::Error, sql, question, started)
                    .with_violation_codes(vec![message.clone()]);
                crate::telemetry::record(&self.mart_path, &entry);
                Err(ToolError::Execution(message))
            }
        }
    }
}

fn execution_entry(
    status: QueryStatus,
    raw_sql: &str,
    question: Option<&str>,
    started: Instant,
) -> QueryLogEntry {
    QueryLogEntry::new(TOOL_EXECUTE, status, raw_sql, elapsed_ms(started)).with_question(question)
}
