use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;

use crate::models::{QueryLogEntry, QueryStatus};
use crate::utils::time::utc_now;

pub const TELEMETRY_TARGET: &str = "telemetry";

impl QueryLogEntry {
    #[must_use]
    pub fn new(tool_name: &str, status: QueryStatus, raw_sql: &str, execution_ms: u64) -> Self {
        Self {
            logged_at_utc: utc_now(),
            tool_name: tool_name.to_string(),
            status,
            question: None,
            raw_sql: raw_sql.to_string(),
            validated_sql: None,
            violation_codes: None,
            row_count: None,
            execution_ms,
        }
    }

    #[must_use]
    pub fn with_question(mut self, question: Option<&str>) -> Self {
        self.question = question.map(ToString::to_string);
        self
    }

    #[must_use]
    pub fn with_validated_sql(mut self, validated_sql: &str) -> Self {
        self.validated_sql = Some(validated_sql.to_string());
        self
    }

    #[must_use]
    pub fn with_violation_codes(mut self, codes: Vec<String>) -> Self {
        self.violation_codes = Some(codes);
        self
    }

    #[must_use]
    pub fn with_row_count(mut self, row_count: usize) -> Self {
        self.row_count = Some(row_count as u64);
        self
    }
}

/// Emits the structured event for one query log entry.
pub fn log_event(entry: &QueryLogEntry) {
    match entry.status {
        QueryStatus::Success => tracing::info!(
            target: TELEMETRY_TARGET,
            tool_name = %entry.tool_name,
            status = entry.status.as_str(),
            row_count = entry.row_count,
            execution_ms = entry.execution_ms,
            "query executed"
        ),
        QueryStatus::Blocked => tracing::warn!(
            target: TELEMETRY_TARGET,
            tool_name = %entry.tool_name,
            status = entry.status.as_str(),
            violations = ?entry.violation_codes,
            execution_ms = entry.execution_ms,
            "query blocked"
        ),
        QueryStatus::Error => tracing::error!(
            target: TELEMETRY_TARGET,
            tool_name = %entry.tool_name,
            status = entry.status.as_str(),
            error = ?entry.violation_codes,
            execution_ms = entry.execution_ms,
            "query failed"
        ),
    }
}

pub fn persist(connection: &Connection, entry: &QueryLogEntry) -> Result<i64> {
    crate::sqlite::insert_query_log(connection, entry)
}

/// Logs and appends `entry` to the mart's query log. Persistence failures
/// are reported as warnings and never change the request outcome.
pub fn record(mart_path: &Path, entry: &QueryLogEntry) {
    log_event(entry);

    let persisted = crate::sqlite::open_sqlite_connection(mart_path)
        .and_then(|connection| {
            crate::sqlite::ensure_mart_schema(&connection)?;
            persist(&connection, entry)
        });
    if let Err(error) = persisted {
        tracing::warn!(
            target: TELEMETRY_TARGET,
            mart = %mart_path.display(),
            error = %format!("{error:#}"),
            "failed to persist query log entry"
        );
    }
}
