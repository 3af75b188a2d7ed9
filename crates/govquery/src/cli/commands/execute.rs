use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::config::{ResolvedPolicy, RuntimePaths};
use crate::models::ToolEnvelope;
use crate::tools::{ExecuteResponse, GovernedTools, TOOL_EXECUTE};

#[derive(Debug, Clone, Args)]
pub struct ExecuteArgs {
    #[arg(value_name = "SQL")]
    pub sql: String,

    /// Question recorded with the query log entry.
    #[arg(long, value_name = "TEXT")]
    pub question: Option<String>,
}

pub fn run(
    args: &ExecuteArgs,
    runtime_paths: &RuntimePaths,
    resolved: &ResolvedPolicy,
) -> Result<()> {
    let tools = super::local_tools(runtime_paths, resolved)?;
    let response = tools
        .execute(&args.sql, args.question.as_deref())
        .map_err(|error| {
            ToolEnvelope::from_tool_error(TOOL_EXECUTE, &error)
                .with_policy(resolved)
                .into_failure()
        })?;

    if let ExecuteResponse::Blocked(blocked) = &response {
        eprintln!(
            "execute: blocked violations={}",
            blocked.violations.join(",")
        );
        return Err(ToolEnvelope::rejected(
            TOOL_EXECUTE,
            "sql rejected by governance policy",
            &response,
        )?
        .with_policy(resolved)
        .into_failure());
    }

    super::print_envelope(
        &ToolEnvelope::success(TOOL_EXECUTE, &response)?
            .with_meta("mart", json!(tools.mart_path().display().to_string()))
            .with_policy(resolved)
            .with_truncation_check(&response),
    )
}
