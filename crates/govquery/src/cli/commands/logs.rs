use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use crate::config::RuntimePaths;
use crate::models::ToolEnvelope;

pub const TOOL_LOGS: &str = "telemetry.recent";

#[derive(Debug, Clone, Args)]
pub struct LogsArgs {
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

pub fn run(args: &LogsArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let mart_path = runtime_paths.existing_mart()?;
    let connection = crate::sqlite::open_read_only_connection(&mart_path)
        .with_context(|| format!("failed to open mart: {}", mart_path.display()))?;
    let entries = crate::sqlite::recent_query_logs(&connection, args.limit)?;

    super::print_envelope(
        &ToolEnvelope::success(TOOL_LOGS, &entries)?
        .with_meta("limit", json!(args.limit))
        .with_meta("returned", json!(entries.len())),
    )
}
