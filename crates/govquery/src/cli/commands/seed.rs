use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::config::RuntimePaths;
use crate::models::ToolEnvelope;

pub const TOOL_SEED: &str = "mart.seed";

#[derive(Debug, Clone, Args)]
pub struct SeedArgs {}

pub fn run(_args: &SeedArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let mart_path = runtime_paths.mart_path();
    eprintln!("seed: start mart={}", mart_path.display());

    let mut connection = crate::sqlite::open_sqlite_connection(&mart_path)?;
    let stats = crate::sqlite::seed_demo_mart(&mut connection)?;

    super::print_envelope(
        &ToolEnvelope::success(TOOL_SEED, &stats)?
        .with_meta("mart", json!(mart_path.display().to_string()))
        .with_meta("mart_schema_version", json!(crate::sqlite::MART_SCHEMA_VERSION)),
    )
}
