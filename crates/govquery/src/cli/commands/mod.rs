pub mod ask;
pub mod catalog;
pub mod eval;
pub mod execute;
pub mod logs;
pub mod plan;
pub mod seed;
pub mod validate;

use anyhow::{Context, Result};

use crate::config::{ResolvedPolicy, RuntimePaths};
use crate::models::ToolEnvelope;
use crate::tools::LocalTools;

pub(crate) fn print_envelope(envelope: &ToolEnvelope) -> Result<()> {
    let encoded = serde_json::to_string_pretty(envelope).context("failed to encode tool envelope")?;
    println!("{encoded}");
    Ok(())
}

/// Local tools over an already seeded mart.
pub(crate) fn local_tools(
    runtime_paths: &RuntimePaths,
    resolved: &ResolvedPolicy,
) -> Result<LocalTools> {
    let mart_path = runtime_paths.existing_mart()?;
    Ok(LocalTools::new(resolved.policy.clone(), mart_path))
}
