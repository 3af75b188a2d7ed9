use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::ResolvedPolicy;
use crate::models::ToolEnvelope;
use crate::tools::{TOOL_LIST_METRICS, TOOL_SEMANTIC_MODEL, get_semantic_model, list_metrics};

pub const TOOL_QUERY_LOG_SCHEMA: &str = "catalog.query_log_schema";

#[derive(Debug, Clone, Args)]
pub struct CatalogArgs {
    #[command(subcommand)]
    pub command: CatalogCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CatalogCommand {
    /// List the governed metrics.
    Metrics,
    /// Allowed tables, metrics and dimensions.
    Model,
    /// JSON schema of a query log entry.
    Schema,
}

pub fn run(args: &CatalogArgs, resolved: &ResolvedPolicy) -> Result<()> {
    let envelope = match args.command {
        CatalogCommand::Metrics => ToolEnvelope::success(TOOL_LIST_METRICS, &list_metrics())?,
        CatalogCommand::Model => {
            ToolEnvelope::success(TOOL_SEMANTIC_MODEL, &get_semantic_model(&resolved.policy))?
                .with_policy(resolved)
        }
        CatalogCommand::Schema => {
            ToolEnvelope::success(TOOL_QUERY_LOG_SCHEMA, &crate::models::json_schema())?
        }
    };
    super::print_envelope(&envelope)
}
