use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::config::{ResolvedPolicy, RuntimePaths};
use crate::models::ToolEnvelope;
use crate::orchestrator::{Answer, answer_question};

pub const TOOL_ASK: &str = "agent.ask";

#[derive(Debug, Clone, Args)]
pub struct AskArgs {
    #[arg(value_name = "QUESTION")]
    pub question: String,
}

pub fn run(
    args: &AskArgs,
    runtime_paths: &RuntimePaths,
    resolved: &ResolvedPolicy,
) -> Result<()> {
    let tools = super::local_tools(runtime_paths, resolved)?;
    let answer = answer_question(&tools, &args.question).map_err(|error| {
        ToolEnvelope::from_tool_error(TOOL_ASK, &error)
            .with_policy(resolved)
            .into_failure()
    })?;

    match &answer {
        Answer::Blocked(blocked) => {
            eprintln!(
                "ask: blocked stage={} violations={}",
                blocked.stage,
                blocked.violations.join(",")
            );
            Err(ToolEnvelope::rejected(
                TOOL_ASK,
                "generated sql rejected by governance policy",
                &answer,
            )?
            .with_policy(resolved)
            .into_failure())
        }
        Answer::Executed(executed) => super::print_envelope(
            &ToolEnvelope::success(TOOL_ASK, &answer)?
                .with_meta("question", json!(args.question))
                .with_meta("row_count", json!(executed.result.rows().len()))
                .with_policy(resolved)
                .with_truncation_check(&executed.result),
        ),
    }
}
