use anyhow::Result;
use clap::Args;

use crate::models::ToolEnvelope;
use crate::planner::plan_question;

pub const TOOL_PLAN: &str = "agent.plan";

#[derive(Debug, Clone, Args)]
pub struct PlanArgs {
    #[arg(value_name = "QUESTION")]
    pub question: String,
}

pub fn run(args: &PlanArgs) -> Result<()> {
    let plan = plan_question(&args.question);
    super::print_envelope(&ToolEnvelope::success(TOOL_PLAN, &plan)?)
}
