use anyhow::Result;
use clap::Args;

use crate::config::ResolvedPolicy;
use crate::governance::validate;
use crate::models::ToolEnvelope;
use crate::tools::TOOL_VALIDATE;

#[derive(Debug, Clone, Args)]
pub struct ValidateArgs {
    #[arg(value_name = "SQL")]
    pub sql: String,
}

pub fn run(args: &ValidateArgs, resolved: &ResolvedPolicy) -> Result<()> {
    let result = validate(&args.sql, &resolved.policy);

    if !result.is_valid {
        eprintln!(
            "validate: rejected violations={}",
            result.violation_codes().join(",")
        );
        return Err(
            ToolEnvelope::rejected(TOOL_VALIDATE, "sql rejected by governance policy", &result)?
                .with_policy(resolved)
                .into_failure(),
        );
    }

    super::print_envelope(&ToolEnvelope::success(TOOL_VALIDATE, &result)?.with_policy(resolved))
}
