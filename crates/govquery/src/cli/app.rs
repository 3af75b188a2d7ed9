use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::commands::{
    ask::AskArgs, catalog::CatalogArgs, eval::EvalArgs, execute::ExecuteArgs, logs::LogsArgs,
    plan::PlanArgs, seed::SeedArgs, validate::ValidateArgs,
};

#[derive(Debug, Parser)]
#[command(
    name = "govquery",
    version,
    about = "Governed natural-language analytics over a SQLite mart"
)]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, value_name = "PATH")]
    pub home_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub out_dir: Option<PathBuf>,

    /// Policy file (YAML or JSON) replacing the default allowlist and limit.
    #[arg(long, global = true, value_name = "PATH")]
    pub policy: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Answer a question through plan, validate and execute.
    Ask(AskArgs),
    /// Show the plan for a question without running it.
    Plan(PlanArgs),
    Validate(ValidateArgs),
    Execute(ExecuteArgs),
    Catalog(CatalogArgs),
    /// Create and populate the demo mart.
    Seed(SeedArgs),
    Logs(LogsArgs),
    Eval(EvalArgs),
}
