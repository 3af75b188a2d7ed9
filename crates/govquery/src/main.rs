#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use clap::error::ErrorKind;
use govquery::cli::app::{Cli, Command, RuntimeArgs};
use govquery::cli::commands;
use govquery::config::RuntimePaths;
use govquery::models::ToolEnvelopeCommandFailure;
use tracing_subscriber::EnvFilter;

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_VALIDATION_FAILURE: i32 = 2;
const EXIT_USAGE_ERROR: i32 = 64;

fn main() {
    init_tracing();
    std::process::exit(run());
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    let command_name = command_name(&cli.command);
    eprintln!("govquery: starting `{command_name}`");

    match execute(cli) {
        Ok(()) => {
            eprintln!("govquery: completed `{command_name}` (exit_code={EXIT_SUCCESS})");
            EXIT_SUCCESS
        }
        Err(error) => {
            let exit_code = classify_runtime_error(&error);
            if let Some(failure) = error.downcast_ref::<ToolEnvelopeCommandFailure>() {
                match serde_json::to_string_pretty(failure.envelope()) {
                    Ok(encoded) => println!("{encoded}"),
                    Err(encode_error) => {
                        eprintln!("failed to encode tool envelope: {encode_error}");
                    }
                }
            }
            eprintln!("govquery: failed `{command_name}` (exit_code={exit_code})");
            eprintln!("{error:#}");
            exit_code
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
    let policy = govquery::config::resolve_policy(&runtime_paths, cli.runtime.policy.as_deref())?;
    tracing::debug!(source = %policy.source, "resolved policy");

    match cli.command {
        Command::Ask(args) => commands::ask::run(&args, &runtime_paths, &policy),
        Command::Plan(args) => commands::plan::run(&args),
        Command::Validate(args) => commands::validate::run(&args, &policy),
        Command::Execute(args) => commands::execute::run(&args, &runtime_paths, &policy),
        Command::Catalog(args) => commands::catalog::run(&args, &policy),
        Command::Seed(args) => commands::seed::run(&args, &runtime_paths),
        Command::Logs(args) => commands::logs::run(&args, &runtime_paths),
        Command::Eval(args) => commands::eval::run(&args, &runtime_paths, &policy),
    }
}

fn classify_runtime_error(error: &anyhow::Error) -> i32 {
    if error
        .downcast_ref::<commands::eval::EvalCommandFailure>()
        .is_some()
    {
        return EXIT_VALIDATION_FAILURE;
    }

    match error
        .downcast_ref::<ToolEnvelopeCommandFailure>()
        .and_then(ToolEnvelopeCommandFailure::error_code)
    {
        Some(code) if code.is_governance_rejection() => EXIT_VALIDATION_FAILURE,
        _ => EXIT_RUNTIME_FAILURE,
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = error.print();
            EXIT_SUCCESS
        }
        _ => {
            let _ = error.print();
            EXIT_USAGE_ERROR
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Ask(_) => "ask",
        Command::Plan(_) => "plan",
        Command::Validate(_) => "validate",
        Command::Execute(_) => "execute",
        Command::Catalog(_) => "catalog",
        Command::Seed(_) => "seed",
        Command::Logs(_) => "logs",
        Command::Eval(_) => "eval",
    }
}

fn resolve_runtime_paths(args: &RuntimeArgs) -> Result<RuntimePaths> {
    let home_dir = match &args.home_dir {
        Some(path) => path.clone(),
        None => std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("HOME is not set; pass --home-dir"))?,
    };

    let cwd = match &args.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };

    govquery::config::resolve_runtime_paths(&home_dir, &cwd, args.out_dir.as_deref())
}
