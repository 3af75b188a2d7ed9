use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::config::{ResolvedPolicy, RuntimePaths};
use crate::eval::{
    DEFAULT_EVAL_CONFIG_PATH, eval_report_path, load_eval_document, run_eval, write_eval_report,
};

#[derive(Debug, Clone, Args)]
pub struct EvalArgs {
    #[arg(long, value_name = "PATH", default_value = DEFAULT_EVAL_CONFIG_PATH)]
    pub config: PathBuf,
}

#[derive(Debug)]
pub struct EvalCommandFailure {
    pub failed: usize,
    pub total: usize,
    pub first_failure: Option<String>,
}

impl std::fmt::Display for EvalCommandFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "evaluation failed: {} of {} test(s) failed.",
            self.failed, self.total
        )?;
        if let Some(failure) = &self.first_failure {
            write!(f, " {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalCommandFailure {}

pub fn run(
    args: &EvalArgs,
    runtime_paths: &RuntimePaths,
    resolved: &ResolvedPolicy,
) -> Result<()> {
    let config_path = runtime_paths.resolve(&args.config)?;
    println!(
        "eval: start config={} policy={}",
        config_path.display(),
        resolved.source
    );

    let document = load_eval_document(&config_path)?;
    let tools = super::local_tools(runtime_paths, resolved)?;
    let report = run_eval(&tools, &document);
    let report_path = eval_report_path(&runtime_paths.out_dir);
    write_eval_report(&report_path, &report)?;

    for result in &report.results {
        println!(
            "eval: {} {}{}",
            if result.ok { "PASS" } else { "FAIL" },
            result.id,
            result
                .error
                .as_deref()
                .map(|error| format!(" error={error}"))
                .unwrap_or_default()
        );
    }
    println!(
        "eval: summary total={} passed={} failed={} report={}",
        report.summary.total,
        report.summary.passed,
        report.summary.failed,
        report_path.display()
    );

    if !report.passed() {
        let first_failure = report
            .results
            .iter()
            .find(|result| !result.ok)
            .map(|result| {
                format!(
                    "{}: {}",
                    result.id,
                    result.error.as_deref().unwrap_or("unknown")
                )
            });
        return Err(EvalCommandFailure {
            failed: report.summary.failed,
            total: report.summary.total,
            first_failure,
        }
        .into());
    }

    Ok(())
}
