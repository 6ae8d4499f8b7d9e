//! CLI command handling
//!
//! Turns parsed arguments into a harness run and formats the results.
//! Every entry point returns the process exit code.

use std::path::Path;
use std::time::Duration;

use colored::Colorize;

use crate::catalog::TestCase;
use crate::commands::{Commands, RunArgs};
use crate::common::config::{Config, ToolSpec};
use crate::common::{CancelToken, Error, Result};
use crate::parser::{self, Formatter};
use crate::testing::{print_failures, CaseReport, Harness, RunAccumulator, RunOptions, RunReport};

/// Run the catalog (the default action)
pub async fn run(args: RunArgs, config_path: Option<&Path>) -> Result<i32> {
    let mut config = Config::load(config_path)?;
    if let Some(secs) = args.timeout {
        config.timeouts.completion_secs = secs;
    }

    for (name, spec) in [
        ("build", &config.tools.build),
        ("merge", &config.tools.merge),
        ("emulator", &config.tools.emulator),
        ("report", &config.tools.report),
    ] {
        tracing::debug!(tool = name, command = %describe_tool(spec), "Configured tool");
    }

    let env = args
        .env
        .ok_or_else(|| Error::Config("--env is required".to_string()))?;

    let options = RunOptions {
        env,
        filter: args.filter,
        keep_artifacts: args.keep_artifacts,
        fail_fast: args.fail_fast,
        quiet: args.json,
    };

    let cancel = CancelToken::new();
    cancel.cancel_on_signal();

    let harness = Harness::new(config, cancel);
    let report = harness.run(&options).await;

    emit(&report, args.json)?;
    Ok(report.exit_code())
}

/// Dispatch a subcommand
pub async fn dispatch(command: Commands, config_path: Option<&Path>) -> Result<i32> {
    let config = Config::load(config_path)?;

    match command {
        Commands::List { json } => {
            let harness = Harness::new(config, CancelToken::new());
            let catalog = harness.catalog(None);

            if json {
                println!("{}", serde_json::to_string_pretty(catalog.cases())?);
            } else if catalog.cases().is_empty() {
                println!(
                    "No test cases found in {}",
                    harness.config().paths.test_root.display()
                );
            } else {
                for case in catalog.cases() {
                    print_case_entry(case);
                }
            }
            Ok(0)
        }

        Commands::Parse {
            log,
            report,
            env,
            json,
        } => {
            let env = env.unwrap_or_default();
            let formatter = report.then(|| Formatter {
                spec: &config.tools.report,
                env: &env,
                report: &config.paths.report,
            });

            let outcome = parser::parse(&log, formatter).await?;

            let name = log
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "log".to_string());
            let case = TestCase::new(name, false);
            let run = RunAccumulator::default()
                .fold(CaseReport::parsed(&case, outcome, Duration::ZERO))
                .finish();

            emit(&run, json)?;
            Ok(run.exit_code())
        }
    }
}

fn emit(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_failures(report);
    }
    Ok(())
}

fn print_case_entry(case: &TestCase) {
    if case.excluded {
        println!("  {} {}", case.name.dimmed(), "(hardware only, skipped)".dimmed());
    } else {
        println!("  {}", case.name);
    }
}

fn describe_tool(spec: &ToolSpec) -> String {
    std::iter::once(spec.program.as_str())
        .chain(spec.args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}
