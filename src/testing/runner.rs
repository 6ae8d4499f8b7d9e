//! Run aggregator
//!
//! Runs build -> compose -> boot -> await -> parse for every eligible case,
//! one at a time, and folds the per-case reports into a single outcome.
//! Artifact paths are fixed and shared by all cases, which is what keeps
//! the run strictly sequential.

use std::path::Path;
use std::time::Instant;

use colored::Colorize;

use crate::catalog::{Catalog, TestCase};
use crate::common::config::Config;
use crate::common::{paths, CancelToken, Error, Result, Stage, StageContext};
use crate::emulator::EmulationSession;
use crate::monitor::{self, PollOptions};
use crate::parser::{self, Formatter, ParseOutcome};
use crate::pipeline::{self, report};

use super::outcome::{CaseReport, CaseStatus, RunAccumulator, RunReport};

/// Per-invocation options
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Build environment passed to the build tool
    pub env: String,
    /// Run only this case
    pub filter: Option<String>,
    /// Leave log, report and image in place after the run
    pub keep_artifacts: bool,
    /// Stop after the first case that doesn't pass
    pub fail_fast: bool,
    /// Suppress the human-readable progress output
    pub quiet: bool,
}

/// Drives a whole run
pub struct Harness {
    config: Config,
    cancel: CancelToken,
}

impl Harness {
    pub fn new(config: Config, cancel: CancelToken) -> Self {
        Self { config, cancel }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cases for this invocation
    pub fn catalog(&self, filter: Option<&str>) -> Catalog {
        Catalog::select(&self.config.paths.test_root, &self.config.catalog, filter)
    }

    /// Run every eligible case, then clean up
    ///
    /// Cleanup happens after all reports are folded in, so it cannot lose
    /// failure information.
    pub async fn run(&self, options: &RunOptions) -> RunReport {
        let catalog = self.catalog(options.filter.as_deref());
        if catalog.is_empty() {
            tracing::warn!(
                root = %self.config.paths.test_root.display(),
                "No test cases to run"
            );
        }

        let mut acc = RunAccumulator::default();
        for case in catalog.eligible() {
            if !options.quiet {
                println!("\n{} {}", "Running Test:".blue().bold(), case.name.white().bold());
            }

            let report = self.run_case(&options.env, case).await;
            if !options.quiet {
                print_case_result(&report);
            }

            let stop = self.cancel.is_cancelled()
                || (options.fail_fast && report.status != CaseStatus::Passed);
            acc = acc.fold(report);
            if stop {
                tracing::info!("Skipping remaining test cases");
                break;
            }
        }

        if !options.keep_artifacts {
            self.clean_artifacts();
        }

        acc.finish()
    }

    /// Run one case under its own deadline; errors become part of the report
    pub async fn run_case(&self, env: &str, case: &TestCase) -> CaseReport {
        let started = Instant::now();
        let ctx = StageContext::new(self.cancel.clone(), self.config.timeouts.case());

        match self.pipeline(&ctx, env, case).await {
            Ok(outcome) => CaseReport::parsed(case, outcome, started.elapsed()),
            Err(e) => {
                tracing::error!(case = %case.name, "{}", e);
                CaseReport::errored(case, &e, started.elapsed())
            }
        }
    }

    async fn pipeline(&self, ctx: &StageContext, env: &str, case: &TestCase) -> Result<ParseOutcome> {
        let config = &self.config;
        let paths = &config.paths;

        let target = ctx
            .guard(
                Stage::Build,
                pipeline::build(&config.tools.build, env, case, paths.build_dir_for(env)),
            )
            .await?;

        let image = ctx
            .guard(
                Stage::Compose,
                pipeline::compose(&config.tools.merge, &config.layout, &target, &paths.image),
            )
            .await?;

        let socket = paths.socket_path();
        let mut session = EmulationSession::launch(&config.tools.emulator, &image, &paths.log, &socket)?;

        let completed = ctx.guard(Stage::Await, self.await_completion(&mut session)).await;
        let termination = session.terminate(config.timeouts.shutdown_grace()).await;
        tracing::debug!(case = %case.name, ?termination, "Emulator session closed");
        completed?;

        let formatter = Formatter {
            spec: &config.tools.report,
            env,
            report: &paths.report,
        };
        let outcome = ctx
            .guard(Stage::Report, parser::parse(&paths.log, Some(formatter)))
            .await?;

        if let (Some(report_path), Some(archive)) = (&outcome.report, &paths.report_archive) {
            match report::archive(report_path, archive, &case.name) {
                Ok(dest) => tracing::debug!(dest = %dest.display(), "Report archived"),
                Err(e) => tracing::warn!("Failed to archive report: {}", e),
            }
        }

        Ok(outcome)
    }

    /// Wait for the marker, or for the emulator to die first
    async fn await_completion(&self, session: &mut EmulationSession) -> Result<()> {
        let config = &self.config;
        let log = session.log_path().to_path_buf();
        let marker = config.monitor.marker.as_str();
        let options = PollOptions {
            interval: config.monitor.poll_interval(),
            timeout: config.timeouts.completion(),
        };

        tokio::select! {
            completion = monitor::await_completion(&log, marker, options) => completion.map(|_| ()),
            exited = session.wait_exit() => {
                let status = exited?;
                // The marker may have landed right before the process went away
                if monitor::log_contains(&log, marker).await? {
                    return Ok(());
                }
                Err(Error::EmulatorExited {
                    status: crate::common::error::describe_status(status),
                })
            }
        }
    }

    /// Remove the per-case artifacts; missing files are not an error
    pub fn clean_artifacts(&self) {
        let paths = &self.config.paths;
        for artifact in [&paths.log, &paths.report, &paths.image] {
            remove_quietly(artifact);
        }
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = paths::remove_if_exists(path) {
        tracing::debug!(path = %path.display(), "Could not remove artifact: {}", e);
    }
}

fn print_case_result(report: &CaseReport) {
    let secs = report.duration_ms as f64 / 1000.0;
    match report.status {
        CaseStatus::Passed => {
            println!("  {} {} ({:.1}s)", "✓".green(), "Passed".green(), secs);
        }
        CaseStatus::Inconclusive => {
            println!(
                "  {} {} ({:.1}s)",
                "?".yellow(),
                "No summary or failure lines in log".yellow(),
                secs
            );
        }
        CaseStatus::Failed => {
            println!(
                "  {} {} ({} failed assertion(s), {:.1}s)",
                "✗".red(),
                "Failed".red(),
                report.failures.len(),
                secs
            );
        }
        CaseStatus::Errored => {
            for failure in &report.failures {
                println!("  {} {}", "✗".red(), failure.line);
            }
        }
    }

    if let Some(summary) = &report.summary {
        println!(
            "  {}",
            format!(
                "{} Tests {} Failures {} Ignored",
                summary.tests, summary.failures, summary.ignored
            )
            .dimmed()
        );
    }
}

/// Print the failure banner and every collected failure line
pub fn print_failures(report: &RunReport) {
    println!("=================== FAILURES =====================");
    for failure in report.outcome.failures() {
        println!("{}", failure);
    }
}
