//! CLI command definitions
//!
//! Defines the clap arguments and subcommands for the harness.

use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Arguments for a test run (the default action)
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Build environment passed to the build tool
    #[arg(long, short, required = true)]
    pub env: Option<String>,

    /// Run only this test case (bypasses discovery and exclusions)
    #[arg(long, short)]
    pub filter: Option<String>,

    /// Completion timeout in seconds, 0 waits forever (overrides config)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Keep output.log, report.xml and result.bin after the run
    #[arg(long)]
    pub keep_artifacts: bool,

    /// Stop after the first test case that doesn't pass
    #[arg(long)]
    pub fail_fast: bool,

    /// Print the run outcome as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the test cases a run would pick up
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse an existing emulator log and report its failures
    Parse {
        /// Path to the captured log
        log: PathBuf,

        /// Also run the report formatter when a summary line is found
        #[arg(long, requires = "env")]
        report: bool,

        /// Build environment (used by the report formatter)
        #[arg(long, short)]
        env: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
