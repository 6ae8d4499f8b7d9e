//! Emulator test harness CLI
//!
//! Builds, boots and checks every firmware test case under emulation and
//! exits non-zero if any of them reported a failure.

use std::path::PathBuf;

use clap::Parser;
use emu_harness::commands::{Commands, RunArgs};
use emu_harness::{cli, common::logging};

#[derive(Parser)]
#[command(name = "emu-harness", about = "Run firmware integration tests under emulation")]
#[command(version, long_about = None)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (default: ./emu-harness.toml, then the user config)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    logging::init_cli(cli.verbose);

    let config = cli.config.as_deref();
    let result = match cli.command {
        Some(command) => cli::dispatch(command, config).await,
        None => cli::run(cli.run, config).await,
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
