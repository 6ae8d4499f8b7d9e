//! Emulator test harness - firmware integration tests under emulation
//!
//! For every test case the harness builds a firmware image, merges it into a
//! flashable image, boots it in an emulator, waits for the firmware's
//! completion marker and parses the captured serial log for failures.

pub mod catalog;
pub mod cli;
pub mod commands;
pub mod common;
pub mod emulator;
pub mod monitor;
pub mod parser;
pub mod pipeline;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use testing::{FailureRecord, RunOutcome, RunReport};
