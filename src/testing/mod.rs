//! Test run orchestration
//!
//! Runs the per-case pipeline over the whole catalog and folds the results
//! into one [`RunReport`], whose outcome decides the process exit status.

mod outcome;
mod runner;

pub use outcome::*;
pub use runner::{print_failures, Harness, RunOptions};
