//! Error types for the emulator test harness
//!
//! Messages name the failing stage and, where it helps, what to check next.
//! Assertion failures reported by the firmware are not errors; they are
//! [`FailureRecord`](crate::testing::FailureRecord)s.

use std::fmt;
use std::io;
use std::process::ExitStatus;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage a per-case error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Build,
    Compose,
    Launch,
    Await,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Build => "build",
            Stage::Compose => "compose",
            Stage::Launch => "launch",
            Stage::Await => "await",
            Stage::Report => "report",
        };
        f.write_str(name)
    }
}

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Catalog Errors ===
    #[error("Cannot read test root '{path}': {error}")]
    DiscoveryFailed { path: String, error: String },

    // === External Tool Errors ===
    #[error("Build of '{case}' failed ({status}). Re-run the build tool by hand to see its output")]
    BuildFailed { case: String, status: String },

    #[error("Image merge failed ({status})")]
    MergeFailed { status: String },

    #[error("Report formatter failed ({status})")]
    ReportFailed { status: String },

    #[error("{tool} tool '{program}' not found in PATH")]
    ToolNotFound { tool: String, program: String },

    #[error("Failed to run {tool} tool: {source}")]
    ToolSpawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid flash layout: {0}")]
    Layout(String),

    // === Emulator Errors ===
    #[error("Failed to launch emulator: {0}")]
    LaunchFailed(#[source] io::Error),

    #[error("Emulator exited ({status}) before the firmware signalled completion")]
    EmulatorExited { status: String },

    // === Timeout / Cancellation ===
    #[error("Completion marker '{marker}' not seen after {secs} seconds. The firmware may have crashed or hung")]
    CompletionTimeout { marker: String, secs: u64 },

    #[error("{stage} stage exceeded the per-case deadline of {secs} seconds")]
    StageTimeout { stage: Stage, secs: u64 },

    #[error("Run cancelled")]
    Cancelled,

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a build failure from the tool's exit status
    pub fn build_failed(case: &str, status: ExitStatus) -> Self {
        Self::BuildFailed {
            case: case.to_string(),
            status: describe_status(status),
        }
    }

    /// Create a merge failure from the tool's exit status
    pub fn merge_failed(status: ExitStatus) -> Self {
        Self::MergeFailed {
            status: describe_status(status),
        }
    }

    /// Create a tool spawn error
    pub fn tool_spawn(tool: &str, source: io::Error) -> Self {
        Self::ToolSpawn {
            tool: tool.to_string(),
            source,
        }
    }

    /// Create a tool-not-found error
    pub fn tool_not_found(tool: &str, program: &str) -> Self {
        Self::ToolNotFound {
            tool: tool.to_string(),
            program: program.to_string(),
        }
    }

    /// The stage this error belongs to, if it is a per-case pipeline error
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::BuildFailed { .. } => Some(Stage::Build),
            Error::MergeFailed { .. } | Error::Layout(_) => Some(Stage::Compose),
            Error::LaunchFailed(_) => Some(Stage::Launch),
            Error::EmulatorExited { .. } | Error::CompletionTimeout { .. } => Some(Stage::Await),
            Error::ReportFailed { .. } => Some(Stage::Report),
            Error::StageTimeout { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Render an exit status as "exit code N" or "killed by signal N"
pub fn describe_status(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exit code {}", code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("killed by signal {}", signal);
        }
    }

    "terminated abnormally".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_timeout_reports_its_stage() {
        let err = Error::StageTimeout {
            stage: Stage::Compose,
            secs: 5,
        };
        assert_eq!(err.stage(), Some(Stage::Compose));
        assert_eq!(
            err.to_string(),
            "compose stage exceeded the per-case deadline of 5 seconds"
        );
    }

    #[test]
    fn test_harness_errors_have_no_stage() {
        assert_eq!(Error::Cancelled.stage(), None);
        assert_eq!(Error::Config("x".into()).stage(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_describe_status() {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(describe_status(ExitStatus::from_raw(1 << 8)), "exit code 1");
        assert_eq!(describe_status(ExitStatus::from_raw(9)), "killed by signal 9");
    }
}
