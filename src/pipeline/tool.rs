//! External tool invocation
//!
//! Every collaborator (build tool, merge tool, report formatter) is an opaque
//! program configured as a [`ToolSpec`]. Arguments are templates filled from
//! [`Vars`]; the exit status is always returned to the caller.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;

use crate::common::config::ToolSpec;
use crate::common::{Error, Result};

/// Placeholder values substituted into argument templates
#[derive(Debug, Default, Clone)]
pub struct Vars {
    pairs: Vec<(&'static str, String)>,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `{key}` substitution
    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.pairs.push((key, value.into()));
        self
    }

    /// Substitute every known `{key}` in `template`; unknown ones are left as-is
    ///
    /// Single pass: substituted values are never rendered again.
    pub fn render(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];
            let value = tail
                .find('}')
                .and_then(|close| self.lookup(&tail[1..close]).map(|v| (v, close)));

            match value {
                Some((value, close)) => {
                    out.push_str(value);
                    rest = &tail[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }

        out.push_str(rest);
        out
    }

    fn lookup(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Render every argument of a tool spec
    pub fn render_all(&self, args: &[String]) -> Vec<String> {
        args.iter().map(|a| self.render(a)).collect()
    }
}

/// Resolve a configured program to an executable path
pub fn resolve_program(tool: &str, program: &str) -> Result<PathBuf> {
    which::which(program).map_err(|_| Error::tool_not_found(tool, program))
}

/// Build a command for `spec` with already-rendered arguments
///
/// The child is killed if the returned future is dropped, so a cancelled or
/// expired stage does not leave the tool running.
pub fn command(tool: &str, spec: &ToolSpec, args: &[String]) -> Result<Command> {
    let program = resolve_program(tool, &spec.program)?;

    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);
    Ok(cmd)
}

/// Run a tool to completion and return its exit status
///
/// With `quiet`, the tool's stdout is discarded. Otherwise it goes to our
/// stderr, keeping stdout for run results. The tool's stderr passes through.
pub async fn run(tool: &str, spec: &ToolSpec, args: &[String], quiet: bool) -> Result<ExitStatus> {
    let mut cmd = command(tool, spec, args)?;
    if quiet {
        cmd.stdout(Stdio::null());
    } else {
        cmd.stdout(Stdio::from(std::io::stderr()));
    }

    tracing::debug!(tool, program = %spec.program, ?args, "Running tool");

    let status = cmd.status().await.map_err(|e| Error::tool_spawn(tool, e))?;

    tracing::debug!(tool, %status, "Tool finished");
    Ok(status)
}
