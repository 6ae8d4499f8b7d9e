//! Emulation session lifecycle
//!
//! One emulator process per test case, writing the firmware's serial output
//! to the log file and listening for monitor commands on the control socket.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::common::config::ToolSpec;
use crate::common::{paths, Error, Result};
use crate::pipeline::tool::{self, Vars};

use super::control;

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited on its own before `quit` was sent
    AlreadyExited(ExitStatus),
    /// Exited within the grace period after `quit`
    Graceful(ExitStatus),
    /// Still running after the grace period; killed
    Killed,
}

/// A running emulator
#[derive(Debug)]
pub struct EmulationSession {
    child: Child,
    log: PathBuf,
    socket: PathBuf,
}

impl EmulationSession {
    /// Spawn the emulator in the background and return immediately
    ///
    /// Leftover log and socket files from a previous case are removed first,
    /// so the log only ever holds this session's output.
    pub fn launch(spec: &ToolSpec, image: &Path, log: &Path, socket: &Path) -> Result<Self> {
        paths::remove_if_exists(log)?;
        paths::ensure_socket_dir(socket)?;
        paths::remove_socket(socket)?;

        let program = tool::resolve_program("emulator", &spec.program)?;
        let args = Vars::new()
            .with("image", image.display().to_string())
            .with("log", log.display().to_string())
            .with("socket", socket.display().to_string())
            .render_all(&spec.args);

        let mut cmd = Command::new(program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true);

        // Own process group, so a Ctrl-C meant for the harness doesn't reach it
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(Error::LaunchFailed)?;

        tracing::info!(
            pid = ?child.id(),
            log = %log.display(),
            socket = %socket.display(),
            "Emulator started"
        );

        Ok(Self {
            child,
            log: log.to_path_buf(),
            socket: socket.to_path_buf(),
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log
    }

    /// Wait for the emulator to exit on its own (cancel-safe)
    pub async fn wait_exit(&mut self) -> Result<ExitStatus> {
        Ok(self.child.wait().await?)
    }

    /// Ask the emulator to quit, then reclaim it
    ///
    /// The quit command is best-effort: an unreachable control socket is only
    /// logged. If the process is still alive after `grace`, it is killed.
    pub async fn terminate(mut self, grace: Duration) -> Termination {
        if let Ok(Some(status)) = self.child.try_wait() {
            tracing::debug!(%status, "Emulator already exited");
            return Termination::AlreadyExited(status);
        }

        if let Err(e) = control::send_command(&self.socket, control::QUIT).await {
            tracing::debug!(socket = %self.socket.display(), "Quit command not delivered: {}", e);
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(%status, "Emulator shut down");
                Termination::Graceful(status)
            }
            Ok(Err(e)) => {
                tracing::warn!("Failed to wait for emulator: {}", e);
                self.kill().await
            }
            Err(_) => {
                tracing::warn!(
                    grace_ms = grace.as_millis() as u64,
                    "Emulator ignored quit, killing it"
                );
                self.kill().await
            }
        }
    }

    async fn kill(&mut self) -> Termination {
        if let Err(e) = self.child.kill().await {
            tracing::warn!("Failed to kill emulator: {}", e);
        }
        Termination::Killed
    }
}
