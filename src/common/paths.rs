//! Control socket and configuration paths
//!
//! Unix/macOS: the emulator's control socket lives under $XDG_RUNTIME_DIR or /tmp
//! Windows: a named pipe path (handled by the interprocess crate)

use std::io;
use std::path::{Path, PathBuf};

/// Name used for the runtime directory and the config directory
const APP_NAME: &str = "emu-harness";

/// Config file looked up in the working directory before the user config dir
pub const LOCAL_CONFIG_FILE: &str = "emu-harness.toml";

/// Default path of the emulator's control socket
///
/// Platform-specific:
/// - Unix: `$XDG_RUNTIME_DIR/emu-harness/monitor.sock` or `/tmp/emu-harness-<uid>/monitor.sock`
/// - Windows: a pipe name (handled by interprocess crate)
#[cfg(unix)]
pub fn default_socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_NAME).join("monitor.sock");
    }

    // Fallback to /tmp with uid so concurrent users don't collide
    let uid = unsafe { libc::getuid() };
    PathBuf::from(format!("/tmp/{}-{}", APP_NAME, uid)).join("monitor.sock")
}

#[cfg(windows)]
pub fn default_socket_path() -> PathBuf {
    let username = std::env::var("USERNAME").unwrap_or_else(|_| "default".to_string());
    PathBuf::from(format!(r"\\.\pipe\{}-{}", APP_NAME, username))
}

/// Ensure the directory holding the control socket exists
///
/// On Unix, a freshly created directory gets mode 0700
#[cfg(unix)]
pub fn ensure_socket_dir(socket: &Path) -> io::Result<()> {
    let dir = socket
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Invalid socket path"))?;

    if !dir.as_os_str().is_empty() && !dir.exists() {
        std::fs::create_dir_all(dir)?;
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
    }

    Ok(())
}

#[cfg(windows)]
pub fn ensure_socket_dir(_socket: &Path) -> io::Result<()> {
    Ok(())
}

/// Remove a stale socket left behind by a previous emulator
#[cfg(unix)]
pub fn remove_socket(socket: &Path) -> io::Result<()> {
    remove_if_exists(socket)
}

#[cfg(windows)]
pub fn remove_socket(_socket: &Path) -> io::Result<()> {
    // Named pipes are cleaned up by the OS
    Ok(())
}

/// Remove a file, treating "already gone" as success
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Get the user configuration directory
///
/// - Linux: `~/.config/emu-harness/`
/// - macOS: `~/Library/Application Support/emu-harness/`
/// - Windows: `%APPDATA%\emu-harness\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the user configuration file
pub fn user_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path_is_valid() {
        let path = default_socket_path();
        assert!(path.ends_with("monitor.sock") || cfg!(windows));
    }

    #[test]
    fn test_remove_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove_if_exists(&dir.path().join("absent.log")).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_socket_dir_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("run").join("monitor.sock");
        ensure_socket_dir(&socket).unwrap();
        assert!(socket.parent().unwrap().is_dir());
    }
}
