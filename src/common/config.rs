//! Configuration file handling
//!
//! Every section is optional; missing values fall back to the ESP32 +
//! PlatformIO + QEMU setup the harness was written for.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::{self, user_config_path, LOCAL_CONFIG_FILE};
use super::{Error, Result};
use crate::pipeline::layout::FlashImageLayout;

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// External tool command lines
    #[serde(default)]
    pub tools: Tools,

    /// Where each build artifact lands in the merged image
    #[serde(default)]
    pub layout: FlashImageLayout,

    /// Artifact and directory locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Test discovery rules
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Completion monitor settings
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,
}

/// An external program and its argument template
///
/// Arguments may contain `{placeholder}`s, see [`crate::pipeline::tool::Vars`].
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    /// Program name (looked up in PATH) or path
    pub program: String,

    /// Argument templates
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolSpec {
    fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// The four external collaborators
#[derive(Debug, Deserialize, Clone)]
pub struct Tools {
    #[serde(default = "default_build_tool")]
    pub build: ToolSpec,

    #[serde(default = "default_merge_tool")]
    pub merge: ToolSpec,

    #[serde(default = "default_emulator")]
    pub emulator: ToolSpec,

    #[serde(default = "default_report_tool")]
    pub report: ToolSpec,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            build: default_build_tool(),
            merge: default_merge_tool(),
            emulator: default_emulator(),
            report: default_report_tool(),
        }
    }
}

fn default_build_tool() -> ToolSpec {
    ToolSpec::new(
        "pio",
        &[
            "test",
            "-e",
            "{env}",
            "--without-uploading",
            "--without-testing",
            "-f",
            "{case}",
        ],
    )
}

fn default_merge_tool() -> ToolSpec {
    ToolSpec::new(
        "esptool.py",
        &[
            "--chip",
            "esp32",
            "merge_bin",
            "--output",
            "{image}",
            "--fill-flash-size",
            "{flash_size_mb}MB",
            "{segments}",
            "--flash_mode",
            "dio",
            "--flash_freq",
            "40m",
        ],
    )
}

fn default_emulator() -> ToolSpec {
    ToolSpec::new(
        "qemu-system-xtensa",
        &[
            "-machine",
            "esp32",
            "-drive",
            "file={image},if=mtd,format=raw",
            "-serial",
            "file:{log}",
            "-nographic",
            "-monitor",
            "unix:{socket},server,nowait",
        ],
    )
}

fn default_report_tool() -> ToolSpec {
    ToolSpec::new(
        "ruby",
        &[".pio/libdeps/{env}/Unity/auto/parse_output.rb", "-xml", "{log}"],
    )
}

/// Artifact locations, all relative to the working directory unless absolute
#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Directory whose subdirectories are test cases
    #[serde(default = "default_test_root")]
    pub test_root: PathBuf,

    /// Build output directory template (may use `{env}`)
    #[serde(default = "default_build_dir")]
    pub build_dir: String,

    /// Emulator serial capture
    #[serde(default = "default_log")]
    pub log: PathBuf,

    /// Merged flash image
    #[serde(default = "default_image")]
    pub image: PathBuf,

    /// Report written by the formatter
    #[serde(default = "default_report")]
    pub report: PathBuf,

    /// Emulator control socket (defaults to a per-user runtime path)
    #[serde(default)]
    pub socket: Option<PathBuf>,

    /// Keep a copy of each case's report here as `<case>.xml`
    #[serde(default)]
    pub report_archive: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            test_root: default_test_root(),
            build_dir: default_build_dir(),
            log: default_log(),
            image: default_image(),
            report: default_report(),
            socket: None,
            report_archive: None,
        }
    }
}

impl PathsConfig {
    /// Control socket path, configured or per-user default
    pub fn socket_path(&self) -> PathBuf {
        self.socket.clone().unwrap_or_else(paths::default_socket_path)
    }

    /// Build directory for an environment
    pub fn build_dir_for(&self, env: &str) -> PathBuf {
        PathBuf::from(self.build_dir.replace("{env}", env))
    }
}

fn default_test_root() -> PathBuf {
    PathBuf::from("test")
}
fn default_build_dir() -> String {
    ".pio/build/{env}".to_string()
}
fn default_log() -> PathBuf {
    PathBuf::from("output.log")
}
fn default_image() -> PathBuf {
    PathBuf::from("result.bin")
}
fn default_report() -> PathBuf {
    PathBuf::from("report.xml")
}

/// Test discovery rules
#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    /// Directory name prefix that marks a test case
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Cases that only make sense on real hardware
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            exclude: default_exclude(),
        }
    }
}

fn default_prefix() -> String {
    "test".to_string()
}
fn default_exclude() -> Vec<String> {
    vec!["test_gpio".to_string()]
}

/// Completion monitor settings
#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    /// Literal the firmware prints once it has finished
    #[serde(default = "default_marker")]
    pub marker: String,

    /// Delay between log polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            marker: default_marker(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

fn default_marker() -> String {
    "main_task: Returned from app_main()".to_string()
}
fn default_poll_interval() -> u64 {
    1000
}

/// Timeout settings; a value of 0 disables the corresponding bound
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// Maximum wait for the completion marker
    #[serde(default = "default_completion")]
    pub completion_secs: u64,

    /// Deadline covering every stage of one test case
    #[serde(default = "default_case")]
    pub case_secs: u64,

    /// Wait for the emulator to exit after `quit` before killing it
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            completion_secs: default_completion(),
            case_secs: default_case(),
            shutdown_grace_ms: default_shutdown_grace(),
        }
    }
}

impl Timeouts {
    pub fn completion(&self) -> Option<Duration> {
        non_zero_secs(self.completion_secs)
    }

    pub fn case(&self) -> Option<Duration> {
        non_zero_secs(self.case_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn default_completion() -> u64 {
    120
}
fn default_case() -> u64 {
    900
}
fn default_shutdown_grace() -> u64 {
    3000
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must exist. Otherwise `./emu-harness.toml` is tried,
    /// then the user config file, then built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Self::load_file(&local);
        }

        if let Some(path) = user_config_path() {
            if path.exists() {
                return Self::load_file(&path);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load and validate a specific config file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.layout.validate()?;

        if self.monitor.marker.is_empty() {
            return Err(Error::Config("monitor.marker must not be empty".to_string()));
        }

        for (name, tool) in [
            ("build", &self.tools.build),
            ("merge", &self.tools.merge),
            ("emulator", &self.tools.emulator),
            ("report", &self.tools.report),
        ] {
            if tool.program.trim().is_empty() {
                return Err(Error::Config(format!("tools.{name}.program must not be empty")));
            }
        }

        Ok(())
    }
}
