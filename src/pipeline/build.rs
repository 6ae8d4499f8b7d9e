//! Artifact builder: one build tool invocation per (environment, case)

use std::path::PathBuf;

use crate::catalog::TestCase;
use crate::common::config::ToolSpec;
use crate::common::{Error, Result};

use super::tool::{self, Vars};

/// A built (environment, case) pair and where its artifacts landed
#[derive(Debug, Clone)]
pub struct BuildTarget {
    pub env: String,
    pub case: TestCase,
    pub build_dir: PathBuf,
}

/// Build the firmware for `case` with the build tool's stdout suppressed
///
/// A non-zero exit status is a [`Error::BuildFailed`]; the artifacts in
/// `build_dir` are stale in that case and must not be merged.
pub async fn build(
    spec: &ToolSpec,
    env: &str,
    case: &TestCase,
    build_dir: PathBuf,
) -> Result<BuildTarget> {
    let vars = Vars::new()
        .with("env", env)
        .with("case", case.name.as_str())
        .with("build_dir", build_dir.display().to_string());
    let args = vars.render_all(&spec.args);

    tracing::info!(env, case = %case.name, "Building test firmware");

    let status = tool::run("build", spec, &args, true).await?;
    if !status.success() {
        return Err(Error::build_failed(&case.name, status));
    }

    Ok(BuildTarget {
        env: env.to_string(),
        case: case.clone(),
        build_dir,
    })
}
