//! Report formatter invocation and archiving

use std::path::{Path, PathBuf};

use crate::common::config::ToolSpec;
use crate::common::error::describe_status;
use crate::common::{Error, Result};

use super::tool::{self, Vars};

/// Run the formatter against the whole log
pub async fn generate(spec: &ToolSpec, env: &str, log: &Path, report: &Path) -> Result<()> {
    let vars = Vars::new()
        .with("env", env)
        .with("log", log.display().to_string())
        .with("report", report.display().to_string());
    let args = vars.render_all(&spec.args);

    tracing::info!(report = %report.display(), "Generating report");

    let status = tool::run("report", spec, &args, false).await?;
    if !status.success() {
        return Err(Error::ReportFailed {
            status: describe_status(status),
        });
    }
    Ok(())
}

/// Copy the report to `<archive>/<case>.xml` before the next case overwrites it
pub fn archive(report: &Path, archive_dir: &Path, case: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(archive_dir)?;
    let dest = archive_dir.join(format!("{case}.xml"));
    std::fs::copy(report, &dest)?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_names_report_after_case() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("report.xml");
        std::fs::write(&report, "<testsuite/>").unwrap();

        let dest = archive(&report, &dir.path().join("reports"), "test_print").unwrap();
        assert!(dest.ends_with("reports/test_print.xml"));
        assert_eq!(std::fs::read_to_string(dest).unwrap(), "<testsuite/>");
    }

    #[test]
    fn test_archive_missing_report_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = archive(&dir.path().join("absent.xml"), dir.path(), "test_print");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_formatter_receives_log_path() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("output.log");
        let report = dir.path().join("report.xml");
        let spec = ToolSpec {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "echo {log} > {report}".to_string()],
        };

        generate(&spec, "esp32dev", &log, &report).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(&report).unwrap().trim(),
            log.display().to_string()
        );
    }
}
