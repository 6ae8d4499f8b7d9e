//! Result parser
//!
//! Scans the captured log for the test framework's summary line
//! (`<n> Tests <n> Failures <n> Ignored`) and for `FAIL:` assertion lines.
//! Scanning stops at the first summary line; `FAIL:` lines seen before it
//! are kept.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::common::config::ToolSpec;
use crate::common::{Error, Result};
use crate::pipeline::report;

/// Substring marking a failed assertion
pub const FAIL_TAG: &str = "FAIL:";

/// Aggregate counts from the summary line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub tests: u64,
    pub failures: u64,
    pub ignored: u64,
}

/// What one pass over the log found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogScan {
    /// `FAIL:` lines, without line terminators, in log order
    pub failures: Vec<String>,
    /// First summary line, if any
    pub summary: Option<Summary>,
}

impl LogScan {
    /// False when the log had neither a summary nor a `FAIL:` line
    pub fn pattern_found(&self) -> bool {
        self.summary.is_some() || !self.failures.is_empty()
    }
}

/// Scan log text
pub fn scan(content: &str) -> LogScan {
    let mut result = LogScan::default();

    for line in content.lines() {
        if let Some(summary) = parse_summary(line) {
            result.summary = Some(summary);
            break;
        }

        if line.contains(FAIL_TAG) {
            result.failures.push(line.to_string());
        }
    }

    result
}

/// Read and scan a log file; invalid UTF-8 is replaced, not rejected
pub async fn scan_file(log: &Path) -> Result<LogScan> {
    let bytes = tokio::fs::read(log).await.map_err(|e| Error::FileRead {
        path: log.display().to_string(),
        error: e.to_string(),
    })?;
    Ok(scan(&String::from_utf8_lossy(&bytes)))
}

/// Match `<int> Tests <int> Failures <int> Ignored` anywhere in `line`
///
/// Any run of digits matches; counts too large for a `u64` saturate.
pub fn parse_summary(line: &str) -> Option<Summary> {
    const TESTS: &str = " Tests ";

    let mut from = 0;
    while let Some(pos) = line[from..].find(TESTS) {
        let at = from + pos;
        let head = &line[..at];
        let digits = head.len() - head.trim_end_matches(|c: char| c.is_ascii_digit()).len();

        if digits > 0 {
            if let Some((failures, ignored)) = parse_counts(&line[at + TESTS.len()..]) {
                let tests = saturating_count(&head[at - digits..]);
                return Some(Summary {
                    tests,
                    failures,
                    ignored,
                });
            }
        }

        from = at + 1;
    }
    None
}

fn parse_counts(rest: &str) -> Option<(u64, u64)> {
    let (failures, rest) = leading_number(rest)?;
    let rest = rest.strip_prefix(" Failures ")?;
    let (ignored, rest) = leading_number(rest)?;
    rest.starts_with(" Ignored").then_some((failures, ignored))
}

fn leading_number(s: &str) -> Option<(u64, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    Some((saturating_count(&s[..end]), &s[end..]))
}

fn saturating_count(digits: &str) -> u64 {
    digits.parse().unwrap_or(u64::MAX)
}

/// External formatter run when a summary line is found
#[derive(Debug, Clone, Copy)]
pub struct Formatter<'a> {
    pub spec: &'a ToolSpec,
    pub env: &'a str,
    pub report: &'a Path,
}

/// Scan result plus what happened to the report
#[derive(Debug)]
pub struct ParseOutcome {
    pub scan: LogScan,
    /// Report written by the formatter
    pub report: Option<PathBuf>,
    /// Formatter failure; doesn't change the case's assertions
    pub report_error: Option<String>,
}

/// Scan `log` and, if it has a summary line, run the formatter once
///
/// A log with neither a summary nor a `FAIL:` line is logged as
/// "pattern not found" and yields an empty scan, not an error.
pub async fn parse(log: &Path, formatter: Option<Formatter<'_>>) -> Result<ParseOutcome> {
    let scan = scan_file(log).await?;
    let mut outcome = ParseOutcome {
        scan,
        report: None,
        report_error: None,
    };

    if !outcome.scan.pattern_found() {
        tracing::warn!(log = %log.display(), "Pattern not found in log file");
        return Ok(outcome);
    }

    if let (Some(summary), Some(formatter)) = (outcome.scan.summary, formatter) {
        tracing::debug!(?summary, "Summary line found");
        match report::generate(formatter.spec, formatter.env, log, formatter.report).await {
            Ok(()) => outcome.report = Some(formatter.report.to_path_buf()),
            Err(e) => {
                tracing::warn!("{}", e);
                outcome.report_error = Some(e.to_string());
            }
        }
    }

    Ok(outcome)
}
