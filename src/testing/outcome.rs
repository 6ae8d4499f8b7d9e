//! Per-case reports and the folded run outcome

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::catalog::TestCase;
use crate::common::{Error, Stage};
use crate::parser::{ParseOutcome, Summary};

/// Why a failure was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A `FAIL:` line printed by the firmware
    Assertion,
    /// The pipeline couldn't run the case to completion
    Stage,
}

/// One failure attributed to a test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub case: String,
    pub kind: FailureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    /// The exact log line for assertions, the error message for stages
    pub line: String,
}

impl FailureRecord {
    pub fn assertion(case: &str, line: impl Into<String>) -> Self {
        Self {
            case: case.to_string(),
            kind: FailureKind::Assertion,
            stage: None,
            line: line.into(),
        }
    }

    pub fn stage(case: &str, error: &Error) -> Self {
        Self {
            case: case.to_string(),
            kind: FailureKind::Stage,
            stage: error.stage(),
            line: error.to_string(),
        }
    }
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.stage) {
            (FailureKind::Assertion, _) => f.write_str(&self.line),
            (FailureKind::Stage, Some(stage)) => {
                write!(f, "[{}] {} stage: {}", self.case, stage, self.line)
            }
            (FailureKind::Stage, None) => write!(f, "[{}] {}", self.case, self.line),
        }
    }
}

/// Classification of one case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    /// The firmware reported failed assertions
    Failed,
    /// A stage error stopped the case
    Errored,
    /// Completed, but the log had neither a summary nor a `FAIL:` line
    Inconclusive,
}

/// Everything recorded for one case
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub case: String,
    pub status: CaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    pub failures: Vec<FailureRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_error: Option<String>,
    pub duration_ms: u64,
}

impl CaseReport {
    /// Case that ran to completion and had its log parsed
    pub fn parsed(case: &TestCase, outcome: ParseOutcome, duration: Duration) -> Self {
        let failures: Vec<_> = outcome
            .scan
            .failures
            .into_iter()
            .map(|line| FailureRecord::assertion(&case.name, line))
            .collect();

        let status = if !failures.is_empty() {
            CaseStatus::Failed
        } else if outcome.scan.summary.is_none() {
            CaseStatus::Inconclusive
        } else {
            CaseStatus::Passed
        };

        Self {
            case: case.name.clone(),
            status,
            summary: outcome.scan.summary,
            failures,
            report_error: outcome.report_error,
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Case stopped by a stage error
    pub fn errored(case: &TestCase, error: &Error, duration: Duration) -> Self {
        Self {
            case: case.name.clone(),
            status: CaseStatus::Errored,
            summary: None,
            failures: vec![FailureRecord::stage(&case.name, error)],
            report_error: None,
            duration_ms: duration.as_millis() as u64,
        }
    }
}

/// Final result of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    AllPassed,
    SomeFailed { failures: Vec<FailureRecord> },
    EmptyCatalog,
}

impl RunOutcome {
    /// Process exit status: non-zero iff any failure was recorded
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::SomeFailed { .. } => -1,
            RunOutcome::AllPassed | RunOutcome::EmptyCatalog => 0,
        }
    }

    pub fn failures(&self) -> &[FailureRecord] {
        match self {
            RunOutcome::SomeFailed { failures } => failures,
            _ => &[],
        }
    }
}

/// Accumulator threaded through the run, one case at a time
#[derive(Debug, Clone, Default)]
pub struct RunAccumulator {
    cases: Vec<CaseReport>,
}

impl RunAccumulator {
    /// Append a case, keeping catalog order
    pub fn fold(mut self, report: CaseReport) -> Self {
        self.cases.push(report);
        self
    }

    pub fn finish(self) -> RunReport {
        let failures: Vec<_> = self
            .cases
            .iter()
            .flat_map(|c| c.failures.iter().cloned())
            .collect();

        let outcome = if self.cases.is_empty() {
            RunOutcome::EmptyCatalog
        } else if failures.is_empty() {
            RunOutcome::AllPassed
        } else {
            RunOutcome::SomeFailed { failures }
        };

        RunReport {
            cases: self.cases,
            outcome,
        }
    }
}

/// Per-case reports plus the derived outcome
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub cases: Vec<CaseReport>,
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LogScan;

    fn parsed(name: &str, failures: &[&str], summary: Option<Summary>) -> CaseReport {
        let outcome = ParseOutcome {
            scan: LogScan {
                failures: failures.iter().map(|s| s.to_string()).collect(),
                summary,
            },
            report: None,
            report_error: None,
        };
        CaseReport::parsed(&TestCase::new(name, false), outcome, Duration::ZERO)
    }

    fn summary(failures: u64) -> Option<Summary> {
        Some(Summary {
            tests: 4,
            failures,
            ignored: 0,
        })
    }

    #[test]
    fn test_empty_run() {
        let report = RunAccumulator::default().finish();
        assert_eq!(report.outcome, RunOutcome::EmptyCatalog);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_all_passed() {
        let report = RunAccumulator::default()
            .fold(parsed("test_a", &[], summary(0)))
            .fold(parsed("test_b", &[], None))
            .finish();
        assert_eq!(report.outcome, RunOutcome::AllPassed);
        assert_eq!(report.cases[1].status, CaseStatus::Inconclusive);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_failures_keep_catalog_order() {
        let report = RunAccumulator::default()
            .fold(parsed("test_a", &["FAIL: a1", "FAIL: a2"], summary(2)))
            .fold(parsed("test_b", &[], summary(0)))
            .fold(parsed("test_c", &["FAIL: c1"], None))
            .finish();

        let lines: Vec<_> = report.outcome.failures().iter().map(|f| f.to_string()).collect();
        assert_eq!(lines, ["FAIL: a1", "FAIL: a2", "FAIL: c1"]);
        assert_eq!(report.cases[0].status, CaseStatus::Failed);
        assert_eq!(report.exit_code(), -1);
    }

    #[test]
    fn test_stage_error_counts_as_failure() {
        let case = TestCase::new("test_a", false);
        let error = Error::MergeFailed {
            status: "exit code 2".to_string(),
        };
        let report = RunAccumulator::default()
            .fold(CaseReport::errored(&case, &error, Duration::ZERO))
            .finish();

        let failure = &report.outcome.failures()[0];
        assert_eq!(failure.kind, FailureKind::Stage);
        assert_eq!(failure.stage, Some(Stage::Compose));
        assert_eq!(
            failure.to_string(),
            "[test_a] compose stage: Image merge failed (exit code 2)"
        );
        assert_eq!(report.exit_code(), -1);
    }

    #[test]
    fn test_json_shape() {
        let report = RunAccumulator::default()
            .fold(parsed("test_a", &["FAIL: x"], None))
            .finish();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["outcome"], "some_failed");
        assert_eq!(json["failures"][0]["line"], "FAIL: x");
        assert_eq!(json["cases"][0]["status"], "failed");
    }
}
