//! Test case discovery
//!
//! A test case is an immediate subdirectory of the test root whose name
//! carries the configured prefix. Hardware-only cases stay in the catalog
//! but are flagged as excluded and skipped by the runner.

use serde::Serialize;
use std::path::Path;

use crate::common::config::CatalogConfig;
use crate::common::Error;

/// One discovered (or explicitly requested) test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCase {
    /// Directory name, also the identifier passed to the build tool
    pub name: String,
    /// Only meaningful on real hardware; not run under emulation
    pub excluded: bool,
}

impl TestCase {
    pub fn new(name: impl Into<String>, excluded: bool) -> Self {
        Self {
            name: name.into(),
            excluded,
        }
    }
}

/// The set of cases for one run
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    cases: Vec<TestCase>,
}

impl Catalog {
    /// Discover cases under `test_root`
    ///
    /// Names are sorted so failure reports come out in a stable order. An
    /// unreadable root is logged and yields an empty catalog.
    pub fn discover(test_root: &Path, rules: &CatalogConfig) -> Self {
        let names = match list_case_dirs(test_root, &rules.prefix) {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!("{}", e);
                Vec::new()
            }
        };

        let cases = names
            .into_iter()
            .map(|name| {
                let excluded = rules.exclude.contains(&name);
                TestCase::new(name, excluded)
            })
            .collect();

        Self { cases }
    }

    /// A catalog of exactly the named case
    ///
    /// Discovery is bypassed: the case runs even when it is in the exclusion
    /// set or doesn't exist on disk.
    pub fn single(name: &str, rules: &CatalogConfig) -> Self {
        if rules.exclude.iter().any(|e| e == name) {
            tracing::info!(case = name, "Running hardware-only case on explicit request");
        }
        Self {
            cases: vec![TestCase::new(name, false)],
        }
    }

    /// Explicit filter if given, discovery otherwise
    pub fn select(test_root: &Path, rules: &CatalogConfig, filter: Option<&str>) -> Self {
        match filter {
            Some(name) => Self::single(name, rules),
            None => Self::discover(test_root, rules),
        }
    }

    /// Every case, excluded ones included
    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    /// Cases that will actually run
    pub fn eligible(&self) -> impl Iterator<Item = &TestCase> {
        self.cases.iter().filter(|c| !c.excluded)
    }

    pub fn is_empty(&self) -> bool {
        self.eligible().next().is_none()
    }
}

fn list_case_dirs(test_root: &Path, prefix: &str) -> Result<Vec<String>, Error> {
    let discovery_failed = |e: std::io::Error| Error::DiscoveryFailed {
        path: test_root.display().to_string(),
        error: e.to_string(),
    };

    let mut names = Vec::new();
    for entry in std::fs::read_dir(test_root).map_err(discovery_failed)? {
        let entry = entry.map_err(discovery_failed)?;
        if !entry.path().is_dir() {
            continue;
        }
        // Non UTF-8 names can't be passed to the build tool as a filter anyway
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with(prefix) {
            names.push(name);
        }
    }

    names.sort();
    Ok(names)
}
