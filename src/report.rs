//! Test outcomes and their JUnit XML rendering

use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;

use crate::error::{HarnessError, HarnessResult};
use crate::xml::XmlWriter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    /// An assertion about the system under test did not hold
    Failed(String),
    /// The scenario could not run to completion
    Errored(String),
    Skipped,
}

impl Outcome {
    pub fn from_result(result: &HarnessResult<()>) -> Self {
        match result {
            Ok(()) => Outcome::Passed,
            Err(e) if e.is_assertion() || matches!(e, HarnessError::Edit(_)) => {
                Outcome::Failed(e.to_string())
            }
            Err(e) => Outcome::Errored(e.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Passed | Outcome::Skipped)
    }

    fn label(&self) -> &'static str {
        match self {
            Outcome::Passed => "PASSED",
            Outcome::Failed(_) => "FAILED",
            Outcome::Errored(_) => "ERROR",
            Outcome::Skipped => "SKIPPED",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestCaseResult {
    pub name: String,
    pub outcome: Outcome,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub cases: Vec<TestCaseResult>,
}

impl SuiteReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp: Utc::now(),
            cases: Vec::new(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, outcome: Outcome, duration: Duration) {
        let name = name.into();
        tracing::info!("{}::{} {}", self.name, name, outcome.label());
        self.cases.push(TestCaseResult {
            name,
            outcome,
            duration,
        });
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.cases.iter().filter(|c| pred(&c.outcome)).count()
    }

    pub fn failures(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    pub fn errors(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Errored(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped))
    }

    pub fn duration(&self) -> Duration {
        self.cases.iter().map(|c| c.duration).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub suites: Vec<SuiteReport>,
}

impl RunReport {
    pub fn tests(&self) -> usize {
        self.suites.iter().map(|s| s.cases.len()).sum()
    }

    pub fn failures(&self) -> usize {
        self.suites.iter().map(SuiteReport::failures).sum()
    }

    pub fn errors(&self) -> usize {
        self.suites.iter().map(SuiteReport::errors).sum()
    }

    pub fn skipped(&self) -> usize {
        self.suites.iter().map(SuiteReport::skipped).sum()
    }

    pub fn is_success(&self) -> bool {
        self.suites
            .iter()
            .flat_map(|s| &s.cases)
            .all(|c| c.outcome.is_success())
    }

    pub fn summary(&self) -> String {
        format!(
            "{} tests: {} passed, {} failed, {} errors, {} skipped",
            self.tests(),
            self.tests() - self.failures() - self.errors() - self.skipped(),
            self.failures(),
            self.errors(),
            self.skipped()
        )
    }

    pub fn to_junit_xml(&self) -> HarnessResult<String> {
        let mut w = XmlWriter::new()?;

        let tests = self.tests().to_string();
        let failures = self.failures().to_string();
        let errors = self.errors().to_string();
        let skipped = self.skipped().to_string();
        let time = seconds(self.suites.iter().map(SuiteReport::duration).sum());
        w.start(
            "testsuites",
            &[
                ("name", "farmos-wfs-tests"),
                ("tests", tests.as_str()),
                ("failures", failures.as_str()),
                ("errors", errors.as_str()),
                ("skipped", skipped.as_str()),
                ("time", time.as_str()),
            ],
        )?;

        for suite in &self.suites {
            let tests = suite.cases.len().to_string();
            let failures = suite.failures().to_string();
            let errors = suite.errors().to_string();
            let skipped = suite.skipped().to_string();
            let time = seconds(suite.duration());
            let timestamp = suite.timestamp.format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
            w.start(
                "testsuite",
                &[
                    ("name", suite.name.as_str()),
                    ("tests", tests.as_str()),
                    ("failures", failures.as_str()),
                    ("errors", errors.as_str()),
                    ("skipped", skipped.as_str()),
                    ("time", time.as_str()),
                    ("timestamp", timestamp.as_str()),
                ],
            )?;

            for case in &suite.cases {
                let time = seconds(case.duration);
                let attrs = [
                    ("classname", suite.name.as_str()),
                    ("name", case.name.as_str()),
                    ("time", time.as_str()),
                ];
                match &case.outcome {
                    Outcome::Passed => w.empty("testcase", &attrs)?,
                    Outcome::Skipped => {
                        w.start("testcase", &attrs)?;
                        w.empty("skipped", &[])?;
                        w.end("testcase")?;
                    }
                    Outcome::Failed(message) | Outcome::Errored(message) => {
                        let tag = if matches!(case.outcome, Outcome::Failed(_)) {
                            "failure"
                        } else {
                            "error"
                        };
                        let first_line = message.lines().next().unwrap_or_default();
                        w.start("testcase", &attrs)?;
                        w.text_element(tag, &[("message", first_line)], message)?;
                        w.end("testcase")?;
                    }
                }
            }

            w.end("testsuite")?;
        }

        w.end("testsuites")?;
        w.finish()
    }

    pub fn write_junit(&self, path: &Path) -> HarnessResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_junit_xml()?)?;
        tracing::info!("Wrote JUnit report to {}", path.display());
        Ok(())
    }
}

fn seconds(duration: Duration) -> String {
    format!("{:.3}", duration.as_secs_f64())
}
