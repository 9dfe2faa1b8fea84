//! Sequential suite runner

use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{EXTRA_ARGS_VAR, HarnessConfig};
use crate::harness::{Harness, SetupOptions};
use crate::report::{Outcome, RunReport, SuiteReport};
use crate::suites::Suite;

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "farmos-wfs-tests", about = "End-to-end tests for the farmOS WFS module")]
pub struct RunnerArgs {
    /// Only run cases whose `suite::scenario` id contains this text (repeat to OR)
    #[arg(short = 'k', long = "filter", value_name = "SUBSTR")]
    pub filters: Vec<String>,

    /// Stop after the first failing case
    #[arg(short = 'x', long = "exitfirst")]
    pub exit_first: bool,

    /// Print the selected case ids and exit
    #[arg(long)]
    pub list: bool,

    /// Write the JUnit report here instead of TEST_RESULTS_FILE
    #[arg(long = "junit-xml", value_name = "PATH")]
    pub junit_xml: Option<PathBuf>,
}

impl RunnerArgs {
    /// Command line arguments followed by the whitespace-split contents of `PYTEST_EXTRA_ARGS`
    pub fn from_env() -> Result<Self, clap::Error> {
        let extra = std::env::var(EXTRA_ARGS_VAR).unwrap_or_default();
        Self::from_args(std::env::args_os(), &extra)
    }

    pub fn from_args<I, T>(args: I, extra: &str) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let args = args
            .into_iter()
            .map(Into::into)
            .chain(extra.split_whitespace().map(OsString::from));
        Self::try_parse_from(args)
    }

    pub fn selects(&self, case_id: &str) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| case_id.contains(f.as_str()))
    }
}

pub struct Runner {
    config: Arc<HarnessConfig>,
    args: RunnerArgs,
}

impl Runner {
    pub fn new(config: Arc<HarnessConfig>, args: RunnerArgs) -> Self {
        Self { config, args }
    }

    /// Suites reduced to the selected scenarios; suites left empty are dropped
    pub fn select(&self, suites: Vec<Suite>) -> Vec<Suite> {
        suites
            .into_iter()
            .filter_map(|mut suite| {
                let scenarios = suite
                    .scenarios
                    .iter()
                    .filter(|s| self.args.selects(&suite.case_id(s)))
                    .copied()
                    .collect::<Vec<_>>();
                suite.scenarios = scenarios;
                (!suite.scenarios.is_empty()).then_some(suite)
            })
            .collect()
    }

    pub fn results_file(&self) -> Option<PathBuf> {
        self.args
            .junit_xml
            .clone()
            .or_else(|| self.config.results_file.clone())
    }

    pub async fn run(&self, suites: Vec<Suite>) -> RunReport {
        let mut report = RunReport::default();

        for suite in self.select(suites) {
            let (suite_report, stop) = self.run_suite(&suite).await;
            report.suites.push(suite_report);
            if stop {
                tracing::warn!("Stopping after first failure");
                break;
            }
        }

        report
    }

    /// Run one suite with its own harness; the flag asks the caller to stop
    async fn run_suite(&self, suite: &Suite) -> (SuiteReport, bool) {
        let mut report = SuiteReport::new(suite.name);
        tracing::info!("Setting up suite {}", suite.name);

        let options = SetupOptions {
            cleanup: suite.cleanup,
        };
        let harness = match Harness::setup_with(self.config.clone(), options).await {
            Ok(harness) => harness,
            Err(e) => {
                tracing::error!("Setup of suite {} failed: {}", suite.name, e);
                for scenario in &suite.scenarios {
                    report.push(
                        scenario.name,
                        Outcome::Errored(format!("setup failed: {}", e)),
                        Default::default(),
                    );
                }
                return (report, self.args.exit_first);
            }
        };

        let mut stop = false;
        for scenario in &suite.scenarios {
            let started = Instant::now();
            let result = (scenario.run)(&harness).await;
            let outcome = Outcome::from_result(&result);
            if let Err(e) = &result {
                tracing::error!("{} failed: {}", suite.case_id(scenario), e);
            }

            let failed = !outcome.is_success();
            report.push(scenario.name, outcome, started.elapsed());

            if failed && self.args.exit_first {
                stop = true;
                break;
            }
        }

        harness.teardown();
        (report, stop)
    }
}
