use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use farmos_wfs_harness::{
    config::HarnessConfig,
    runner::{Runner, RunnerArgs},
    suites,
};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "farmos_wfs_harness=debug,reqwest=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = match RunnerArgs::from_env() {
        Ok(args) => args,
        Err(e) => e.exit(),
    };

    // Load configuration
    let config = HarnessConfig::load()?;
    tracing::info!("Testing farmOS at {}", config.base_url());

    let runner = Runner::new(config, args.clone());

    if args.list {
        for suite in runner.select(suites::all_suites()) {
            for scenario in &suite.scenarios {
                println!("{}", suite.case_id(scenario));
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let report = runner.run(suites::all_suites()).await;
    tracing::info!("{}", report.summary());

    match runner.results_file() {
        Some(path) => report.write_junit(&path)?,
        None => tracing::warn!("TEST_RESULTS_FILE not set, skipping JUnit report"),
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
