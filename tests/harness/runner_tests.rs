//! Suite setup and runs against the mock server

use wiremock::matchers::{method, path, query_param};
use wiremock::Mock;

use farmos_wfs_harness::Harness;
use farmos_wfs_harness::cleanup::CleanupReport;
use farmos_wfs_harness::report::Outcome;
use farmos_wfs_harness::runner::{Runner, RunnerArgs};
use farmos_wfs_harness::suites::all_suites;

use crate::common::{
    MockFarmos, asset_schema_xml, capabilities_xml, land_point_schema_xml, xml_response,
};

fn args(extra: &str) -> RunnerArgs {
    RunnerArgs::from_args(["farmos-wfs-tests"], extra).unwrap()
}

async fn mount_schema_suite(farmos: &MockFarmos) {
    farmos.mount_token().await;
    farmos.mount_capabilities().await;
    farmos
        .mount_schema("farmos:asset_land_point", &land_point_schema_xml())
        .await;
    farmos
        .mount_schema(
            "farmos:asset_water_linestring",
            &asset_schema_xml("asset_water_linestring", None, "LineString"),
        )
        .await;
    farmos
        .mount_schema(
            "farmos:asset_structure_polygon",
            &asset_schema_xml("asset_structure_polygon", Some("structure_type"), "Polygon"),
        )
        .await;
}

#[tokio::test]
async fn test_setup_runs_cleanup_and_discovery() {
    let farmos = MockFarmos::start().await;
    farmos.mount_token().await;
    farmos.mount_empty_bundles().await;
    farmos.mount_capabilities().await;

    let harness = Harness::setup(farmos.config.clone()).await.unwrap();
    assert_eq!(harness.cleanup_report(), Some(CleanupReport::default()));
    assert_eq!(harness.auth_config_id().len(), 7);
    assert!(harness.auth_manager().contains(harness.auth_config_id()));
    assert_eq!(harness.wfs().contents().len(), 18);
    harness.teardown();
}

#[tokio::test]
async fn test_schema_suite_passes() {
    let farmos = MockFarmos::start().await;
    mount_schema_suite(&farmos).await;

    let runner = Runner::new(farmos.config.clone(), args("-k schema::"));
    let report = runner.run(all_suites()).await;

    assert_eq!(report.tests(), 4, "{}", report.summary());
    assert!(report.is_success(), "{}", report.summary());
    assert_eq!(report.suites[0].name, "schema");

    // The schema suite leaves existing entities alone
    let requests = farmos.server.received_requests().await.unwrap();
    assert!(!requests.iter().any(|r| r.url.path().starts_with("/api/")));
}

#[tokio::test]
async fn test_failed_assertion_is_reported() {
    let farmos = MockFarmos::start().await;
    farmos.mount_token().await;
    Mock::given(method("GET"))
        .and(path("/wfs"))
        .and(query_param("REQUEST", "GetCapabilities"))
        .respond_with(xml_response(200, &capabilities_xml().replace("Test0", "Someone else")))
        .mount(&farmos.server)
        .await;

    let runner = Runner::new(farmos.config.clone(), args("-k schema::service_info"));
    let report = runner.run(all_suites()).await;

    assert_eq!(report.tests(), 1);
    assert_eq!(report.failures(), 1);
    let Outcome::Failed(message) = &report.suites[0].cases[0].outcome else {
        panic!("Expected failure, got {:?}", report.suites[0].cases[0].outcome);
    };
    assert!(message.contains("Someone else"), "{}", message);

    let dir = tempfile::tempdir().unwrap();
    let junit = dir.path().join("reports").join("results.xml");
    report.write_junit(&junit).unwrap();
    let xml = std::fs::read_to_string(&junit).unwrap();
    assert!(xml.contains(r#"name="service_info""#), "{}", xml);
    assert!(xml.contains("<failure"), "{}", xml);
}

#[tokio::test]
async fn test_exit_first_stops_after_failure() {
    let farmos = MockFarmos::start().await;
    farmos.mount_token().await;
    Mock::given(method("GET"))
        .and(path("/wfs"))
        .and(query_param("REQUEST", "GetCapabilities"))
        .respond_with(xml_response(200, &capabilities_xml().replace("Test0", "Nobody")))
        .mount(&farmos.server)
        .await;

    let runner = Runner::new(farmos.config.clone(), args("-x -k schema::"));
    let report = runner.run(all_suites()).await;

    assert_eq!(report.tests(), 1);
    assert!(!report.is_success());
}

#[tokio::test]
async fn test_setup_failure_errors_every_case() {
    let farmos = MockFarmos::start().await;
    farmos.mount_token_rejected().await;

    let runner = Runner::new(farmos.config.clone(), args("-k schema::"));
    let report = runner.run(all_suites()).await;

    assert_eq!(report.tests(), 4);
    assert_eq!(report.errors(), 4);
    assert!(!report.is_success());
    for case in &report.suites[0].cases {
        match &case.outcome {
            Outcome::Errored(msg) => assert!(msg.starts_with("setup failed"), "{}", msg),
            other => panic!("Expected error, got {:?}", other),
        }
    }
}
