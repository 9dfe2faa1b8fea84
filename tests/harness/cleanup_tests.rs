//! Removal of marked entities

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use farmos_wfs_harness::auth::OAuthClient;
use farmos_wfs_harness::cleanup::{CleanupReport, cleanup_old_assets};
use farmos_wfs_harness::jsonapi::EntityHelper;

use crate::common::{MockFarmos, asset_resource, bundle_resource};

const MARKED: &str = "North field [created by farmOS_wfs-qgis_tests]";

async fn entity_helper(farmos: &MockFarmos) -> EntityHelper {
    farmos.mount_token().await;
    let session = OAuthClient::from_config(&farmos.config)
        .unwrap()
        .authenticate(&farmos.config.oauth)
        .await
        .unwrap();
    EntityHelper::new(session, farmos.config.clone())
}

async fn mount_delete(farmos: &MockFarmos, url_path: &str, times: u64) {
    Mock::given(method("DELETE"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(204))
        .expect(times)
        .mount(&farmos.server)
        .await;
}

#[tokio::test]
async fn test_nothing_to_clean() {
    let farmos = MockFarmos::start().await;
    let entities = entity_helper(&farmos).await;
    farmos.mount_empty_bundles().await;

    let report = cleanup_old_assets(&entities).await.unwrap();
    assert_eq!(report, CleanupReport::default());
}

#[tokio::test]
async fn test_marked_logs_then_marked_assets_are_deleted() {
    let farmos = MockFarmos::start().await;
    let entities = entity_helper(&farmos).await;
    let base = farmos.uri();

    farmos
        .mount_json_api_get(
            "/api/log_type/log_type",
            json!({ "data": [bundle_resource("log_type", "activity")] }),
        )
        .await;
    farmos
        .mount_json_api_get(
            "/api/asset_type/asset_type",
            json!({ "data": [bundle_resource("asset_type", "land")] }),
        )
        .await;

    Mock::given(method("GET"))
        .and(path("/api/log/activity"))
        .and(query_param("include", "asset"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "type": "log--activity",
                    "id": "log-1",
                    "attributes": {},
                    "relationships": {
                        "asset": { "data": [{ "type": "asset--land", "id": "marked" }] },
                    },
                    "links": { "self": { "href": format!("{}/api/log/activity/log-1?resourceVersion=id%3A3", base) } },
                },
                {
                    "type": "log--activity",
                    "id": "log-2",
                    "attributes": {},
                    "relationships": {
                        "asset": { "data": [{ "type": "asset--land", "id": "kept" }] },
                    },
                    "links": { "self": { "href": format!("{}/api/log/activity/log-2", base) } },
                },
            ],
            "included": [
                asset_resource(&base, "land", "marked", "North field", MARKED),
                asset_resource(&base, "land", "kept", "Real field", "Planted 2019"),
            ],
        })))
        .mount(&farmos.server)
        .await;

    farmos
        .mount_json_api_get(
            "/api/asset/land",
            json!({
                "data": [
                    asset_resource(&base, "land", "marked", "North field", MARKED),
                    asset_resource(&base, "land", "kept", "Real field", "Planted 2019"),
                ],
            }),
        )
        .await;

    mount_delete(&farmos, "/api/log/activity/log-1", 1).await;
    mount_delete(&farmos, "/api/log/activity/log-2", 0).await;
    mount_delete(&farmos, "/api/asset/land/marked", 1).await;
    mount_delete(&farmos, "/api/asset/land/kept", 0).await;

    let report = cleanup_old_assets(&entities).await.unwrap();
    assert_eq!(
        report,
        CleanupReport {
            logs_deleted: 1,
            assets_deleted: 1,
        }
    );

    let requests = farmos.server.received_requests().await.unwrap();
    let deletes: Vec<&str> = requests
        .iter()
        .filter(|r| r.method.as_str() == "DELETE")
        .map(|r| r.url.path())
        .collect();
    assert_eq!(deletes, vec!["/api/log/activity/log-1", "/api/asset/land/marked"]);
}

#[tokio::test]
async fn test_failed_delete_aborts_cleanup() {
    let farmos = MockFarmos::start().await;
    let entities = entity_helper(&farmos).await;
    let base = farmos.uri();

    farmos
        .mount_json_api_get("/api/log_type/log_type", json!({ "data": [] }))
        .await;
    farmos
        .mount_json_api_get(
            "/api/asset_type/asset_type",
            json!({ "data": [bundle_resource("asset_type", "water")] }),
        )
        .await;
    farmos
        .mount_json_api_get(
            "/api/asset/water",
            json!({ "data": [asset_resource(&base, "water", "w1", "Creek", MARKED)] }),
        )
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/asset/water/w1"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&farmos.server)
        .await;

    assert!(cleanup_old_assets(&entities).await.is_err());
}
