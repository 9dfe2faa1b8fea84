//! JSON:API entity helper

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use farmos_wfs_harness::HarnessError;
use farmos_wfs_harness::auth::OAuthClient;
use farmos_wfs_harness::jsonapi::EntityHelper;
use farmos_wfs_harness::wfs::AssetType;

use crate::common::{BEARER, JSON_API, MockFarmos, asset_resource};

async fn entity_helper(farmos: &MockFarmos) -> EntityHelper {
    farmos.mount_token().await;
    let session = OAuthClient::from_config(&farmos.config)
        .unwrap()
        .authenticate(&farmos.config.oauth)
        .await
        .unwrap();
    EntityHelper::new(session, farmos.config.clone())
}

#[tokio::test]
async fn test_create_asset_posts_json_api_document() {
    let farmos = MockFarmos::start().await;
    let entities = entity_helper(&farmos).await;

    Mock::given(method("POST"))
        .and(path("/api/asset/land"))
        .and(header("content-type", JSON_API))
        .and(header("authorization", BEARER))
        .and(body_partial_json(json!({
            "data": {
                "type": "asset--land",
                "attributes": {
                    "name": "North field",
                    "land_type": "field",
                    "intrinsic_geometry": { "value": "POINT(-31.040038615465 39.592143995004)" },
                },
            },
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": asset_resource(&farmos.uri(), "land", "5f0a", "North field", "x"),
        })))
        .expect(1)
        .mount(&farmos.server)
        .await;

    let id = entities
        .create_asset(
            AssetType::Land,
            json!({
                "name": "North field",
                "intrinsic_geometry": { "value": "POINT(-31.040038615465 39.592143995004)" },
                "land_type": "field",
            }),
            None,
        )
        .await
        .unwrap();
    assert_eq!(id, "5f0a");
}

#[tokio::test]
async fn test_create_asset_with_relationship() {
    let farmos = MockFarmos::start().await;
    let entities = entity_helper(&farmos).await;

    Mock::given(method("POST"))
        .and(path("/api/asset/plant"))
        .and(body_partial_json(json!({
            "data": {
                "relationships": {
                    "plant_type": { "data": { "type": "taxonomy_term--plant_type", "id": "orange" } },
                },
            },
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": { "type": "asset--plant", "id": "plant-a", "attributes": {} },
        })))
        .expect(1)
        .mount(&farmos.server)
        .await;

    let id = entities
        .create_asset(
            AssetType::Plant,
            json!({ "name": "A" }),
            Some(json!({
                "plant_type": { "data": { "type": "taxonomy_term--plant_type", "id": "orange" } },
            })),
        )
        .await
        .unwrap();
    assert_eq!(id, "plant-a");
}

#[tokio::test]
async fn test_create_failure_reports_status() {
    let farmos = MockFarmos::start().await;
    let entities = entity_helper(&farmos).await;

    Mock::given(method("POST"))
        .and(path("/api/taxonomy_term/plant_type"))
        .respond_with(ResponseTemplate::new(422).set_body_string("Unprocessable"))
        .mount(&farmos.server)
        .await;

    let err = entities
        .create_taxonomy_term("plant_type", json!({ "name": "Orange Tree" }))
        .await
        .unwrap_err();
    match err {
        HarnessError::Status { status, body, .. } => {
            assert_eq!(status.as_u16(), 422);
            assert_eq!(body, "Unprocessable");
        }
        other => panic!("Expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_get_asset_by_type_and_id() {
    let farmos = MockFarmos::start().await;
    let entities = entity_helper(&farmos).await;

    let mut resource = asset_resource(
        &farmos.uri(),
        "land",
        "abc",
        "Example point",
        "Description [created by farmOS_wfs-qgis_tests]",
    );
    resource["attributes"]["geometry"] = json!({ "value": "POINT (10 10)" });
    resource["attributes"]["is_fixed"] = json!(false);
    farmos
        .mount_json_api_get("/api/asset/land/abc", json!({ "data": resource }))
        .await;

    let asset = entities
        .get_asset_by_type_and_id(AssetType::Land, "abc")
        .await
        .unwrap();
    assert_eq!(asset.attribute_str("name"), Some("Example point"));
    assert_eq!(asset.attribute_value("geometry"), Some("POINT (10 10)"));
    assert_eq!(asset.attribute("is_fixed"), Some(&json!(false)));
    assert!(asset.notes().contains("[created by"));
}

#[tokio::test]
async fn test_assert_asset_does_not_exist() {
    let farmos = MockFarmos::start().await;
    let entities = entity_helper(&farmos).await;

    Mock::given(method("GET"))
        .and(path("/api/asset/land/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&farmos.server)
        .await;
    farmos
        .mount_json_api_get(
            "/api/asset/land/still-here",
            json!({ "data": asset_resource(&farmos.uri(), "land", "still-here", "A", "") }),
        )
        .await;

    entities
        .assert_asset_does_not_exist(AssetType::Land, "gone")
        .await
        .unwrap();

    let err = entities
        .assert_asset_does_not_exist(AssetType::Land, "still-here")
        .await
        .unwrap_err();
    assert!(err.is_assertion());
}

#[tokio::test]
async fn test_delete_strips_resource_version() {
    let farmos = MockFarmos::start().await;
    let entities = entity_helper(&farmos).await;

    Mock::given(method("DELETE"))
        .and(path("/api/asset/land/abc"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&farmos.server)
        .await;

    entities
        .delete_entity(&format!("{}/api/asset/land/abc?resourceVersion=id%3A7", farmos.uri()))
        .await
        .unwrap();

    let requests = farmos.server.received_requests().await.unwrap();
    let delete = requests
        .iter()
        .find(|r| r.method.as_str() == "DELETE")
        .unwrap();
    assert_eq!(delete.url.query(), None);
}

#[tokio::test]
async fn test_get_all_follows_next_links() {
    let farmos = MockFarmos::start().await;
    let entities = entity_helper(&farmos).await;
    let base = farmos.uri();

    Mock::given(method("GET"))
        .and(path("/api/asset/land"))
        .and(query_param("page[offset]", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [asset_resource(&base, "land", "b", "B", "")],
        })))
        .mount(&farmos.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/asset/land"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [asset_resource(&base, "land", "a", "A", "")],
            "links": { "next": { "href": format!("{}/api/asset/land?page%5Boffset%5D=50", base) } },
        })))
        .mount(&farmos.server)
        .await;

    let all = entities
        .get_all(&farmos.api_url("asset/land"))
        .await
        .unwrap();
    let ids: Vec<&str> = all.data.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert!(all.next_href().is_none());
}
