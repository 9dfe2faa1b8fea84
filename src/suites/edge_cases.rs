//! Malformed and unusual requests sent straight to the WFS endpoint

use reqwest::StatusCode;
use serde_json::json;

use crate::cleanup::mark_notes;
use crate::error::{HarnessError, HarnessResult};
use crate::harness::Harness;
use crate::suites::Suite;
use crate::wfs::feature_type::{AssetType, split_feature_id};
use crate::{ensure, ensure_eq};

pub fn suite() -> Suite {
    Suite {
        name: "edge_cases",
        cleanup: true,
        scenarios: vec![
            scenario!(post_fails_with_empty_request_body),
            scenario!(post_transaction_fails_with_empty_request_body),
            scenario!(post_transaction_fails_with_non_xml_request_body),
            scenario!(should_succeed_to_create_asset_with_formatted_xml),
            scenario!(should_fail_to_create_line_string_asset_in_point_layer),
            scenario!(feature_type_bbox_matches_expected_bbox_of_created_features),
        ],
    }
}

const FORMATTED_LINESTRING_INSERT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Transaction xmlns="http://www.opengis.net/wfs" xmlns:farmos="https://farmos.org/wfs" xmlns:gml="http://www.opengis.net/gml" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" service="WFS" version="1.1.0" xsi:schemaLocation="https://farmos.org/wfs http://localhost/wfs?SERVICE=WFS&amp;REQUEST=DescribeFeatureType&amp;VERSION=1.0.0&amp;TYPENAME=farmos:asset_land_linestring">
   <Insert>
      <asset_land_linestring xmlns="https://farmos.org/wfs">
         <name>TestBoundary6</name>
         <is_fixed>1</is_fixed>
         <land_type>other</land_type>
         <notes>Sample description... [created by farmOS_wfs-qgis_tests]</notes>
         <geometry>
            <gml:LineString srsName="EPSG:4326">
               <gml:posList srsDimension="2">-1.11684370257966625 -0.24127465857359631 -0.9256449165402123 0.06221547799696503 -0.39757207890743551 -0.13808801213960553 -0.24279210925644934 0.33535660091047037</gml:posList>
            </gml:LineString>
         </geometry>
      </asset_land_linestring>
   </Insert>
</Transaction>
"#;

const LINESTRING_INTO_POINT_INSERT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Transaction xmlns="http://www.opengis.net/wfs" xmlns:farmos="https://farmos.org/wfs" xmlns:gml="http://www.opengis.net/gml" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" service="WFS" version="1.1.0" xsi:schemaLocation="https://farmos.org/wfs http://localhost/wfs?SERVICE=WFS&amp;REQUEST=DescribeFeatureType&amp;VERSION=1.0.0&amp;TYPENAME=farmos:asset_land_point">
   <Insert>
      <asset_land_point xmlns="https://farmos.org/wfs">
         <name>TestBoundary7</name>
         <is_fixed>1</is_fixed>
         <land_type>other</land_type>
         <notes>Sample description... [created by farmOS_wfs-qgis_tests]</notes>
         <geometry>
            <gml:LineString srsName="EPSG:4326">
               <gml:posList srsDimension="2">-1.11684370257966625 -0.24127465857359631 -0.9256449165402123 0.06221547799696503 -0.39757207890743551 -0.13808801213960553 -0.24279210925644934 0.33535660091047037</gml:posList>
            </gml:LineString>
         </geometry>
      </asset_land_point>
   </Insert>
</Transaction>
"#;

const SERVICE_ONLY: &[(&str, &str)] = &[("SERVICE", "WFS")];
const TRANSACTION_REQUEST: &[(&str, &str)] = &[("SERVICE", "WFS"), ("REQUEST", "Transaction")];

async fn post_fails_with_empty_request_body(h: &Harness) -> HarnessResult<()> {
    let response = h.wfs_client().post_raw(SERVICE_ONLY, "").await?;
    ensure_eq!(response.status, StatusCode::BAD_REQUEST);
    Ok(())
}

async fn post_transaction_fails_with_empty_request_body(h: &Harness) -> HarnessResult<()> {
    let response = h.wfs_client().post_raw(TRANSACTION_REQUEST, "").await?;
    ensure_eq!(response.status, StatusCode::BAD_REQUEST);
    Ok(())
}

async fn post_transaction_fails_with_non_xml_request_body(h: &Harness) -> HarnessResult<()> {
    let response = h
        .wfs_client()
        .post_raw(TRANSACTION_REQUEST, "not real xml")
        .await?;
    ensure_eq!(response.status, StatusCode::BAD_REQUEST);
    Ok(())
}

async fn should_succeed_to_create_asset_with_formatted_xml(h: &Harness) -> HarnessResult<()> {
    let response = h
        .wfs_client()
        .post_raw(SERVICE_ONLY, FORMATTED_LINESTRING_INSERT)
        .await?;
    ensure_eq!(response.status, StatusCode::OK);

    let root = response.xml()?;
    let fid = root
        .find("InsertResults/Feature/FeatureId")
        .and_then(|e| e.attr("fid"))
        .ok_or_else(|| HarnessError::Assertion("Response has no inserted FeatureId".to_string()))?;
    let (_, asset_id) = split_feature_id(fid)
        .ok_or_else(|| HarnessError::Assertion(format!("Malformed feature id: {}", fid)))?;

    let asset = h
        .entities()
        .get_asset_by_type_and_id(AssetType::Land, asset_id)
        .await?;
    ensure_eq!(asset.attribute_str("name"), Some("TestBoundary6"));
    ensure_eq!(
        asset.attribute_value("geometry"),
        Some(
            "LINESTRING (-1.116843702579666 -0.2412746585735963, -0.9256449165402123 0.06221547799696503, \
             -0.3975720789074355 -0.1380880121396055, -0.2427921092564493 0.3353566009104704)"
        )
    );
    Ok(())
}

async fn should_fail_to_create_line_string_asset_in_point_layer(h: &Harness) -> HarnessResult<()> {
    let response = h
        .wfs_client()
        .post_raw(SERVICE_ONLY, LINESTRING_INTO_POINT_INSERT)
        .await?;
    // The server reports the rejected insert in the body, not the status
    ensure_eq!(response.status, StatusCode::OK);

    let root = response.xml()?;
    ensure_eq!(root.find_text("TransactionSummary/totalInserted"), Some("0"));
    ensure!(
        root.find("InsertResults/Feature/FeatureId").is_none(),
        "A feature id was returned for a rejected insert"
    );
    ensure_eq!(
        root.find_text("TransactionResults/Action/Message"),
        Some("Attempted to set geometry of type 'LineString' when expected geometry type should be 'Point'")
    );
    Ok(())
}

async fn feature_type_bbox_matches_expected_bbox_of_created_features(
    h: &Harness,
) -> HarnessResult<()> {
    let entities = h.entities();
    let orange_tree_id = entities
        .create_taxonomy_term("plant_type", json!({ "name": "Orange Tree" }))
        .await?;

    for (name, lon, lat) in [("A", 38, 19), ("B", 1, 21), ("C", -16, -13), ("D", 7, -5)] {
        entities
            .create_asset(
                AssetType::Plant,
                json!({
                    "name": name,
                    "notes": { "value": mark_notes("Sample description...") },
                    "intrinsic_geometry": { "value": format!("POINT({} {})", lon, lat) },
                    "is_fixed": true,
                }),
                Some(json!({
                    "plant_type": {
                        "data": {
                            "type": "taxonomy_term--plant_type",
                            "id": orange_tree_id,
                        },
                    },
                })),
            )
            .await?;
    }

    let capabilities = h.wfs_client().get_capabilities().await?;
    let feature_type = capabilities
        .feature_type("farmos:asset_plant_point")
        .ok_or_else(|| {
            HarnessError::Assertion("farmos:asset_plant_point is not advertised".to_string())
        })?;
    let bbox = feature_type.wgs84_bounding_box.as_ref().ok_or_else(|| {
        HarnessError::Assertion("farmos:asset_plant_point has no WGS84BoundingBox".to_string())
    })?;

    ensure_eq!(bbox.lower_corner, "-16 -13");
    ensure_eq!(bbox.upper_corner, "38 21");
    Ok(())
}
