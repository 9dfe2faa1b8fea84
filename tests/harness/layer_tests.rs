//! WFS-backed layers and their edit sessions

use farmos_wfs_harness::HarnessError;
use farmos_wfs_harness::geometry::{point_xy, rect_from_wkt};
use farmos_wfs_harness::layer::{Feature, VectorLayer};
use farmos_wfs_harness::xml;

use crate::common::{
    LandPoint, MockFarmos, asset_schema_xml, feature_collection, land_point_member,
    land_point_schema_xml, transaction_response,
};

const LAND_POINT: &str = "farmos:asset_land_point";

async fn open_land_points(farmos: &MockFarmos) -> VectorLayer {
    farmos.mount_token().await;
    farmos.mount_schema(LAND_POINT, &land_point_schema_xml()).await;
    farmos
        .mount_features(
            LAND_POINT,
            &feature_collection(&[
                land_point_member(&LandPoint {
                    uuid: "aaa",
                    name: "North field",
                    notes: "Sample description... [created by farmOS_wfs-qgis_tests]",
                    land_type: "field",
                    x: -31.040038615465,
                    y: 39.592143995004,
                }),
                land_point_member(&LandPoint {
                    uuid: "bbb",
                    name: "Paddock",
                    notes: "",
                    land_type: "paddock",
                    x: 10.0,
                    y: 10.0,
                }),
            ]),
        )
        .await;

    farmos
        .layer_helper()
        .get_wfs_vector_layer(LAND_POINT)
        .await
        .unwrap()
}

fn by_name(layer: &VectorLayer, name: &str) -> Feature {
    layer
        .find_feature(|f| f.attribute_str("name") == Some(name))
        .unwrap()
}

#[tokio::test]
async fn test_open_layer_loads_features() {
    let farmos = MockFarmos::start().await;
    let layer = open_land_points(&farmos).await;

    assert!(layer.is_valid());
    assert_eq!(layer.feature_count(), 2);
    assert!(layer.fields().names().contains(&"land_type"));

    let north = by_name(&layer, "North field");
    assert_eq!(north.fid(), Some("asset_land_point.aaa"));
    assert_eq!(north.attribute_str("land_type"), Some("field"));
    assert_eq!(
        north.geometry(),
        Some(&point_xy(-31.040038615465, 39.592143995004))
    );

    let uri = layer.uri().to_string();
    assert!(uri.contains("typename=farmos:asset_land_point"), "{}", uri);
    assert!(uri.ends_with("bbox=1"), "{}", uri);
}

#[tokio::test]
async fn test_geometry_mismatch_is_invalid() {
    let farmos = MockFarmos::start().await;
    farmos.mount_token().await;
    farmos
        .mount_schema(
            LAND_POINT,
            &asset_schema_xml("asset_land_point", Some("land_type"), "LineString"),
        )
        .await;

    let err = farmos
        .layer_helper()
        .get_wfs_vector_layer(LAND_POINT)
        .await
        .unwrap_err();
    assert!(matches!(err, HarnessError::InvalidLayer(_)), "{:?}", err);
}

#[tokio::test]
async fn test_unknown_type_name_is_rejected() {
    let farmos = MockFarmos::start().await;
    assert!(
        farmos
            .layer_helper()
            .get_wfs_vector_layer("farmos:asset_land_multipoint")
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_select_by_rect() {
    let farmos = MockFarmos::start().await;
    let mut layer = open_land_points(&farmos).await;

    layer.select_by_rect(&rect_from_wkt("POLYGON((9 9, 11 9, 11 11, 9 11, 9 9))").unwrap());
    let selected = layer.selected_features();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].attribute_str("name"), Some("Paddock"));

    layer.remove_selection();
    assert!(layer.selected_feature_ids().is_empty());
}

#[tokio::test]
async fn test_insert_commit() {
    let farmos = MockFarmos::start().await;
    let mut layer = open_land_points(&farmos).await;
    farmos
        .mount_transaction(
            200,
            &transaction_response((1, 0, 0), &[("new1", "asset_land_point.ccc")], &[]),
        )
        .await;

    let mut feature = Feature::new(layer.fields());
    feature.set_attribute("name", "New point").unwrap();
    feature.set_attribute("land_type", "field").unwrap();
    feature.set_geometry(point_xy(1.5, 2.0));

    let mut session = layer.start_editing().unwrap();
    let temp_id = session.add_feature(feature);
    assert!(temp_id < 0);
    let summary = session.commit().await.unwrap();

    assert_eq!(summary.inserted_fids, vec!["asset_land_point.ccc"]);
    assert_eq!(layer.feature_count(), 3);
    let inserted = layer.feature(summary.inserted[0]).unwrap();
    assert_eq!(inserted.fid(), Some("asset_land_point.ccc"));

    let bodies = farmos.received_bodies("POST", "/wfs").await;
    assert_eq!(bodies.len(), 1);
    let body = &bodies[0];
    assert!(body.contains(r#"<Insert handle="new1">"#), "{}", body);
    assert!(body.contains("<farmos:name>New point</farmos:name>"), "{}", body);
    assert!(body.contains("<farmos:land_type>field</farmos:land_type>"), "{}", body);
    assert!(body.contains("<gml:pos"), "{}", body);
    assert!(!body.contains("__uuid"), "{}", body);
}

#[tokio::test]
async fn test_rejected_insert_is_an_edit_error() {
    let farmos = MockFarmos::start().await;
    let mut layer = open_land_points(&farmos).await;
    farmos
        .mount_transaction(
            200,
            &transaction_response((0, 0, 0), &[], &["Invalid land_type: blahblah"]),
        )
        .await;

    let mut feature = Feature::new(layer.fields());
    feature.set_attribute("name", "Bad").unwrap();
    feature.set_attribute("land_type", "blahblah").unwrap();
    feature.set_geometry(point_xy(0.0, 0.0));

    let mut session = layer.start_editing().unwrap();
    session.add_feature(feature);
    let err = session.commit().await.unwrap_err();

    match err {
        HarnessError::Edit(msg) => assert!(msg.contains("blahblah"), "{}", msg),
        other => panic!("Expected edit error, got {:?}", other),
    }
    assert_eq!(layer.feature_count(), 2);
}

#[tokio::test]
async fn test_short_insert_total_is_an_edit_error() {
    let farmos = MockFarmos::start().await;
    let mut layer = open_land_points(&farmos).await;
    farmos
        .mount_transaction(200, &transaction_response((0, 0, 0), &[], &[]))
        .await;

    let mut feature = Feature::new(layer.fields());
    feature.set_attribute("name", "Lost").unwrap();
    feature.set_geometry(point_xy(0.0, 0.0));

    let mut session = layer.start_editing().unwrap();
    session.add_feature(feature);
    assert!(matches!(session.commit().await, Err(HarnessError::Edit(_))));
}

#[tokio::test]
async fn test_update_sends_changed_properties_only() {
    let farmos = MockFarmos::start().await;
    let mut layer = open_land_points(&farmos).await;
    farmos
        .mount_transaction(200, &transaction_response((0, 1, 0), &[], &[]))
        .await;

    let mut north = by_name(&layer, "North field");
    north.set_attribute("name", "Renamed field").unwrap();

    let mut session = layer.start_editing().unwrap();
    assert!(session.update_feature(&north));
    let summary = session.commit().await.unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(
        layer.feature(north.id()).unwrap().attribute_str("name"),
        Some("Renamed field")
    );

    let bodies = farmos.received_bodies("POST", "/wfs").await;
    let body = &bodies[0];
    assert!(body.contains(r#"<Update typeName="farmos:asset_land_point">"#), "{}", body);
    assert!(body.contains("<Name>farmos:name</Name>"), "{}", body);
    assert!(body.contains("<Value>Renamed field</Value>"), "{}", body);
    assert!(body.contains(r#"<ogc:FeatureId fid="asset_land_point.aaa"/>"#), "{}", body);
    assert!(!body.contains("farmos:land_type"), "{}", body);
    assert!(!body.contains("farmos:geometry"), "{}", body);
}

#[tokio::test]
async fn test_delete_commit() {
    let farmos = MockFarmos::start().await;
    let mut layer = open_land_points(&farmos).await;
    farmos
        .mount_transaction(200, &transaction_response((0, 0, 1), &[], &[]))
        .await;

    let paddock = by_name(&layer, "Paddock");
    let mut session = layer.start_editing().unwrap();
    assert!(session.delete_feature(paddock.id()));
    assert!(!session.delete_feature(paddock.id()));
    let summary = session.commit().await.unwrap();

    assert_eq!(summary.deleted, 1);
    assert!(layer.feature(paddock.id()).is_none());

    let bodies = farmos.received_bodies("POST", "/wfs").await;
    assert!(bodies[0].contains(r#"<Delete typeName="farmos:asset_land_point">"#));
    assert!(bodies[0].contains(r#"<ogc:FeatureId fid="asset_land_point.bbb"/>"#));
}

#[tokio::test]
async fn test_mixed_commit_uses_unprefixed_transaction_elements() {
    let farmos = MockFarmos::start().await;
    let mut layer = open_land_points(&farmos).await;
    farmos
        .mount_transaction(
            200,
            &transaction_response((1, 1, 1), &[("new1", "asset_land_point.ccc")], &[]),
        )
        .await;

    let mut north = by_name(&layer, "North field");
    north.set_attribute("land_type", "paddock").unwrap();
    let paddock = by_name(&layer, "Paddock");

    let mut feature = Feature::new(layer.fields());
    feature.set_attribute("name", "New point").unwrap();
    feature.set_geometry(point_xy(3.0, 4.0));

    let mut session = layer.start_editing().unwrap();
    session.add_feature(feature);
    assert!(session.update_feature(&north));
    assert!(session.delete_feature(paddock.id()));
    session.commit().await.unwrap();

    let bodies = farmos.received_bodies("POST", "/wfs").await;
    assert_eq!(bodies.len(), 1);
    let root = xml::parse(&bodies[0]).unwrap();

    assert_eq!(root.local_name(), "Transaction");
    assert_eq!(root.prefix(), None);
    assert_eq!(root.namespace.as_deref(), Some(xml::ns::WFS));

    let mut actions: Vec<&str> = root.children.iter().map(|c| c.name.as_str()).collect();
    actions.sort_unstable();
    assert_eq!(actions, vec!["Delete", "Insert", "Update"]);

    assert_eq!(
        root.find("Update/Filter/FeatureId").and_then(|e| e.attr("fid")),
        Some("asset_land_point.aaa")
    );
    assert_eq!(
        root.find("Delete/Filter/FeatureId").and_then(|e| e.attr("fid")),
        Some("asset_land_point.bbb")
    );
    assert!(root.find("Update/Filter/GmlObjectId").is_none());
}

#[tokio::test]
async fn test_dropped_session_sends_nothing() {
    let farmos = MockFarmos::start().await;
    let mut layer = open_land_points(&farmos).await;

    {
        let mut session = layer.start_editing().unwrap();
        let mut feature = Feature::new(session.layer().fields());
        feature.set_attribute("name", "Never sent").unwrap();
        session.add_feature(feature);
        assert!(session.has_edits());
    }

    let session = layer.start_editing().unwrap();
    let summary = session.commit().await.unwrap();
    assert!(summary.inserted.is_empty());

    assert_eq!(layer.feature_count(), 2);
    assert!(farmos.received_bodies("POST", "/wfs").await.is_empty());
}
