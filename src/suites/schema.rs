//! Service metadata and DescribeFeatureType schemas

use indexmap::IndexMap;
use std::collections::BTreeSet;

use crate::ensure_eq;
use crate::error::HarnessResult;
use crate::harness::Harness;
use crate::suites::Suite;
use crate::wfs::feature_type::FeatureTypeName;
use crate::wfs::schema::FeatureSchema;

pub fn suite() -> Suite {
    Suite {
        name: "schema",
        cleanup: false,
        scenarios: vec![
            scenario!(service_info),
            scenario!(land_asset_point_schema),
            scenario!(water_asset_line_string_schema),
            scenario!(structure_asset_polygon_schema),
        ],
    }
}

/// Properties every asset feature type shares; `bundle_field` is spliced in after `data`
fn asset_properties(bundle_field: Option<&str>) -> IndexMap<String, String> {
    let mut properties: Vec<(&str, &str)> = vec![
        ("__id", "integer"),
        ("__uuid", "string"),
        ("__revision_id", "integer"),
        ("__revision_translation_affected", "boolean"),
        ("name", "string"),
        ("data", "string"),
    ];
    if let Some(field) = bundle_field {
        properties.push((field, "string"));
    }
    properties.extend([
        ("notes", "string"),
        ("is_fixed", "boolean"),
        ("is_location", "boolean"),
        ("archived", "dateTime"),
        ("flag", "string"),
        ("default_langcode", "boolean"),
        ("revision_default", "boolean"),
        ("revision_log_message", "string"),
    ]);

    properties
        .into_iter()
        .map(|(name, kind)| (name.to_string(), kind.to_string()))
        .collect()
}

fn expected_schema(bundle_field: Option<&str>, geometry: &str) -> FeatureSchema {
    let required = std::iter::once("name")
        .chain(bundle_field)
        .chain(std::iter::once("geometry"))
        .map(str::to_string)
        .collect();

    FeatureSchema {
        properties: asset_properties(bundle_field),
        required,
        geometry: Some(geometry.to_string()),
        geometry_column: Some("geometry".to_string()),
    }
}

async fn service_info(h: &Harness) -> HarnessResult<()> {
    let wfs = h.wfs();

    ensure_eq!(wfs.identification().title.as_deref(), Some("farmOS OGC WFS API"));
    ensure_eq!(wfs.provider().name.as_deref(), Some("Test0"));
    ensure_eq!(wfs.provider().url.as_deref(), Some("http://www"));

    let operations: BTreeSet<&str> = wfs.operations().iter().map(String::as_str).collect();
    ensure_eq!(
        operations,
        BTreeSet::from(["GetCapabilities", "GetFeature", "DescribeFeatureType", "Transaction"])
    );

    let contents: BTreeSet<String> = wfs.contents().into_iter().map(str::to_string).collect();
    let expected: BTreeSet<String> = FeatureTypeName::all()
        .iter()
        .map(FeatureTypeName::qualified)
        .collect();
    ensure_eq!(contents, expected);
    Ok(())
}

async fn land_asset_point_schema(h: &Harness) -> HarnessResult<()> {
    let schema = h.wfs().get_schema("farmos:asset_land_point").await?;
    ensure_eq!(schema, expected_schema(Some("land_type"), "Point"));
    Ok(())
}

async fn water_asset_line_string_schema(h: &Harness) -> HarnessResult<()> {
    let schema = h.wfs().get_schema("farmos:asset_water_linestring").await?;
    ensure_eq!(schema, expected_schema(None, "LineString"));
    Ok(())
}

async fn structure_asset_polygon_schema(h: &Harness) -> HarnessResult<()> {
    let schema = h.wfs().get_schema("farmos:asset_structure_polygon").await?;
    ensure_eq!(schema, expected_schema(Some("structure_type"), "Polygon"));
    Ok(())
}
