//! Read, create, update and delete assets through a WFS-backed layer

use serde_json::{Value, json};

use crate::check::Subtests;
use crate::cleanup::mark_notes;
use crate::error::{HarnessError, HarnessResult};
use crate::geometry::{from_wkt, point_xy, rect_from_wkt};
use crate::harness::Harness;
use crate::layer::{Feature, VectorLayer};
use crate::suites::{Suite, find_by_notes, find_by_uuid, selected_names, uuid_of};
use crate::wfs::feature_type::AssetType;
use crate::{ensure, ensure_contains, ensure_eq};

pub fn suite() -> Suite {
    Suite {
        name: "basic_crud",
        cleanup: true,
        scenarios: vec![
            scenario!(get_point_features),
            scenario!(get_line_string_features),
            scenario!(get_polygon_features),
            scenario!(create_point_land_asset),
            scenario!(create_land_asset_with_unknown_land_type),
            scenario!(create_line_string_water_asset),
            scenario!(create_polygon_equipment_asset),
            scenario!(update_and_delete_point_asset),
            scenario!(update_and_delete_line_string_asset),
            scenario!(update_and_delete_polygon_asset),
            scenario!(create_nonfixed_point_animal_asset),
        ],
    }
}

const EAST_COAST_UPDATED_WKT: &str = "LINESTRING (-67.113391261917 44.384109243062, -69.15977808073499 44.237678117855, \
-70.66046174786899 43.053083585862, -70.387610172026 41.386187447317, -73.525403294214 40.665750477737, \
-75.026086961347 38.617442408749, -75.435364325111 35.515773439245, -79.255286386905 33.321470318467, \
-81.30167320572301 30.719296174295, -79.86920243255 28.285505376336, -80.005628220471 25.425723522771)";

/// Build a blank feature for `layer`, filled with attributes and a geometry
fn new_feature(
    layer: &VectorLayer,
    attributes: &[(&str, Value)],
    geometry: geo::Geometry<f64>,
) -> HarnessResult<Feature> {
    let mut feature = Feature::new(layer.fields());
    for (name, value) in attributes {
        match value {
            Value::String(s) => feature.set_attribute(name, s.as_str())?,
            Value::Bool(b) => feature.set_attribute(name, *b)?,
            Value::Number(n) => match n.as_i64() {
                Some(i) => feature.set_attribute(name, i)?,
                None => feature.set_attribute(name, n.as_f64().unwrap_or_default())?,
            },
            other => {
                return Err(HarnessError::Edit(format!(
                    "Unsupported value for {}: {}",
                    name, other
                )));
            }
        }
    }
    feature.set_geometry(geometry);
    Ok(feature)
}

/// Add a single feature and commit it
async fn add_and_commit(layer: &mut VectorLayer, feature: Feature) -> HarnessResult<()> {
    let mut edit = layer.start_editing()?;
    edit.add_feature(feature);
    edit.commit().await?;
    Ok(())
}

async fn update_and_commit(layer: &mut VectorLayer, feature: &Feature) -> HarnessResult<()> {
    let mut edit = layer.start_editing()?;
    ensure!(edit.update_feature(feature), "Layer has no feature {}", feature.id());
    edit.commit().await?;
    Ok(())
}

async fn delete_and_commit(layer: &mut VectorLayer, feature: &Feature) -> HarnessResult<()> {
    let mut edit = layer.start_editing()?;
    ensure!(edit.delete_feature(feature.id()), "Layer has no feature {}", feature.id());
    edit.commit().await?;
    Ok(())
}

async fn select_by_wkt(layer: &mut VectorLayer, wkt: &str) -> HarnessResult<Vec<String>> {
    layer.reload().await?;
    layer.select_by_rect(&rect_from_wkt(wkt)?);
    Ok(selected_names(layer))
}

async fn north_field_outside_bbox(layer: &mut VectorLayer) -> HarnessResult<()> {
    let names = select_by_wkt(layer, "POLYGON((-30 32, -31 32, -31 33, -30 33, -30 32))").await?;
    ensure!(
        !names.iter().any(|n| n == "North field"),
        "North field selected by {:?}",
        names
    );
    Ok(())
}

async fn north_field_inside_bbox(layer: &mut VectorLayer) -> HarnessResult<()> {
    let names = select_by_wkt(layer, "POLYGON((-31 39, -32 39, -32 40, -31 40, -31 39))").await?;
    ensure!(
        names.iter().any(|n| n == "North field"),
        "North field not selected, got {:?}",
        names
    );
    Ok(())
}

async fn get_point_features(h: &Harness) -> HarnessResult<()> {
    let notes = mark_notes("Sample description...");
    let north_field_id = h
        .entities()
        .create_asset(
            AssetType::Land,
            json!({
                "name": "North field",
                "notes": { "value": notes },
                "intrinsic_geometry": { "value": "POINT(-31.040038615465 39.592143995004)" },
                "land_type": "field",
                "is_location": true,
                "is_field": true,
            }),
            None,
        )
        .await?;

    let mut layer = h.get_wfs_vector_layer("farmos:asset_land_point").await?;
    let feature = find_by_uuid(&layer, &north_field_id)?;

    ensure_eq!(feature.attribute_str("name"), Some("North field"));
    ensure_eq!(feature.attribute_str("notes"), Some(notes.as_str()));
    ensure_eq!(feature.attribute_str("land_type"), Some("field"));
    ensure_eq!(
        feature.geometry_json()?,
        r#"{"coordinates":[-31.040038615465,39.592143995004],"type":"Point"}"#
    );

    let mut subtests = Subtests::new();
    subtests.record(
        "with BBOX filtering not containing the feature",
        north_field_outside_bbox(&mut layer).await,
    );
    subtests.record(
        "with BBOX filtering containing the feature",
        north_field_inside_bbox(&mut layer).await,
    );
    subtests.finish()
}

async fn get_line_string_features(h: &Harness) -> HarnessResult<()> {
    let notes = mark_notes("Another sample description...");
    let parallel_id = h
        .entities()
        .create_asset(
            AssetType::Land,
            json!({
                "name": "49th Parallel",
                "notes": { "value": notes },
                "intrinsic_geometry": { "value": "LINESTRING(-125.75 49,-53.833333 49)" },
                "land_type": "landmark",
                "is_location": true,
                "is_fixed": true,
            }),
            None,
        )
        .await?;

    let layer = h.get_wfs_vector_layer("farmos:asset_land_linestring").await?;
    let feature = find_by_uuid(&layer, &parallel_id)?;

    ensure_eq!(feature.attribute_str("name"), Some("49th Parallel"));
    ensure_eq!(feature.attribute_str("notes"), Some(notes.as_str()));
    ensure_eq!(feature.attribute_str("land_type"), Some("landmark"));
    ensure_eq!(
        feature.geometry_json()?,
        r#"{"coordinates":[[-125.75,49.0],[-53.833333,49.0]],"type":"LineString"}"#
    );
    Ok(())
}

async fn get_polygon_features(h: &Harness) -> HarnessResult<()> {
    let notes = mark_notes("Yet another sample description...");
    let colorado_id = h
        .entities()
        .create_asset(
            AssetType::Land,
            json!({
                "name": "Colorado",
                "notes": { "value": notes },
                "intrinsic_geometry": {
                    "value": "POLYGON((-109.0448 37.0004,-102.0424 36.9949,-102.0534 41.0006,-109.0489 40.9996,-109.0448 37.0004,-109.0448 37.0004))",
                },
                "land_type": "property",
                "is_location": true,
                "is_fixed": true,
            }),
            None,
        )
        .await?;

    let layer = h.get_wfs_vector_layer("farmos:asset_land_polygon").await?;
    let feature = find_by_uuid(&layer, &colorado_id)?;

    ensure_eq!(feature.attribute_str("name"), Some("Colorado"));
    ensure_eq!(feature.attribute_str("notes"), Some(notes.as_str()));
    ensure_eq!(feature.attribute_str("land_type"), Some("property"));
    ensure_eq!(
        feature.geometry_json()?,
        r#"{"coordinates":[[[-109.0448,37.0004],[-102.0424,36.9949],[-102.0534,41.0006],[-109.0489,40.9996],[-109.0448,37.0004],[-109.0448,37.0004]]],"type":"Polygon"}"#
    );
    Ok(())
}

async fn create_point_land_asset(h: &Harness) -> HarnessResult<()> {
    let description = "Description for point created via WFS from QGIS";
    let notes = mark_notes(description);

    let mut layer = h.get_wfs_vector_layer("farmos:asset_land_point").await?;
    let feature = new_feature(
        &layer,
        &[
            ("name", json!("Example point")),
            ("land_type", json!("other")),
            ("notes", json!(notes)),
        ],
        point_xy(10.0, 10.0),
    )?;
    add_and_commit(&mut layer, feature).await?;

    layer.reload().await?;
    let created = find_by_notes(&layer, description)?;
    let asset = h
        .entities()
        .get_asset_by_type_and_id(AssetType::Land, &uuid_of(&created)?)
        .await?;

    ensure_eq!(asset.attribute_str("name"), Some("Example point"));
    ensure_eq!(asset.attribute_str("land_type"), Some("other"));
    ensure_contains!(asset.notes(), notes.as_str());
    ensure_eq!(asset.attribute_value("geometry"), Some("POINT (10 10)"));
    Ok(())
}

async fn create_land_asset_with_unknown_land_type(h: &Harness) -> HarnessResult<()> {
    let description = "Description for point that shouldn't be created via WFS from QGIS";

    let mut layer = h.get_wfs_vector_layer("farmos:asset_land_point").await?;
    let feature = new_feature(
        &layer,
        &[
            ("name", json!("Example point of unknown type")),
            ("land_type", json!("somethingunknown")),
            ("notes", json!(mark_notes(description))),
        ],
        point_xy(10.0, 10.0),
    )?;

    match add_and_commit(&mut layer, feature).await {
        Err(HarnessError::Edit(msg)) => tracing::debug!("Commit rejected as expected: {}", msg),
        Err(other) => return Err(other),
        Ok(()) => {
            return Err(HarnessError::Assertion(
                "Commit with an unknown land type succeeded".to_string(),
            ));
        }
    }

    layer.reload().await?;
    ensure!(
        find_by_notes(&layer, description).is_err(),
        "Feature with an unknown land type was created"
    );
    Ok(())
}

async fn create_line_string_water_asset(h: &Harness) -> HarnessResult<()> {
    let description = "Description for line string created via WFS from QGIS";
    let notes = mark_notes(description);

    let mut layer = h.get_wfs_vector_layer("farmos:asset_water_linestring").await?;
    let feature = new_feature(
        &layer,
        &[("name", json!("Example line string")), ("notes", json!(notes))],
        from_wkt(
            "LINESTRING(-124.81957346280673 48.41387902376911,-123.93862573833353 45.842330434997535,\
             -124.34239344538385 40.38160427010013,-120.56165946118642 34.59083932797574,\
             -118.06564090851239 33.679388968040115,-117.25810549441198 32.60369705122281)",
        )?,
    )?;
    add_and_commit(&mut layer, feature).await?;

    layer.reload().await?;
    let created = find_by_notes(&layer, description)?;
    let asset = h
        .entities()
        .get_asset_by_type_and_id(AssetType::Water, &uuid_of(&created)?)
        .await?;

    ensure_eq!(asset.attribute_str("name"), Some("Example line string"));
    ensure_contains!(asset.notes(), notes.as_str());
    ensure_eq!(
        asset.attribute_value("geometry"),
        Some(
            "LINESTRING (-124.8195734628067 48.41387902376911, -123.9386257383335 45.84233043499754, \
             -124.3423934453838 40.38160427010013, -120.5616594611864 34.59083932797574, \
             -118.0656409085124 33.67938896804012, -117.258105494412 32.60369705122281)"
        )
    );
    Ok(())
}

async fn create_polygon_equipment_asset(h: &Harness) -> HarnessResult<()> {
    let description = "Description for polygon created via WFS from QGIS";
    let notes = mark_notes(description);

    let mut layer = h.get_wfs_vector_layer("farmos:asset_equipment_polygon").await?;
    let feature = new_feature(
        &layer,
        &[
            ("name", json!("Example polygon")),
            ("notes", json!(notes)),
            ("is_fixed", json!(1)),
        ],
        from_wkt(
            "POLYGON((-104.0556 41.0037,-104.0584 44.9949,-111.0539 44.9998,-111.0457 40.9986,-104.0556 41.0006,-104.0556 41.0037))",
        )?,
    )?;
    add_and_commit(&mut layer, feature).await?;

    layer.reload().await?;
    let created = find_by_notes(&layer, description)?;
    let asset = h
        .entities()
        .get_asset_by_type_and_id(AssetType::Equipment, &uuid_of(&created)?)
        .await?;

    ensure_eq!(asset.attribute_str("name"), Some("Example polygon"));
    ensure_contains!(asset.notes(), notes.as_str());
    ensure_eq!(
        asset.attribute_value("geometry"),
        Some(
            "POLYGON ((-104.0556 41.0037, -104.0584 44.9949, -111.0539 44.9998, -111.0457 40.9986, -104.0556 41.0006, -104.0556 41.0037))"
        )
    );
    Ok(())
}

async fn update_south_field(
    h: &Harness,
    layer: &mut VectorLayer,
    feature: &mut Feature,
    asset_id: &str,
) -> HarnessResult<()> {
    let notes = mark_notes("Sample (updated) south field description...");
    feature.set_attribute("name", "South field (updated)")?;
    feature.set_attribute("land_type", "paddock")?;
    feature.set_attribute("notes", notes.as_str())?;
    feature.set_geometry(from_wkt("POINT(-95.32595536400291 29.29726983388369)")?);
    update_and_commit(layer, feature).await?;

    let asset = h
        .entities()
        .get_asset_by_type_and_id(AssetType::Land, asset_id)
        .await?;
    ensure_eq!(asset.attribute_str("name"), Some("South field (updated)"));
    ensure_eq!(asset.attribute_str("land_type"), Some("paddock"));
    ensure_contains!(asset.notes(), "description");
    ensure_eq!(
        asset.attribute_value("geometry"),
        Some("POINT (-95.32595536400291 29.29726983388369)")
    );
    Ok(())
}

/// Delete `feature` through the layer and confirm the asset is gone
async fn delete_asset(
    h: &Harness,
    layer: &mut VectorLayer,
    feature: &Feature,
    asset_type: AssetType,
    asset_id: &str,
) -> HarnessResult<()> {
    delete_and_commit(layer, feature).await?;
    h.entities()
        .assert_asset_does_not_exist(asset_type, asset_id)
        .await
}

async fn update_and_delete_point_asset(h: &Harness) -> HarnessResult<()> {
    let south_field_id = h
        .entities()
        .create_asset(
            AssetType::Land,
            json!({
                "name": "South field",
                "notes": { "value": mark_notes("Sample south field description...") },
                "intrinsic_geometry": { "value": "POINT(-98.27361139210143 28.614320347429143)" },
                "land_type": "field",
                "is_location": true,
                "is_fixed": true,
            }),
            None,
        )
        .await?;

    let mut layer = h.get_wfs_vector_layer("farmos:asset_land_point").await?;
    let mut feature = find_by_uuid(&layer, &south_field_id)?;

    let mut subtests = Subtests::new();
    subtests.record(
        "update point feature",
        update_south_field(h, &mut layer, &mut feature, &south_field_id).await,
    );
    subtests.record(
        "delete point feature",
        delete_asset(h, &mut layer, &feature, AssetType::Land, &south_field_id).await,
    );
    subtests.finish()
}

async fn update_east_coast(
    h: &Harness,
    layer: &mut VectorLayer,
    feature: &mut Feature,
    asset_id: &str,
) -> HarnessResult<()> {
    feature.set_attribute("name", "East coast (updated)")?;
    feature.set_geometry(from_wkt(EAST_COAST_UPDATED_WKT)?);
    update_and_commit(layer, feature).await?;

    let asset = h
        .entities()
        .get_asset_by_type_and_id(AssetType::Water, asset_id)
        .await?;
    ensure_eq!(asset.attribute_str("name"), Some("East coast (updated)"));
    ensure_eq!(asset.attribute_value("geometry"), Some(EAST_COAST_UPDATED_WKT));
    Ok(())
}

async fn update_and_delete_line_string_asset(h: &Harness) -> HarnessResult<()> {
    let east_coast_id = h
        .entities()
        .create_asset(
            AssetType::Water,
            json!({
                "name": "East coast",
                "notes": { "value": mark_notes("Sample east coast description...") },
                "intrinsic_geometry": {
                    "value": "LINESTRING(-67.11339126191727 44.38410924306203,-70.66046174786861 43.05308358586231,\
                              -70.38761017202621 41.38618744731713,-75.02608696134718 38.61744240874938,\
                              -75.4353643251108 35.51577343924532,-81.30167320572264 30.71929617429477,\
                              -80.00562822047117 25.425723522771094)",
                },
                "is_location": true,
                "is_fixed": true,
            }),
            None,
        )
        .await?;

    let mut layer = h.get_wfs_vector_layer("farmos:asset_water_linestring").await?;
    let mut feature = find_by_uuid(&layer, &east_coast_id)?;

    let mut subtests = Subtests::new();
    subtests.record(
        "update line string feature",
        update_east_coast(h, &mut layer, &mut feature, &east_coast_id).await,
    );
    subtests.record(
        "delete line string feature",
        delete_asset(h, &mut layer, &feature, AssetType::Water, &east_coast_id).await,
    );
    subtests.finish()
}

async fn update_nevada(
    h: &Harness,
    layer: &mut VectorLayer,
    feature: &mut Feature,
    asset_id: &str,
) -> HarnessResult<()> {
    feature.set_attribute("name", "Nevada (updated)")?;
    feature.set_attribute("land_type", "other")?;
    feature.set_geometry(from_wkt(
        "POLYGON((-120.0008182980056 41.99427533301156,-114.04245641767388 41.99250627234076,\
         -114.04392482849038 36.21145647925469,-114.20918794522191 35.995762847791,-114.51771008294033 36.14492383224095,\
         -114.74513682100782 36.0732214875824,-114.71740185295083 35.7497520266312,-114.55653903822014 35.212237546616066,\
         -114.63419694877979 35.00804095771656,-120.00082376388009 38.99997808039316,-120.0008182980056 41.99427533301156))",
    )?);
    update_and_commit(layer, feature).await?;

    let asset = h
        .entities()
        .get_asset_by_type_and_id(AssetType::Land, asset_id)
        .await?;
    ensure_eq!(asset.attribute_str("name"), Some("Nevada (updated)"));
    ensure_eq!(asset.attribute_str("land_type"), Some("other"));
    ensure_eq!(
        asset.attribute_value("geometry"),
        Some(
            "POLYGON ((-120.0008182980056 41.99427533301156, -114.0424564176739 41.99250627234076, \
             -114.0439248284904 36.21145647925469, -114.2091879452219 35.995762847791, -114.5177100829403 36.14492383224095, \
             -114.7451368210078 36.0732214875824, -114.7174018529508 35.7497520266312, -114.5565390382201 35.21223754661607, \
             -114.6341969487798 35.00804095771656, -120.0008237638801 38.99997808039316, -120.0008182980056 41.99427533301156))"
        )
    );
    Ok(())
}

async fn update_and_delete_polygon_asset(h: &Harness) -> HarnessResult<()> {
    let nevada_id = h
        .entities()
        .create_asset(
            AssetType::Land,
            json!({
                "name": "Nevada",
                "notes": { "value": mark_notes("Sample Nevada description...") },
                "intrinsic_geometry": {
                    "value": "POLYGON((-120.03963847422418 41.96779624409592,-114.05159157669674 41.91964576564612,\
                              -113.9868559345613 34.79796936594694,-120.00727065315647 38.98953879241205,\
                              -120.03963847422418 41.96779624409592))",
                },
                "land_type": "property",
                "is_location": true,
                "is_fixed": true,
            }),
            None,
        )
        .await?;

    let mut layer = h.get_wfs_vector_layer("farmos:asset_land_polygon").await?;
    let mut feature = find_by_uuid(&layer, &nevada_id)?;

    let mut subtests = Subtests::new();
    subtests.record(
        "update polygon feature",
        update_nevada(h, &mut layer, &mut feature, &nevada_id).await,
    );
    subtests.record(
        "delete polygon feature",
        delete_asset(h, &mut layer, &feature, AssetType::Land, &nevada_id).await,
    );
    subtests.finish()
}

async fn move_animal(
    h: &Harness,
    layer: &mut VectorLayer,
    feature: &mut Feature,
    asset_id: &str,
) -> HarnessResult<()> {
    feature.set_geometry(from_wkt("POINT(11 14)")?);
    update_and_commit(layer, feature).await?;

    let asset = h
        .entities()
        .get_asset_by_type_and_id(AssetType::Animal, asset_id)
        .await?;
    ensure_eq!(asset.attribute_value("geometry"), Some("POINT (11 14)"));
    Ok(())
}

async fn create_nonfixed_point_animal_asset(h: &Harness) -> HarnessResult<()> {
    let description = "Description for the animal non-fixed point asset created via WFS from QGIS";
    let notes = mark_notes(description);

    let mut layer = h.get_wfs_vector_layer("farmos:asset_animal_point").await?;
    let feature = new_feature(
        &layer,
        &[
            ("name", json!("Dolly")),
            ("notes", json!(notes)),
            ("is_fixed", json!(0)),
        ],
        point_xy(15.0, 15.0),
    )?;
    add_and_commit(&mut layer, feature).await?;

    layer.reload().await?;
    let mut created = find_by_notes(&layer, description)?;
    let asset_id = uuid_of(&created)?;
    let asset = h
        .entities()
        .get_asset_by_type_and_id(AssetType::Animal, &asset_id)
        .await?;

    ensure_eq!(asset.attribute_str("name"), Some("Dolly"));
    ensure_contains!(asset.notes(), notes.as_str());
    ensure_eq!(asset.attribute("is_fixed"), Some(&Value::Bool(false)));
    ensure_eq!(asset.attribute_value("geometry"), Some("POINT (15 15)"));

    let mut subtests = Subtests::new();
    subtests.record(
        "move nonfixed point animal asset",
        move_animal(h, &mut layer, &mut created, &asset_id).await,
    );
    subtests.finish()
}
