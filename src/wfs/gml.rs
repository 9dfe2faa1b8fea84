//! GML 3.1.1 geometry and feature collection codec

use geo::{Coord, Geometry, LineString, Point, Polygon, Rect};
use indexmap::IndexMap;

use crate::error::{HarnessError, HarnessResult};
use crate::geometry::{format_ordinate, geometry_type_name};
use crate::xml::{Element, XmlWriter};

pub const DEFAULT_SRS: &str = "EPSG:4326";

const GEOMETRY_ELEMENTS: [&str; 3] = ["Point", "LineString", "Polygon"];

/// One feature read from a `wfs:FeatureCollection`
#[derive(Debug, Clone, PartialEq)]
pub struct GmlFeature {
    /// `gml:id`, e.g. `asset_land_point.<uuid>`
    pub fid: Option<String>,
    /// Local name of the feature element
    pub type_name: String,
    pub properties: IndexMap<String, String>,
    pub geometry_property: Option<String>,
    pub geometry: Option<Geometry<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<GmlFeature>,
    pub bounded_by: Option<Rect<f64>>,
}

fn parse_ordinates(text: &str, dimension: usize) -> HarnessResult<Vec<Coord<f64>>> {
    let values = text
        .split_whitespace()
        .map(|v| {
            v.parse::<f64>()
                .map_err(|_| HarnessError::Xml(format!("Invalid coordinate value: {}", v)))
        })
        .collect::<HarnessResult<Vec<f64>>>()?;

    if dimension < 2 || values.len() % dimension != 0 {
        return Err(HarnessError::Xml(format!(
            "Coordinate list of length {} does not divide into {}-dimensional positions",
            values.len(),
            dimension
        )));
    }

    Ok(values
        .chunks(dimension)
        .map(|c| Coord { x: c[0], y: c[1] })
        .collect())
}

fn srs_dimension(element: &Element) -> HarnessResult<usize> {
    match element.attr("srsDimension") {
        None => Ok(2),
        Some(d) => d
            .parse()
            .map_err(|_| HarnessError::Xml(format!("Invalid srsDimension: {}", d))),
    }
}

/// Coordinates of a `posList` child, or of a sequence of `pos` children
fn parse_positions(parent: &Element) -> HarnessResult<Vec<Coord<f64>>> {
    if let Some(pos_list) = parent.child("posList") {
        return parse_ordinates(pos_list.text(), srs_dimension(pos_list)?);
    }

    let mut coords = Vec::new();
    for pos in parent.children_named("pos") {
        coords.extend(parse_ordinates(pos.text(), srs_dimension(pos)?)?);
    }

    if coords.is_empty() {
        return Err(HarnessError::Xml(format!(
            "{} has no coordinates",
            parent.local_name()
        )));
    }
    Ok(coords)
}

fn parse_ring(boundary: &Element) -> HarnessResult<LineString<f64>> {
    let ring = boundary
        .child("LinearRing")
        .ok_or_else(|| HarnessError::Xml(format!("{} without LinearRing", boundary.local_name())))?;
    Ok(LineString::new(parse_positions(ring)?))
}

/// Parse a GML geometry element (`gml:Point`, `gml:LineString`, `gml:Polygon`)
pub fn parse_geometry(element: &Element) -> HarnessResult<Geometry<f64>> {
    match element.local_name() {
        "Point" => {
            let coords = parse_positions(element)?;
            match coords.as_slice() {
                [c] => Ok(Geometry::Point(Point(*c))),
                _ => Err(HarnessError::Xml(format!(
                    "Point must have exactly one position, found {}",
                    coords.len()
                ))),
            }
        }
        "LineString" => Ok(Geometry::LineString(LineString::new(parse_positions(
            element,
        )?))),
        "Polygon" => {
            let exterior = element
                .child("exterior")
                .ok_or_else(|| HarnessError::Xml("Polygon without exterior".to_string()))?;
            let interiors = element
                .children_named("interior")
                .map(parse_ring)
                .collect::<HarnessResult<Vec<_>>>()?;
            Ok(Geometry::Polygon(Polygon::new(parse_ring(exterior)?, interiors)))
        }
        other => Err(HarnessError::Xml(format!(
            "Unsupported GML geometry: {}",
            other
        ))),
    }
}

fn pos_list_text(coords: &[Coord<f64>]) -> String {
    coords
        .iter()
        .map(|c| format!("{} {}", format_ordinate(c.x), format_ordinate(c.y)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_ring(w: &mut XmlWriter, boundary: &str, ring: &LineString<f64>) -> HarnessResult<()> {
    w.start(boundary, &[])?;
    w.start("gml:LinearRing", &[])?;
    w.text_element("gml:posList", &[("srsDimension", "2")], &pos_list_text(&ring.0))?;
    w.end("gml:LinearRing")?;
    w.end(boundary)
}

/// Write a geometry as a GML 3.1.1 element in EPSG:4326
pub fn write_geometry(w: &mut XmlWriter, geometry: &Geometry<f64>) -> HarnessResult<()> {
    let srs = [("srsName", DEFAULT_SRS)];
    match geometry {
        Geometry::Point(p) => {
            w.start("gml:Point", &srs)?;
            w.text_element("gml:pos", &[("srsDimension", "2")], &pos_list_text(&[p.0]))?;
            w.end("gml:Point")
        }
        Geometry::LineString(ls) => {
            w.start("gml:LineString", &srs)?;
            w.text_element("gml:posList", &[("srsDimension", "2")], &pos_list_text(&ls.0))?;
            w.end("gml:LineString")
        }
        Geometry::Polygon(poly) => {
            w.start("gml:Polygon", &srs)?;
            write_ring(w, "gml:exterior", poly.exterior())?;
            for interior in poly.interiors() {
                write_ring(w, "gml:interior", interior)?;
            }
            w.end("gml:Polygon")
        }
        other => Err(HarnessError::Geometry(format!(
            "Unsupported geometry type for GML: {}",
            geometry_type_name(other)
        ))),
    }
}

/// Parse a `gml:boundedBy/gml:Envelope`
pub fn parse_envelope(bounded_by: &Element) -> HarnessResult<Option<Rect<f64>>> {
    let Some(envelope) = bounded_by.child("Envelope") else {
        return Ok(None);
    };

    let corner = |name: &str| -> HarnessResult<Coord<f64>> {
        let text = envelope
            .find_text(name)
            .ok_or_else(|| HarnessError::Xml(format!("Envelope without {}", name)))?;
        match parse_ordinates(text, 2)?.as_slice() {
            [c] => Ok(*c),
            _ => Err(HarnessError::Xml(format!("Invalid {}: {}", name, text))),
        }
    };

    Ok(Some(Rect::new(corner("lowerCorner")?, corner("upperCorner")?)))
}

fn parse_feature(element: &Element) -> HarnessResult<GmlFeature> {
    let mut feature = GmlFeature {
        fid: element
            .attr("gml:id")
            .or_else(|| element.attr("fid"))
            .map(str::to_string),
        type_name: element.local_name().to_string(),
        properties: IndexMap::new(),
        geometry_property: None,
        geometry: None,
    };

    for property in &element.children {
        let name = property.local_name();
        if name == "boundedBy" {
            continue;
        }

        let geometry_child = property
            .children
            .iter()
            .find(|c| GEOMETRY_ELEMENTS.contains(&c.local_name()));

        match geometry_child {
            Some(g) => {
                feature.geometry = Some(parse_geometry(g)?);
                feature.geometry_property = Some(name.to_string());
            }
            None => {
                feature
                    .properties
                    .insert(name.to_string(), property.text().to_string());
            }
        }
    }

    Ok(feature)
}

/// Parse a GetFeature response document
pub fn parse_feature_collection(root: &Element) -> HarnessResult<FeatureCollection> {
    if root.local_name() != "FeatureCollection" {
        return Err(HarnessError::Protocol(format!(
            "Expected FeatureCollection, got {}",
            root.local_name()
        )));
    }

    let mut features = Vec::new();
    for member in root.children_named("featureMember") {
        for element in &member.children {
            features.push(parse_feature(element)?);
        }
    }
    for members in root.children_named("featureMembers") {
        for element in &members.children {
            features.push(parse_feature(element)?);
        }
    }

    let bounded_by = match root.child("boundedBy") {
        Some(b) => parse_envelope(b)?,
        None => None,
    };

    Ok(FeatureCollection {
        features,
        bounded_by,
    })
}
