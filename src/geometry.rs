//! Geometry helpers shared by the layer, the GML codec and the assertions
//!
//! farmOS stores geometry as WKT and re-serializes coordinates with 16
//! significant digits, so expected REST values are computed with
//! [`to_fixed_precision_wkt`] rather than by echoing the input text.

use geo::{BoundingRect, Coord, Geometry, LineString, Point, Polygon, Rect};
use geozero::ToGeo;
use geozero::wkt::Wkt;
use serde_json::{json, Value};

use crate::error::{HarnessError, HarnessResult};

/// Significant digits farmOS keeps when it writes WKT back out
pub const SERVER_SIGNIFICANT_DIGITS: usize = 16;

/// Parse WKT into a `geo` geometry
pub fn from_wkt(wkt: &str) -> HarnessResult<Geometry<f64>> {
    Wkt(wkt)
        .to_geo()
        .map_err(|e| HarnessError::Geometry(format!("Invalid WKT '{}': {}", wkt, e)))
}

pub fn point_xy(x: f64, y: f64) -> Geometry<f64> {
    Geometry::Point(Point::new(x, y))
}

/// Rectangle covering the envelope of a WKT geometry
pub fn rect_from_wkt(wkt: &str) -> HarnessResult<Rect<f64>> {
    from_wkt(wkt)?
        .bounding_rect()
        .ok_or_else(|| HarnessError::Geometry(format!("Empty geometry has no extent: {}", wkt)))
}

/// OGC name of the geometry type (`Point`, `LineString`, ...)
pub fn geometry_type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Round to a number of significant digits, keeping the shortest decimal form
pub fn round_significant(value: f64, digits: usize) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return value;
    }
    format!("{:.*e}", digits.saturating_sub(1), value)
        .parse()
        .unwrap_or(value)
}

/// Shortest decimal form of a coordinate (`10` rather than `10.0`)
pub fn format_ordinate(value: f64) -> String {
    format!("{}", value)
}

fn format_coord(c: &Coord<f64>, digits: usize) -> String {
    format!(
        "{} {}",
        format_ordinate(round_significant(c.x, digits)),
        format_ordinate(round_significant(c.y, digits))
    )
}

fn format_ring(ring: &LineString<f64>, digits: usize) -> String {
    ring.0
        .iter()
        .map(|c| format_coord(c, digits))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_polygon_rings(polygon: &Polygon<f64>, digits: usize) -> String {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| format!("({})", format_ring(ring, digits)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// WKT the way farmOS writes it back: `POINT (10 10)`, `LINESTRING (a b, c d)`
pub fn to_fixed_precision_wkt(geometry: &Geometry<f64>) -> HarnessResult<String> {
    to_wkt_with_digits(geometry, SERVER_SIGNIFICANT_DIGITS)
}

pub fn to_wkt_with_digits(geometry: &Geometry<f64>, digits: usize) -> HarnessResult<String> {
    match geometry {
        Geometry::Point(p) => Ok(format!("POINT ({})", format_coord(&p.0, digits))),
        Geometry::LineString(ls) => Ok(format!("LINESTRING ({})", format_ring(ls, digits))),
        Geometry::Polygon(poly) => Ok(format!("POLYGON ({})", format_polygon_rings(poly, digits))),
        other => Err(HarnessError::Geometry(format!(
            "Unsupported geometry type for WKT rendering: {}",
            geometry_type_name(other)
        ))),
    }
}

fn coord_json(c: &Coord<f64>) -> Value {
    json!([c.x, c.y])
}

fn ring_json(ring: &LineString<f64>) -> Value {
    Value::Array(ring.0.iter().map(coord_json).collect())
}

/// GeoJSON geometry object with `coordinates` ahead of `type`
pub fn to_geojson_value(geometry: &Geometry<f64>) -> HarnessResult<Value> {
    let (coordinates, kind) = match geometry {
        Geometry::Point(p) => (coord_json(&p.0), "Point"),
        Geometry::LineString(ls) => (ring_json(ls), "LineString"),
        Geometry::Polygon(poly) => (
            Value::Array(
                std::iter::once(poly.exterior())
                    .chain(poly.interiors())
                    .map(ring_json)
                    .collect(),
            ),
            "Polygon",
        ),
        other => {
            return Err(HarnessError::Geometry(format!(
                "Unsupported geometry type for GeoJSON rendering: {}",
                geometry_type_name(other)
            )));
        }
    };

    Ok(json!({
        "coordinates": coordinates,
        "type": kind,
    }))
}

/// Compact GeoJSON text, e.g. `{"coordinates":[10.5,2.0],"type":"Point"}`
pub fn to_geojson(geometry: &Geometry<f64>) -> HarnessResult<String> {
    Ok(serde_json::to_string(&to_geojson_value(geometry)?)?)
}
