use geo::Geometry;
use indexmap::IndexMap;
use std::fmt;

use crate::error::{HarnessError, HarnessResult};
use crate::geometry::{format_ordinate, to_geojson};
use crate::wfs::schema::FeatureSchema;

/// Layer-local feature id; ids of features not yet added are 0
pub type FeatureId = i64;

pub const UNASSIGNED_FEATURE_ID: FeatureId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Double,
    Boolean,
}

impl FieldKind {
    pub fn from_xsd(type_name: &str) -> Self {
        match type_name {
            "integer" | "int" | "long" | "short" | "byte" | "nonNegativeInteger"
            | "positiveInteger" | "unsignedInt" | "unsignedLong" => FieldKind::Integer,
            "double" | "float" | "decimal" => FieldKind::Double,
            "boolean" => FieldKind::Boolean,
            _ => FieldKind::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    /// XSD type without prefix
    pub type_name: String,
}

impl Field {
    pub fn kind(&self) -> FieldKind {
        FieldKind::from_xsd(&self.type_name)
    }

    pub fn is_read_only(&self) -> bool {
        FeatureSchema::is_read_only(&self.name)
    }
}

/// Attribute fields of a layer in schema order, geometry excluded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<Field>);

impl Fields {
    pub fn from_schema(schema: &FeatureSchema) -> Self {
        Self(
            schema
                .properties
                .iter()
                .map(|(name, type_name)| Field {
                    name: name.clone(),
                    type_name: type_name.clone(),
                })
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.0.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.0.iter().find(|f| f.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Text(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
}

impl AttributeValue {
    /// Read a GML property text as the field's kind
    pub fn parse(kind: FieldKind, text: &str) -> Self {
        let trimmed = text.trim();
        match kind {
            FieldKind::Text => AttributeValue::Text(text.to_string()),
            _ if trimmed.is_empty() => AttributeValue::Null,
            FieldKind::Integer => trimmed
                .parse()
                .map(AttributeValue::Integer)
                .unwrap_or_else(|_| AttributeValue::Text(text.to_string())),
            FieldKind::Double => trimmed
                .parse()
                .map(AttributeValue::Double)
                .unwrap_or_else(|_| AttributeValue::Text(text.to_string())),
            FieldKind::Boolean => match trimmed {
                "1" | "true" => AttributeValue::Boolean(true),
                "0" | "false" => AttributeValue::Boolean(false),
                _ => AttributeValue::Text(text.to_string()),
            },
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text sent in a Transaction; `None` for null
    pub fn to_wire(&self) -> Option<String> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Text(s) => Some(s.clone()),
            AttributeValue::Integer(i) => Some(i.to_string()),
            AttributeValue::Double(d) => Some(format_ordinate(*d)),
            AttributeValue::Boolean(b) => Some(if *b { "1" } else { "0" }.to_string()),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => f.write_str("NULL"),
            other => f.write_str(&other.to_wire().unwrap_or_default()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Text(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Integer(v.into())
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Double(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Boolean(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub(crate) id: FeatureId,
    pub(crate) fid: Option<String>,
    attributes: IndexMap<String, AttributeValue>,
    geometry: Option<Geometry<f64>>,
}

impl Feature {
    /// Blank feature with every field null
    pub fn new(fields: &Fields) -> Self {
        Self {
            id: UNASSIGNED_FEATURE_ID,
            fid: None,
            attributes: fields
                .iter()
                .map(|f| (f.name.clone(), AttributeValue::Null))
                .collect(),
            geometry: None,
        }
    }

    pub fn id(&self) -> FeatureId {
        self.id
    }

    /// Server feature id, e.g. `asset_land_point.<uuid>`
    pub fn fid(&self) -> Option<&str> {
        self.fid.as_deref()
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Text value of an attribute, `None` when null or not text
    pub fn attribute_str(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(AttributeValue::as_str)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn set_attribute(
        &mut self,
        name: &str,
        value: impl Into<AttributeValue>,
    ) -> HarnessResult<()> {
        match self.attributes.get_mut(name) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(HarnessError::Edit(format!("Unknown field: {}", name))),
        }
    }

    /// Set a value of a field this feature was built with
    pub(crate) fn put_attribute(&mut self, name: &str, value: AttributeValue) {
        if let Some(slot) = self.attributes.get_mut(name) {
            *slot = value;
        }
    }

    pub fn geometry(&self) -> Option<&Geometry<f64>> {
        self.geometry.as_ref()
    }

    pub fn set_geometry(&mut self, geometry: Geometry<f64>) {
        self.geometry = Some(geometry);
    }

    pub fn clear_geometry(&mut self) {
        self.geometry = None;
    }

    /// GeoJSON of the geometry with `coordinates` ahead of `type`
    pub fn geometry_json(&self) -> HarnessResult<String> {
        let geometry = self
            .geometry
            .as_ref()
            .ok_or_else(|| HarnessError::Geometry(format!("Feature {} has no geometry", self.id)))?;
        to_geojson(geometry)
    }
}
