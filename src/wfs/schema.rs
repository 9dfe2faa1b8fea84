//! Feature type schemas from DescribeFeatureType

use indexmap::IndexMap;

use crate::error::{HarnessError, HarnessResult};
use crate::wfs::exception::ExceptionReport;
use crate::wfs::feature_type::FeatureTypeName;
use crate::xml::Element;

/// Schema of one feature type, shaped like the summary a WFS client library reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    /// Non-geometry properties in document order, name -> XSD type without prefix
    pub properties: IndexMap<String, String>,
    /// Mandatory properties in document order, followed by the geometry column
    pub required: Vec<String>,
    /// Geometry kind, e.g. `Point`
    pub geometry: Option<String>,
    pub geometry_column: Option<String>,
}

impl FeatureSchema {
    pub fn property_type(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Properties whose names start with `__` are server-maintained
    pub fn is_read_only(name: &str) -> bool {
        name.starts_with("__")
    }
}

fn strip_prefix(type_name: &str) -> &str {
    type_name
        .rsplit_once(':')
        .map(|(_, l)| l)
        .unwrap_or(type_name)
}

/// Map `gml:PointPropertyType` to `Point`
fn geometry_kind(type_name: &str) -> Option<String> {
    let (prefix, local) = type_name.split_once(':')?;
    if prefix != "gml" {
        return None;
    }
    local
        .strip_suffix("PropertyType")
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

/// Neither nillable nor `minOccurs="0"`
///
/// WFS client libraries key on `nillable` alone. An optional element that is
/// not nillable is still left out here; farmOS marks its optional properties
/// nillable, so both rules give the same list for its schemas.
fn is_mandatory(element: &Element) -> bool {
    element.attr("nillable").is_none_or(|n| n != "true")
        && element.attr("minOccurs").is_none_or(|m| m != "0")
}

/// Locate the complex type describing `type_name`
fn find_complex_type<'a>(schema: &'a Element, type_name: &FeatureTypeName) -> Option<&'a Element> {
    let unqualified = type_name.unqualified();

    let declared_type = schema
        .children_named("element")
        .find(|e| e.attr("name") == Some(unqualified.as_str()))
        .and_then(|e| e.attr("type"))
        .map(strip_prefix);

    let complex_types: Vec<&Element> = schema.children_named("complexType").collect();

    declared_type
        .and_then(|t| complex_types.iter().copied().find(|c| c.attr("name") == Some(t)))
        .or_else(|| complex_types.first().copied())
}

impl FeatureSchema {
    pub fn from_element(root: &Element, type_name: &FeatureTypeName) -> HarnessResult<Self> {
        if let Some(report) = ExceptionReport::from_element(root) {
            return Err(HarnessError::Protocol(format!(
                "DescribeFeatureType failed: {}",
                report
            )));
        }
        if root.local_name() != "schema" {
            return Err(HarnessError::Protocol(format!(
                "Expected an XML schema, got {}",
                root.local_name()
            )));
        }

        let complex_type = find_complex_type(root, type_name).ok_or_else(|| {
            HarnessError::Protocol(format!("No complex type for {}", type_name))
        })?;

        let sequence = complex_type
            .find("complexContent/extension/sequence")
            .or_else(|| complex_type.child("sequence"))
            .ok_or_else(|| {
                HarnessError::Protocol(format!("Complex type for {} has no sequence", type_name))
            })?;

        let mut schema = FeatureSchema {
            properties: IndexMap::new(),
            required: Vec::new(),
            geometry: None,
            geometry_column: None,
        };

        let mut geometry_required = false;

        for element in sequence.children_named("element") {
            let Some(name) = element.attr("name") else {
                continue;
            };
            let declared = element.attr("type").unwrap_or("string");
            let mandatory = is_mandatory(element);

            match geometry_kind(declared) {
                Some(kind) => {
                    schema.geometry = Some(kind);
                    schema.geometry_column = Some(name.to_string());
                    geometry_required = mandatory;
                }
                None => {
                    schema
                        .properties
                        .insert(name.to_string(), strip_prefix(declared).to_string());
                    if mandatory {
                        schema.required.push(name.to_string());
                    }
                }
            }
        }

        if geometry_required {
            if let Some(column) = &schema.geometry_column {
                schema.required.push(column.clone());
            }
        }

        Ok(schema)
    }
}
