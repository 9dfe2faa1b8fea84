//! WFS 1.1.0 GetCapabilities document

use geo::{Coord, Rect};

use crate::error::{HarnessError, HarnessResult};
use crate::wfs::exception::ExceptionReport;
use crate::xml::Element;

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceIdentification {
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub service_type: Option<String>,
    pub service_type_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceProvider {
    pub name: Option<String>,
    pub url: Option<String>,
}

/// `ows:WGS84BoundingBox` with the corner text kept as served
#[derive(Debug, Clone, PartialEq)]
pub struct Wgs84BoundingBox {
    pub lower_corner: String,
    pub upper_corner: String,
}

impl Wgs84BoundingBox {
    pub fn to_rect(&self) -> HarnessResult<Rect<f64>> {
        Ok(Rect::new(
            parse_corner(&self.lower_corner)?,
            parse_corner(&self.upper_corner)?,
        ))
    }
}

fn parse_corner(text: &str) -> HarnessResult<Coord<f64>> {
    let values: Vec<f64> = text
        .split_whitespace()
        .map(|v| v.parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| HarnessError::Protocol(format!("Invalid bounding box corner: {}", text)))?;

    match values.as_slice() {
        [x, y] => Ok(Coord { x: *x, y: *y }),
        _ => Err(HarnessError::Protocol(format!(
            "Bounding box corner must have two ordinates: {}",
            text
        ))),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTypeInfo {
    pub name: String,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub default_srs: Option<String>,
    pub wgs84_bounding_box: Option<Wgs84BoundingBox>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Capabilities {
    pub version: Option<String>,
    pub identification: ServiceIdentification,
    pub provider: ServiceProvider,
    /// Names of the operations under `ows:OperationsMetadata`
    pub operations: Vec<String>,
    pub feature_types: Vec<FeatureTypeInfo>,
}

fn owned_text(element: &Element, path: &str) -> Option<String> {
    element.find_text(path).map(str::to_string)
}

impl Capabilities {
    pub fn from_element(root: &Element) -> HarnessResult<Self> {
        if let Some(report) = ExceptionReport::from_element(root) {
            return Err(HarnessError::Protocol(format!(
                "GetCapabilities failed: {}",
                report
            )));
        }
        if root.local_name() != "WFS_Capabilities" {
            return Err(HarnessError::Protocol(format!(
                "Expected WFS_Capabilities, got {}",
                root.local_name()
            )));
        }

        let identification = ServiceIdentification {
            title: owned_text(root, "ServiceIdentification/Title"),
            abstract_text: owned_text(root, "ServiceIdentification/Abstract"),
            service_type: owned_text(root, "ServiceIdentification/ServiceType"),
            service_type_version: owned_text(root, "ServiceIdentification/ServiceTypeVersion"),
        };

        let provider = ServiceProvider {
            name: owned_text(root, "ServiceProvider/ProviderName"),
            url: root
                .find("ServiceProvider/ProviderSite")
                .and_then(|e| e.attr("xlink:href"))
                .map(str::to_string),
        };

        let operations = root
            .find_all("OperationsMetadata/Operation")
            .into_iter()
            .filter_map(|op| op.attr("name").map(str::to_string))
            .collect();

        let feature_types = root
            .find_all("FeatureTypeList/FeatureType")
            .into_iter()
            .filter_map(|ft| {
                let name = ft.find_text("Name")?.to_string();
                let wgs84_bounding_box = ft.child("WGS84BoundingBox").and_then(|bbox| {
                    Some(Wgs84BoundingBox {
                        lower_corner: bbox.find_text("LowerCorner")?.to_string(),
                        upper_corner: bbox.find_text("UpperCorner")?.to_string(),
                    })
                });
                Some(FeatureTypeInfo {
                    name,
                    title: owned_text(ft, "Title"),
                    abstract_text: owned_text(ft, "Abstract"),
                    default_srs: owned_text(ft, "DefaultSRS"),
                    wgs84_bounding_box,
                })
            })
            .collect();

        Ok(Self {
            version: root.attr("version").map(str::to_string),
            identification,
            provider,
            operations,
            feature_types,
        })
    }

    pub fn feature_type(&self, name: &str) -> Option<&FeatureTypeInfo> {
        self.feature_types.iter().find(|ft| ft.name == name)
    }

    pub fn feature_type_names(&self) -> impl Iterator<Item = &str> {
        self.feature_types.iter().map(|ft| ft.name.as_str())
    }
}
