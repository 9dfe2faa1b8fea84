use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::HarnessError;

/// Namespace prefix of every farmOS feature type
pub const FARMOS_PREFIX: &str = "farmos";

/// farmOS asset bundles exposed through WFS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Animal,
    Equipment,
    Land,
    Plant,
    Structure,
    Water,
}

impl AssetType {
    pub const ALL: [AssetType; 6] = [
        AssetType::Animal,
        AssetType::Equipment,
        AssetType::Land,
        AssetType::Plant,
        AssetType::Structure,
        AssetType::Water,
    ];

    /// JSON:API bundle name
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Animal => "animal",
            AssetType::Equipment => "equipment",
            AssetType::Land => "land",
            AssetType::Plant => "plant",
            AssetType::Structure => "structure",
            AssetType::Water => "water",
        }
    }

    /// JSON:API resource type, e.g. `asset--land`
    pub fn resource_type(&self) -> String {
        format!("asset--{}", self.as_str())
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssetType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| HarnessError::Protocol(format!("Unknown asset type: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
}

impl GeometryKind {
    pub const ALL: [GeometryKind; 3] = [
        GeometryKind::Point,
        GeometryKind::LineString,
        GeometryKind::Polygon,
    ];

    /// Lowercase form used in feature type names
    pub fn suffix(&self) -> &'static str {
        match self {
            GeometryKind::Point => "point",
            GeometryKind::LineString => "linestring",
            GeometryKind::Polygon => "polygon",
        }
    }

    /// OGC / GML geometry name
    pub fn ogc_name(&self) -> &'static str {
        match self {
            GeometryKind::Point => "Point",
            GeometryKind::LineString => "LineString",
            GeometryKind::Polygon => "Polygon",
        }
    }

    pub fn from_ogc_name(name: &str) -> Option<Self> {
        GeometryKind::ALL.into_iter().find(|k| k.ogc_name() == name)
    }

    pub fn matches(&self, geometry: &geo::Geometry<f64>) -> bool {
        matches!(
            (self, geometry),
            (GeometryKind::Point, geo::Geometry::Point(_))
                | (GeometryKind::LineString, geo::Geometry::LineString(_))
                | (GeometryKind::Polygon, geo::Geometry::Polygon(_))
        )
    }
}

/// A feature type name of the form `farmos:asset_{type}_{geometry}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureTypeName {
    pub asset_type: AssetType,
    pub geometry_kind: GeometryKind,
}

impl FeatureTypeName {
    pub fn new(asset_type: AssetType, geometry_kind: GeometryKind) -> Self {
        Self {
            asset_type,
            geometry_kind,
        }
    }

    /// Every feature type the farmOS WFS publishes
    pub fn all() -> Vec<FeatureTypeName> {
        AssetType::ALL
            .into_iter()
            .flat_map(|a| GeometryKind::ALL.into_iter().map(move |g| FeatureTypeName::new(a, g)))
            .collect()
    }

    pub fn unqualified(&self) -> String {
        format!(
            "asset_{}_{}",
            self.asset_type.as_str(),
            self.geometry_kind.suffix()
        )
    }

    pub fn qualified(&self) -> String {
        format!("{}:{}", FARMOS_PREFIX, self.unqualified())
    }

    /// Server feature id for an asset, e.g. `asset_land_point.<uuid>`
    pub fn feature_id(&self, asset_uuid: &str) -> String {
        format!("{}.{}", self.unqualified(), asset_uuid)
    }
}

impl fmt::Display for FeatureTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified())
    }
}

impl FromStr for FeatureTypeName {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unqualified = s
            .strip_prefix(FARMOS_PREFIX)
            .and_then(|rest| rest.strip_prefix(':'))
            .unwrap_or(s);

        let invalid = || HarnessError::Protocol(format!("Invalid feature type name: {}", s));

        let rest = unqualified.strip_prefix("asset_").ok_or_else(invalid)?;
        let (asset, geometry) = rest.rsplit_once('_').ok_or_else(invalid)?;

        let asset_type = asset.parse::<AssetType>().map_err(|_| invalid())?;
        let geometry_kind = GeometryKind::ALL
            .into_iter()
            .find(|k| k.suffix() == geometry)
            .ok_or_else(invalid)?;

        Ok(Self::new(asset_type, geometry_kind))
    }
}

/// Split a server feature id (`asset_land_point.<uuid>`) into type and uuid
pub fn split_feature_id(fid: &str) -> Option<(&str, &str)> {
    fid.split_once('.')
}
