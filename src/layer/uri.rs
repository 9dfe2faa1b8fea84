use std::fmt;
use std::str::FromStr;
use url::form_urlencoded::byte_serialize;

use crate::error::{HarnessError, HarnessResult};
use crate::wfs::client::WFS_VERSION;
use crate::wfs::feature_type::FeatureTypeName;

/// Data source string of a WFS-backed layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerUri {
    pub endpoint: String,
    pub type_name: FeatureTypeName,
    pub authcfg: String,
    /// Sent as `bbox=1`; rectangle selection works on the loaded features
    pub bbox: bool,
}

/// Form-encode a query value, leaving `:` readable (`farmos:asset_land_point`)
fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace("%3A", ":")
}

impl LayerUri {
    pub fn new(
        endpoint: impl Into<String>,
        type_name: FeatureTypeName,
        authcfg: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            type_name,
            authcfg: authcfg.into(),
            bbox: true,
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("service", "WFS".to_string()),
            ("request", "GetFeature".to_string()),
            ("version", WFS_VERSION.to_string()),
            ("typename", self.type_name.qualified()),
            ("authcfg", self.authcfg.clone()),
            ("bbox", if self.bbox { "1" } else { "0" }.to_string()),
        ]
    }
}

impl fmt::Display for LayerUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let query = self
            .query_pairs()
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, encode(&v)))
            .collect::<Vec<_>>()
            .join("&");
        write!(f, "{}?{}", self.endpoint, query)
    }
}

impl FromStr for LayerUri {
    type Err = HarnessError;

    fn from_str(s: &str) -> HarnessResult<Self> {
        let url = url::Url::parse(s)?;

        let mut type_name = None;
        let mut authcfg = None;
        let mut bbox = false;
        for (key, value) in url.query_pairs() {
            match key.to_ascii_lowercase().as_str() {
                "typename" => type_name = Some(value.parse::<FeatureTypeName>()?),
                "authcfg" => authcfg = Some(value.into_owned()),
                "bbox" => bbox = value == "1",
                _ => {}
            }
        }

        let mut endpoint = url.clone();
        endpoint.set_query(None);

        let missing = |param: &str| HarnessError::InvalidLayer(format!("{} has no {}", s, param));

        Ok(Self {
            endpoint: endpoint.to_string(),
            type_name: type_name.ok_or_else(|| missing("typename"))?,
            authcfg: authcfg.ok_or_else(|| missing("authcfg"))?,
            bbox,
        })
    }
}
