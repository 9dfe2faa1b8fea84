pub mod edit;
pub mod feature;
pub mod uri;
pub mod vector_layer;

pub use edit::*;
pub use feature::*;
pub use uri::*;
pub use vector_layer::*;

use std::sync::Arc;

use crate::auth_config::AuthManager;
use crate::error::{HarnessError, HarnessResult};
use crate::wfs::feature_type::FeatureTypeName;

/// Opens WFS-backed layers authorized through a stored auth config
#[derive(Clone)]
pub struct LayerHelper {
    auth_manager: Arc<AuthManager>,
    auth_config_id: String,
    endpoint: String,
}

impl LayerHelper {
    pub fn new(
        auth_manager: Arc<AuthManager>,
        auth_config_id: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            auth_manager,
            auth_config_id: auth_config_id.into(),
            endpoint: endpoint.into(),
        }
    }

    pub fn layer_uri(&self, type_name: FeatureTypeName) -> LayerUri {
        LayerUri::new(self.endpoint.clone(), type_name, self.auth_config_id.clone())
    }

    /// Open a layer for `farmos:asset_{type}_{geometry}`, loaded and ready to read
    pub async fn get_wfs_vector_layer(&self, type_name: &str) -> HarnessResult<VectorLayer> {
        let parsed: FeatureTypeName = type_name.parse()?;
        let uri = self.layer_uri(parsed);

        tracing::debug!("Opening layer {}", uri);

        let mut layer = VectorLayer::new(uri, type_name, &self.auth_manager).await;
        if !layer.is_valid() {
            return Err(HarnessError::InvalidLayer(format!(
                "{}: {}",
                type_name,
                layer.error().unwrap_or("unknown error")
            )));
        }

        layer.reload().await?;
        Ok(layer)
    }
}
