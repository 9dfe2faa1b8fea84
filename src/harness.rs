//! Per-suite fixture context
//!
//! Fixtures are resolved once per suite, in dependency order:
//! credentials, authenticated client, entity helper, cleanup, credential
//! store, WFS discovery, layer helper.

use std::sync::Arc;

use crate::auth::{AuthenticatedClient, OAuthClient};
use crate::auth_config::{AuthManager, AuthMethodConfig, DEFAULT_MASTER_PASSWORD};
use crate::cleanup::{CleanupReport, cleanup_old_assets};
use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::jsonapi::EntityHelper;
use crate::layer::{LayerHelper, VectorLayer};
use crate::wfs::client::{WebFeatureService, WfsClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupOptions {
    /// Delete marked entities left by earlier runs before the suite starts
    pub cleanup: bool,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self { cleanup: true }
    }
}

pub struct Harness {
    config: Arc<HarnessConfig>,
    session: AuthenticatedClient,
    entities: EntityHelper,
    cleanup: Option<CleanupReport>,
    auth_manager: Arc<AuthManager>,
    auth_config_id: String,
    wfs: WebFeatureService,
    layers: LayerHelper,
}

impl Harness {
    pub async fn setup(config: Arc<HarnessConfig>) -> HarnessResult<Self> {
        Self::setup_with(config, SetupOptions::default()).await
    }

    pub async fn setup_with(
        config: Arc<HarnessConfig>,
        options: SetupOptions,
    ) -> HarnessResult<Self> {
        let oauth = OAuthClient::from_config(&config)?;
        let session = oauth.authenticate(&config.oauth).await?;

        let entities = EntityHelper::new(session.session(), config.clone());

        let cleanup = if options.cleanup {
            Some(cleanup_old_assets(&entities).await?)
        } else {
            None
        };

        let mut auth_manager = AuthManager::new();
        if !auth_manager.set_master_password(DEFAULT_MASTER_PASSWORD) {
            return Err(HarnessError::Auth("Could not set master password".to_string()));
        }
        let mut method = AuthMethodConfig::oauth2(&config)?;
        let auth_config_id = auth_manager.store_authentication_config(&mut method)?;
        let auth_manager = Arc::new(auth_manager);

        let wfs = WebFeatureService::connect(session.session(), config.wfs_endpoint()).await?;

        let layers = LayerHelper::new(
            auth_manager.clone(),
            auth_config_id.clone(),
            config.wfs_endpoint(),
        );

        tracing::info!("Harness ready against {}", config.base_url());

        Ok(Self {
            config,
            session,
            entities,
            cleanup,
            auth_manager,
            auth_config_id,
            wfs,
            layers,
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// A new authenticated session sharing the suite's token
    pub fn requests_session(&self) -> AuthenticatedClient {
        self.session.session()
    }

    pub fn entities(&self) -> &EntityHelper {
        &self.entities
    }

    pub fn cleanup_report(&self) -> Option<CleanupReport> {
        self.cleanup
    }

    pub fn auth_manager(&self) -> &AuthManager {
        &self.auth_manager
    }

    pub fn auth_config_id(&self) -> &str {
        &self.auth_config_id
    }

    pub fn wfs(&self) -> &WebFeatureService {
        &self.wfs
    }

    /// Client for requests that bypass the capabilities snapshot
    pub fn wfs_client(&self) -> WfsClient {
        WfsClient::new(self.session.session(), self.config.wfs_endpoint())
    }

    pub fn layers(&self) -> &LayerHelper {
        &self.layers
    }

    pub async fn get_wfs_vector_layer(&self, type_name: &str) -> HarnessResult<VectorLayer> {
        self.layers.get_wfs_vector_layer(type_name).await
    }

    pub fn teardown(self) {
        self.session.close();
        tracing::debug!("Harness torn down");
    }
}
