//! Credential store that WFS layers resolve their `authcfg` id against

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::auth::{AuthenticatedClient, OAuthClient, http_client};
use crate::config::{HarnessConfig, OAuthConfig};
use crate::error::{HarnessError, HarnessResult};

pub const AUTH_METHOD_OAUTH2: &str = "OAuth2";
pub const OAUTH2_CONFIG_KEY: &str = "oauth2config";
pub const DEFAULT_CONFIG_NAME: &str = "test-cfg-method";
pub const DEFAULT_MASTER_PASSWORD: &str = "test";

/// Custom (non-predefined) provider configuration
const CONFIG_TYPE_CUSTOM: u8 = 1;
/// Resource owner password grant
const GRANT_FLOW_RESOURCE_OWNER: u8 = 2;

const AUTH_CONFIG_ID_LEN: usize = 7;

/// JSON stored under `oauth2config`
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2Settings {
    pub client_id: String,
    pub config_type: u8,
    pub grant_flow: u8,
    pub username: String,
    pub password: String,
    pub persist_token: bool,
    pub request_timeout: u64,
    pub scope: String,
    pub token_url: String,
    pub version: u8,
}

impl fmt::Debug for OAuth2Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Settings")
            .field("client_id", &self.client_id)
            .field("grant_flow", &self.grant_flow)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("token_url", &self.token_url)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthMethodConfig {
    id: Option<String>,
    pub name: String,
    pub method: String,
    pub config_map: BTreeMap<String, String>,
}

impl AuthMethodConfig {
    pub fn oauth2(config: &HarnessConfig) -> HarnessResult<Self> {
        let OAuthConfig {
            client_id,
            username,
            password,
            scope,
            ..
        } = config.oauth.clone();

        let settings = OAuth2Settings {
            client_id,
            config_type: CONFIG_TYPE_CUSTOM,
            grant_flow: GRANT_FLOW_RESOURCE_OWNER,
            username,
            password,
            persist_token: false,
            request_timeout: config.request_timeout_secs,
            scope,
            token_url: config.token_url(),
            version: 1,
        };

        let mut config_map = BTreeMap::new();
        config_map.insert(OAUTH2_CONFIG_KEY.to_string(), serde_json::to_string(&settings)?);

        Ok(Self {
            id: None,
            name: DEFAULT_CONFIG_NAME.to_string(),
            method: AUTH_METHOD_OAUTH2.to_string(),
            config_map,
        })
    }

    /// Id assigned when the config was stored
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn oauth2_settings(&self) -> HarnessResult<OAuth2Settings> {
        if self.method != AUTH_METHOD_OAUTH2 {
            return Err(HarnessError::Auth(format!(
                "Auth config {} uses method {}, not {}",
                self.name, self.method, AUTH_METHOD_OAUTH2
            )));
        }
        let raw = self.config_map.get(OAUTH2_CONFIG_KEY).ok_or_else(|| {
            HarnessError::Auth(format!("Auth config {} has no {}", self.name, OAUTH2_CONFIG_KEY))
        })?;
        Ok(serde_json::from_str(raw)?)
    }
}

fn generate_config_id() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(AUTH_CONFIG_ID_LEN)
        .collect()
}

pub struct AuthManager {
    master_password: Option<String>,
    configs: HashMap<String, AuthMethodConfig>,
    sessions: RwLock<HashMap<String, AuthenticatedClient>>,
}

impl Default for AuthManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthManager {
    pub fn new() -> Self {
        Self {
            master_password: None,
            configs: HashMap::new(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn master_password_is_set(&self) -> bool {
        self.master_password.is_some()
    }

    /// Returns false if a different master password is already set
    pub fn set_master_password(&mut self, password: &str) -> bool {
        match &self.master_password {
            Some(existing) => existing == password,
            None => {
                self.master_password = Some(password.to_string());
                true
            }
        }
    }

    /// Store a config, assigning it a fresh id
    pub fn store_authentication_config(
        &mut self,
        config: &mut AuthMethodConfig,
    ) -> HarnessResult<String> {
        if !self.master_password_is_set() {
            return Err(HarnessError::Auth(
                "Master password must be set before storing credentials".to_string(),
            ));
        }
        config.oauth2_settings()?;

        let mut id = generate_config_id();
        while self.configs.contains_key(&id) {
            id = generate_config_id();
        }

        config.id = Some(id.clone());
        self.configs.insert(id.clone(), config.clone());

        tracing::info!("Stored auth config {} ({}) as {}", config.name, config.method, id);
        Ok(id)
    }

    pub fn config(&self, id: &str) -> Option<&AuthMethodConfig> {
        self.configs.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.configs.contains_key(id)
    }

    /// Client authorized by the stored config, granting a token on first use
    pub async fn authenticated_client(&self, id: &str) -> HarnessResult<AuthenticatedClient> {
        if let Some(session) = self.sessions.read().await.get(id) {
            return Ok(session.session());
        }

        let config = self
            .config(id)
            .ok_or_else(|| HarnessError::Auth(format!("Unknown auth config id: {}", id)))?;
        let settings = config.oauth2_settings()?;

        if settings.grant_flow != GRANT_FLOW_RESOURCE_OWNER {
            return Err(HarnessError::Auth(format!(
                "Unsupported OAuth2 grant flow {} in auth config {}",
                settings.grant_flow, id
            )));
        }

        let http = http_client(Duration::from_secs(settings.request_timeout))?;
        let oauth = OAuthConfig {
            token_path: String::new(),
            client_id: settings.client_id,
            username: settings.username,
            password: settings.password,
            scope: settings.scope,
        };
        let client = OAuthClient::new(http, settings.token_url)
            .authenticate(&oauth)
            .await?;

        self.sessions
            .write()
            .await
            .insert(id.to_string(), client.session());

        Ok(client)
    }
}
