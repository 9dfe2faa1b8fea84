use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::HarnessResult;

/// Environment variable naming the JUnit XML report location
pub const TEST_RESULTS_FILE_VAR: &str = "TEST_RESULTS_FILE";

/// Environment variable carrying additional runner flags
pub const EXTRA_ARGS_VAR: &str = "PYTEST_EXTRA_ARGS";

#[derive(Clone, Deserialize)]
pub struct HarnessConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_wfs_path")]
    pub wfs_path: String,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub results_file: Option<PathBuf>,
}

impl fmt::Debug for HarnessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarnessConfig")
            .field("base_url", &self.base_url)
            .field("wfs_path", &self.wfs_path)
            .field("oauth", &self.oauth)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("results_file", &self.results_file)
            .finish()
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            wfs_path: default_wfs_path(),
            oauth: OAuthConfig::default(),
            request_timeout_secs: default_request_timeout_secs(),
            results_file: None,
        }
    }
}

fn default_base_url() -> String {
    "http://www".to_string()
}

fn default_wfs_path() -> String {
    "/wfs".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Clone, Deserialize)]
pub struct OAuthConfig {
    #[serde(default = "default_token_path")]
    pub token_path: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_scope")]
    pub scope: String,
}

// Custom Debug implementation to keep the password out of logs
impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("token_path", &self.token_path)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish()
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            token_path: default_token_path(),
            client_id: default_client_id(),
            username: default_username(),
            password: default_password(),
            scope: default_scope(),
        }
    }
}

fn default_token_path() -> String {
    "/oauth/token".to_string()
}

fn default_client_id() -> String {
    "farm".to_string()
}

fn default_username() -> String {
    "root".to_string()
}

fn default_password() -> String {
    "test".to_string()
}

fn default_scope() -> String {
    "farm_manager".to_string()
}

impl HarnessConfig {
    pub fn load() -> HarnessResult<Arc<Self>> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("farmos_wfs_tests").required(false))
            .add_source(
                config::Environment::with_prefix("FARMOS_WFS_TESTS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: HarnessConfig = config.try_deserialize()?;

        if settings.results_file.is_none() {
            settings.results_file = std::env::var_os(TEST_RESULTS_FILE_VAR).map(PathBuf::from);
        }

        Ok(Arc::new(settings))
    }

    /// Configuration pointing at an arbitrary server, used by the mock-server tests
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn wfs_endpoint(&self) -> String {
        format!("{}{}", self.base_url(), self.wfs_path)
    }

    pub fn token_url(&self) -> String {
        format!("{}{}", self.base_url(), self.oauth.token_path)
    }

    /// URL of a JSON:API resource path such as `asset/land`
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url(), path.trim_start_matches('/'))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
