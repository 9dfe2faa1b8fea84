use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{HarnessConfig, OAuthConfig};
use crate::error::{HarnessError, HarnessResult};

/// Token endpoint response of a successful grant
#[derive(Clone, Deserialize)]
pub struct BearerToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("scope", &self.scope)
            .finish()
    }
}

/// Client for the OAuth2 token endpoint
#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    token_url: String,
}

pub(crate) fn http_client(timeout: Duration) -> HarnessResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| HarnessError::Config(format!("Failed to create HTTP client: {}", e)))
}

impl OAuthClient {
    pub fn new(http: reqwest::Client, token_url: impl Into<String>) -> Self {
        Self {
            http,
            token_url: token_url.into(),
        }
    }

    pub fn from_config(config: &HarnessConfig) -> HarnessResult<Self> {
        Ok(Self::new(
            http_client(config.request_timeout())?,
            config.token_url(),
        ))
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Resource Owner Password Credentials grant
    pub async fn fetch_token(&self, oauth: &OAuthConfig) -> HarnessResult<BearerToken> {
        let params = [
            ("grant_type", "password"),
            ("client_id", oauth.client_id.as_str()),
            ("username", oauth.username.as_str()),
            ("password", oauth.password.as_str()),
            ("scope", oauth.scope.as_str()),
        ];

        tracing::debug!("Requesting password grant token from {}", self.token_url);

        let response = self.http.post(&self.token_url).form(&params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HarnessError::Auth(format!(
                "Token endpoint {} returned {}: {}",
                self.token_url, status, body
            )));
        }

        let token: BearerToken = response
            .json()
            .await
            .map_err(|e| HarnessError::Auth(format!("Failed to parse token response: {}", e)))?;

        if !token.token_type.eq_ignore_ascii_case("bearer") {
            return Err(HarnessError::Auth(format!(
                "Unsupported token type: {}",
                token.token_type
            )));
        }

        tracing::info!(
            "Obtained access token for {} (expires in {:?}s)",
            oauth.username,
            token.expires_in
        );

        Ok(token)
    }

    /// Fetch a token and bind it to an HTTP client
    pub async fn authenticate(&self, oauth: &OAuthConfig) -> HarnessResult<AuthenticatedClient> {
        let token = self.fetch_token(oauth).await?;
        Ok(AuthenticatedClient::new(self.http.clone(), token))
    }
}

/// HTTP client that attaches `Authorization: Bearer` to every request
#[derive(Clone)]
pub struct AuthenticatedClient {
    http: reqwest::Client,
    token: Arc<BearerToken>,
}

impl fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("token", &self.token)
            .finish()
    }
}

impl AuthenticatedClient {
    pub fn new(http: reqwest::Client, token: BearerToken) -> Self {
        Self {
            http,
            token: Arc::new(token),
        }
    }

    pub fn token(&self) -> &BearerToken {
        &self.token
    }

    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        tracing::debug!("{} {}", method, url);
        self.http
            .request(method, url)
            .bearer_auth(&self.token.access_token)
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn patch(&self, url: &str) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    /// A fresh session sharing the token and connection pool
    pub fn session(&self) -> AuthenticatedClient {
        self.clone()
    }

    /// Release this handle; the connection pool closes with the last one
    pub fn close(self) {
        tracing::debug!("Closing authenticated session");
    }
}
