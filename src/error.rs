use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}: {body}")]
    Status {
        status: StatusCode,
        url: String,
        body: String,
    },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Invalid layer: {0}")]
    InvalidLayer(String),

    #[error("Edit error: {0}")]
    Edit(String),

    #[error("WFS protocol error: {0}")]
    Protocol(String),

    #[error("Assertion failed: {0}")]
    Assertion(String),
}

impl HarnessError {
    /// True for failures of the system under test rather than of the harness itself
    pub fn is_assertion(&self) -> bool {
        matches!(self, HarnessError::Assertion(_))
    }

    /// Prefix the error message with the name of the step that produced it
    pub fn context(self, step: &str) -> Self {
        match self {
            HarnessError::Assertion(msg) => HarnessError::Assertion(format!("{}: {}", step, msg)),
            HarnessError::Edit(msg) => HarnessError::Edit(format!("{}: {}", step, msg)),
            other => other,
        }
    }
}

impl From<config::ConfigError> for HarnessError {
    fn from(e: config::ConfigError) -> Self {
        HarnessError::Config(e.to_string())
    }
}

impl From<url::ParseError> for HarnessError {
    fn from(e: url::ParseError) -> Self {
        HarnessError::Config(format!("Invalid URL: {}", e))
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Pass a successful response through, otherwise log its body and fail with `Status`
pub async fn ensure_success(response: reqwest::Response) -> HarnessResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    tracing::warn!("{} returned {}: {}", url, status, body);

    Err(HarnessError::Status { status, url, body })
}
