//! Error types for E2E testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("App server failed to start: {0}")]
    AppServerStartup(String),

    #[error("App server health check failed after {0} attempts")]
    AppServerHealthCheck(usize),

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Bridge protocol error: {0}")]
    Bridge(String),

    #[error("Card data error: {0}")]
    CardData(String),

    #[error("{0} environment variable is required")]
    MissingEnv(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("No element matches {0}")]
    ElementNotFound(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("{} soft assertion(s) failed:\n  {}", .0.len(), .0.join("\n  "))]
    SoftAssertions(Vec<String>),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

impl E2eError {
    /// Whether this error came from a failed expectation rather than the harness
    pub fn is_assertion(&self) -> bool {
        matches!(self, E2eError::AssertionFailed(_) | E2eError::SoftAssertions(_))
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
