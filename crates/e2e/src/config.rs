//! Suite configuration: `boardcheck.toml` plus environment

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};
use crate::expect::ExpectConfig;
use crate::playwright::Browser;

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE: &str = "boardcheck.toml";

/// Suite configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Card data file
    pub data_file: PathBuf,

    /// Where results.json is written
    pub output_dir: PathBuf,

    /// Directory holding `node_modules/playwright`
    pub project_dir: PathBuf,

    /// Cards verified concurrently
    pub workers: usize,

    /// Browser configuration
    pub browser: BrowserSettings,

    /// Timeouts
    pub timeouts: TimeoutSettings,

    /// Application under test
    pub app: AppSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("data/cards.yaml"),
            output_dir: PathBuf::from("test-results"),
            project_dir: PathBuf::from("."),
            workers: 1,
            browser: BrowserSettings::default(),
            timeouts: TimeoutSettings::default(),
            app: AppSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub name: Browser,
    pub headless: bool,

    /// Delay inserted before each browser action (debug runs)
    pub slow_mo_ms: u64,

    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            name: Browser::Chromium,
            headless: true,
            slow_mo_ms: 0,
            viewport_width: 1280,
            viewport_height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    /// Bound on every single browser interaction
    pub action_ms: u64,

    /// How long expectations keep polling
    pub expect_ms: u64,

    /// Bound on a whole card
    pub card_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            action_ms: 10_000,
            expect_ms: 5_000,
            card_ms: 60_000,
        }
    }
}

impl TimeoutSettings {
    pub fn action(&self) -> Duration {
        Duration::from_millis(self.action_ms)
    }

    pub fn card(&self) -> Duration {
        Duration::from_millis(self.card_ms)
    }

    pub fn expect_config(&self) -> ExpectConfig {
        ExpectConfig {
            timeout: Duration::from_millis(self.expect_ms),
            ..ExpectConfig::default()
        }
    }
}

/// How to start the application under test, if at all
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Shell command starting the app; `None` means it is already running
    pub command: Option<String>,

    /// Path polled on `BASE_URL` until the app answers
    pub health_path: String,

    pub startup_timeout_ms: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            command: None,
            health_path: "/".to_string(),
            startup_timeout_ms: 30_000,
        }
    }
}

impl Settings {
    /// Load settings from file, or defaults when it does not exist
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let settings: Self = toml::from_str(&content)?;
            settings.validate()?;
            Ok(settings)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> E2eResult<()> {
        if self.workers == 0 {
            return Err(E2eError::Config("workers must be at least 1".to_string()));
        }
        if self.timeouts.action_ms == 0 || self.timeouts.expect_ms == 0 || self.timeouts.card_ms == 0 {
            return Err(E2eError::Config("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Results file inside the output directory
    pub fn results_path(&self) -> PathBuf {
        self.output_dir.join("results.json")
    }
}

/// Login credentials for the authentication scenario
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Both or neither must be set; one without the other is an error
    pub fn from_values(username: Option<String>, password: Option<String>) -> E2eResult<Option<Self>> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        match (non_empty(username), non_empty(password)) {
            (Some(username), Some(password)) => Ok(Some(Self { username, password })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(E2eError::MissingEnv("PASSWORD".to_string())),
            (None, Some(_)) => Err(E2eError::MissingEnv("USERNAME".to_string())),
        }
    }

    /// Read `USERNAME` / `PASSWORD`
    pub fn from_env() -> E2eResult<Option<Self>> {
        Self::from_values(std::env::var("USERNAME").ok(), std::env::var("PASSWORD").ok())
    }
}

/// The app's base URL; there is no default
pub fn base_url_from_value(value: Option<String>) -> E2eResult<String> {
    match value.map(|v| v.trim().trim_end_matches('/').to_string()) {
        Some(url) if !url.is_empty() => Ok(url),
        _ => Err(E2eError::MissingEnv("BASE_URL".to_string())),
    }
}

/// Read `BASE_URL`
pub fn base_url_from_env() -> E2eResult<String> {
    base_url_from_value(std::env::var("BASE_URL").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.results_path(), PathBuf::from("test-results/results.json"));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"
workers = 4

[browser]
name = "firefox"
headless = false

[app]
command = "npm run dev"
"#,
        )
        .unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.workers, 4);
        assert_eq!(settings.browser.name, Browser::Firefox);
        assert!(!settings.browser.headless);
        assert_eq!(settings.browser.viewport_width, 1280);
        assert_eq!(settings.app.command.as_deref(), Some("npm run dev"));
        assert_eq!(settings.app.health_path, "/");
        assert_eq!(settings.timeouts, TimeoutSettings::default());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "workers = 0\n").unwrap();
        assert!(matches!(Settings::load(&path), Err(E2eError::Config(_))));
    }

    #[test]
    fn test_credentials_must_be_paired() {
        let both = Credentials::from_values(Some("qa".into()), Some("pw".into())).unwrap();
        assert_eq!(both.unwrap().username, "qa");
        assert!(Credentials::from_values(None, None).unwrap().is_none());
        assert!(Credentials::from_values(Some("".into()), None).unwrap().is_none());

        let err = Credentials::from_values(Some("qa".into()), None).unwrap_err();
        assert_eq!(err.to_string(), "PASSWORD environment variable is required");
    }

    #[test]
    fn test_password_is_redacted() {
        let credentials = Credentials {
            username: "qa".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{:?}", credentials).contains("hunter2"));
    }

    #[test]
    fn test_base_url_is_required() {
        assert_eq!(
            base_url_from_value(Some("http://localhost:3000/".into())).unwrap(),
            "http://localhost:3000"
        );
        assert!(matches!(base_url_from_value(None), Err(E2eError::MissingEnv(v)) if v == "BASE_URL"));
        assert!(base_url_from_value(Some("  ".into())).is_err());
    }
}
