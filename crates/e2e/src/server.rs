//! App server management - spawning and health checking the application under test

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::{Child, Command};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::AppSettings;
use crate::error::{E2eError, E2eResult};

/// Interval between health probes
const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Grace period between SIGTERM and kill
const STOP_GRACE: Duration = Duration::from_millis(500);

/// Configuration for spawning the app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppServerConfig {
    /// Shell command, run through `sh -c`
    pub command: String,

    /// URL the app will serve on
    pub base_url: String,

    /// Path polled until the app answers with a success status
    pub health_path: String,

    pub startup_timeout: Duration,
}

impl AppServerConfig {
    /// `None` when no app command is configured
    pub fn from_settings(app: &AppSettings, base_url: &str) -> Option<Self> {
        app.command.as_ref().map(|command| Self {
            command: command.clone(),
            base_url: base_url.to_string(),
            health_path: app.health_path.clone(),
            startup_timeout: Duration::from_millis(app.startup_timeout_ms),
        })
    }

    pub fn health_url(&self) -> String {
        let path = if self.health_path.starts_with('/') {
            self.health_path.clone()
        } else {
            format!("/{}", self.health_path)
        };
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Handle to a running app process
pub struct AppServer {
    child: Child,
    base_url: String,
}

impl AppServer {
    /// Spawn the app and wait until it is healthy
    pub async fn spawn(config: AppServerConfig) -> E2eResult<Self> {
        info!("Starting app: {}", config.command);

        let child = Command::new("sh")
            .arg("-c")
            .arg(&config.command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::AppServerStartup(format!("failed to spawn '{}': {}", config.command, e)))?;

        let mut server = AppServer {
            child,
            base_url: config.base_url.clone(),
        };

        if let Err(e) = server.wait_for_healthy(&config).await {
            server.stop().await;
            return Err(e);
        }

        info!("App is healthy at {}", server.base_url);
        Ok(server)
    }

    /// Poll the health URL until success, process exit or timeout
    async fn wait_for_healthy(&mut self, config: &AppServerConfig) -> E2eResult<()> {
        let health_url = config.health_url();
        let client = reqwest::Client::builder().timeout(Duration::from_secs(2)).build()?;

        let start = Instant::now();
        let mut attempts = 0;

        while start.elapsed() < config.startup_timeout {
            attempts += 1;

            if let Some(status) = self.child.try_wait()? {
                return Err(E2eError::AppServerStartup(format!("app exited early with {}", status)));
            }

            match client.get(&health_url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => warn!("Health check returned {}", resp.status()),
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for app to start...");
                    }
                    // Connection refused is expected while the app is starting
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(HEALTH_POLL_INTERVAL).await;
        }

        Err(E2eError::AppServerHealthCheck(attempts))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// SIGTERM, a short grace period, then kill
    pub async fn stop(&mut self) {
        let Some(pid) = self.child.id() else {
            return;
        };
        info!("Stopping app (pid: {})", pid);

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                && tokio::time::timeout(STOP_GRACE, self.child.wait()).await.is_ok()
            {
                return;
            }
        }

        let _ = self.child.kill().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_command_means_no_server() {
        assert!(AppServerConfig::from_settings(&AppSettings::default(), "http://localhost:3000").is_none());
    }

    #[test]
    fn test_health_url() {
        let app = AppSettings {
            command: Some("npm start".to_string()),
            health_path: "healthz".to_string(),
            startup_timeout_ms: 1000,
        };
        let config = AppServerConfig::from_settings(&app, "http://localhost:3000/").unwrap();
        assert_eq!(config.health_url(), "http://localhost:3000/healthz");
        assert_eq!(config.startup_timeout, Duration::from_secs(1));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_early_exit_is_reported() {
        let config = AppServerConfig {
            command: "exit 3".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            health_path: "/".to_string(),
            startup_timeout: Duration::from_secs(5),
        };
        let err = AppServer::spawn(config).await.err().unwrap();
        assert!(matches!(err, E2eError::AppServerStartup(_) | E2eError::AppServerHealthCheck(_)));
    }
}
