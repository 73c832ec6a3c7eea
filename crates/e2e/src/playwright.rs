//! Playwright browser automation
//!
//! Each context is a long-lived `node` process running an embedded bridge
//! script that owns one browser, one browser context and one page. Requests
//! and responses are line-delimited JSON over the child's stdin/stdout:
//!
//! ```text
//! → {"id":3,"op":"computed_style","locator":{"steps":[...]}}
//! ← {"id":3,"ok":true,"value":{"font-weight":"700",...}}
//! ← {"id":4,"ok":false,"code":"not_found","error":"css=.tag >> nth=0"}
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::context::{BrowserContext, ComputedStyle, ContextFactory, FixtureRoute};
use crate::error::{E2eError, E2eResult};
use crate::locator::{Locator, Point};

const BRIDGE_SCRIPT: &str = include_str!("bridge.js");

/// Extra time granted to the bridge beyond Playwright's own action timeout
const BRIDGE_GRACE: Duration = Duration::from_secs(5);

/// How long a browser may take to launch
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaywrightConfig {
    pub base_url: String,
    pub browser: Browser,
    pub headless: bool,
    pub slow_mo_ms: u64,
    pub viewport_width: u32,
    pub viewport_height: u32,
    #[serde(rename = "action_timeout_ms", serialize_with = "as_millis")]
    pub action_timeout: Duration,

    /// Directory whose `node_modules` provides Playwright
    #[serde(skip)]
    pub project_dir: PathBuf,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl PlaywrightConfig {
    pub fn from_settings(settings: &Settings, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            browser: settings.browser.name,
            headless: settings.browser.headless,
            slow_mo_ms: settings.browser.slow_mo_ms,
            viewport_width: settings.browser.viewport_width,
            viewport_height: settings.browser.viewport_height,
            action_timeout: settings.timeouts.action(),
            project_dir: settings.project_dir.clone(),
        }
    }
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default(), "http://127.0.0.1:3000")
    }
}

/// Check that Playwright is installed for the project
pub fn check_playwright_installed(project_dir: &Path) -> E2eResult<()> {
    let status = Command::new("npx")
        .args(["--no-install", "playwright", "--version"])
        .current_dir(project_dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        _ => Err(E2eError::PlaywrightNotFound),
    }
}

/// Launches one bridge process per context
pub struct PlaywrightLauncher {
    config: PlaywrightConfig,
    // Keeps the staged bridge script alive
    _script_dir: tempfile::TempDir,
    script_path: PathBuf,
}

impl PlaywrightLauncher {
    /// Verify Playwright is available and stage the bridge script
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        check_playwright_installed(&config.project_dir)?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("boardcheck-bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;
        debug!("Staged Playwright bridge at {}", script_path.display());

        Ok(Self {
            config,
            _script_dir: script_dir,
            script_path,
        })
    }

    pub fn config(&self) -> &PlaywrightConfig {
        &self.config
    }

    /// Start a bridge and wait until its browser is up
    pub async fn launch(&self) -> E2eResult<PlaywrightContext> {
        let node_modules = std::fs::canonicalize(&self.config.project_dir)
            .unwrap_or_else(|_| self.config.project_dir.clone())
            .join("node_modules");

        let mut child = TokioCommand::new("node")
            .arg(&self.script_path)
            .env("NODE_PATH", &node_modules)
            .env("BOARDCHECK_BRIDGE_CONFIG", serde_json::to_string(&self.config)?)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Playwright(format!("failed to spawn node: {}", e)))?;

        let mut context = PlaywrightContext::attach(child, self.config.action_timeout + BRIDGE_GRACE)?;
        let ready = timeout(LAUNCH_TIMEOUT, context.read_response())
            .await
            .map_err(|_| E2eError::Timeout(format!("{} launch", self.config.browser)))??;
        if !ready.ok {
            return Err(E2eError::Playwright(ready.error.unwrap_or_else(|| "launch failed".to_string())));
        }
        info!("Launched {} ({})", self.config.browser, if self.config.headless { "headless" } else { "headed" });
        Ok(context)
    }
}

#[async_trait]
impl ContextFactory for PlaywrightLauncher {
    async fn new_context(&self) -> E2eResult<Box<dyn BrowserContext>> {
        Ok(Box::new(self.launch().await?))
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Navigate { url: &'a str },
    Reload,
    SetContent { html: &'a str },
    SetViewport { width: u32, height: u32 },
    SetOffline { offline: bool },
    AddInitScript { script: &'a str },
    Route { route: &'a FixtureRoute },
    Url,
    IsVisible { locator: &'a Locator },
    Count { locator: &'a Locator },
    TextContent { locator: &'a Locator },
    ComputedStyle { locator: &'a Locator },
    Fill { locator: &'a Locator, value: &'a str },
    Click { locator: &'a Locator, position: Option<Point> },
    Close,
}

impl Request<'_> {
    fn describe(&self) -> String {
        match self {
            Request::Navigate { url } => format!("navigate {}", url),
            Request::Reload => "reload".to_string(),
            Request::SetContent { .. } => "set content".to_string(),
            Request::SetViewport { width, height } => format!("set viewport {}x{}", width, height),
            Request::SetOffline { offline } => format!("set offline {}", offline),
            Request::AddInitScript { .. } => "add init script".to_string(),
            Request::Route { route } => format!("route {}", route.pattern),
            Request::Url => "url".to_string(),
            Request::IsVisible { locator } => format!("is visible {}", locator),
            Request::Count { locator } => format!("count {}", locator),
            Request::TextContent { locator } => format!("text content {}", locator),
            Request::ComputedStyle { locator } => format!("computed style {}", locator),
            Request::Fill { locator, .. } => format!("fill {}", locator),
            Request::Click { locator, .. } => format!("click {}", locator),
            Request::Close => "close".to_string(),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    request: &'a Request<'a>,
}

#[derive(Debug, Deserialize)]
struct Response {
    id: Option<u64>,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl Response {
    fn into_result(self, request: &Request<'_>) -> E2eResult<Value> {
        if self.ok {
            return Ok(self.value);
        }
        let message = self.error.unwrap_or_default();
        Err(match self.code.as_deref() {
            Some("not_found") => E2eError::ElementNotFound(message),
            Some("timeout") => E2eError::Timeout(format!("{}: {}", request.describe(), message)),
            Some("navigation") => E2eError::Navigation {
                url: match request {
                    Request::Navigate { url } => url.to_string(),
                    _ => request.describe(),
                },
                reason: message,
            },
            Some("protocol") => E2eError::Bridge(message),
            _ => E2eError::Playwright(message),
        })
    }
}

/// A live browser context backed by a bridge process
pub struct PlaywrightContext {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    action_timeout: Duration,
    closed: bool,
    /// Set once a call timed out; the bridge was killed and its late reply discarded
    abandoned: Option<String>,
}

impl PlaywrightContext {
    /// Wrap a spawned bridge process with piped stdin and stdout
    fn attach(mut child: Child, action_timeout: Duration) -> E2eResult<Self> {
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdout unavailable".to_string()))?;

        Ok(PlaywrightContext {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            action_timeout,
            closed: false,
            abandoned: None,
        })
    }

    async fn read_response(&mut self) -> E2eResult<Response> {
        let line = self
            .stdout
            .next_line()
            .await?
            .ok_or_else(|| E2eError::Bridge("bridge exited unexpectedly".to_string()))?;
        serde_json::from_str(&line).map_err(|e| E2eError::Bridge(format!("bad response '{}': {}", line, e)))
    }

    async fn call(&mut self, request: Request<'_>) -> E2eResult<Value> {
        if let Some(timed_out) = &self.abandoned {
            return Err(E2eError::Bridge(format!(
                "context abandoned after '{}' timed out; cannot {}",
                timed_out,
                request.describe()
            )));
        }
        if self.closed {
            return Err(E2eError::Bridge("context already closed".to_string()));
        }
        let id = self.next_id;
        self.next_id += 1;

        let mut line = serde_json::to_string(&Envelope { id, request: &request })?;
        line.push('\n');
        debug!("bridge → {}", request.describe());

        let action_timeout = self.action_timeout;
        let exchange = async {
            self.stdin.write_all(line.as_bytes()).await?;
            self.stdin.flush().await?;
            self.read_response().await
        };
        let response = match timeout(action_timeout, exchange).await {
            Ok(response) => response?,
            Err(_) => {
                // The reply may still arrive and would answer the next request
                warn!("Bridge call '{}' timed out, killing process", request.describe());
                self.abandoned = Some(request.describe());
                self.closed = true;
                let _ = self.child.kill().await;
                return Err(E2eError::Timeout(request.describe()));
            }
        };

        if response.id != Some(id) {
            return Err(E2eError::Bridge(format!(
                "response id {:?} does not match request {}",
                response.id, id
            )));
        }
        response.into_result(&request)
    }

    async fn call_as<T: serde::de::DeserializeOwned>(&mut self, request: Request<'_>) -> E2eResult<T> {
        Ok(serde_json::from_value(self.call(request).await?)?)
    }
}

#[async_trait]
impl BrowserContext for PlaywrightContext {
    async fn navigate(&mut self, url: &str) -> E2eResult<()> {
        self.call(Request::Navigate { url }).await.map(drop)
    }

    async fn reload(&mut self) -> E2eResult<()> {
        self.call(Request::Reload).await.map(drop)
    }

    async fn set_content(&mut self, html: &str) -> E2eResult<()> {
        self.call(Request::SetContent { html }).await.map(drop)
    }

    async fn set_viewport(&mut self, width: u32, height: u32) -> E2eResult<()> {
        self.call(Request::SetViewport { width, height }).await.map(drop)
    }

    async fn set_offline(&mut self, offline: bool) -> E2eResult<()> {
        self.call(Request::SetOffline { offline }).await.map(drop)
    }

    async fn add_init_script(&mut self, script: &str) -> E2eResult<()> {
        self.call(Request::AddInitScript { script }).await.map(drop)
    }

    async fn intercept_route(&mut self, route: FixtureRoute) -> E2eResult<()> {
        self.call(Request::Route { route: &route }).await.map(drop)
    }

    async fn current_url(&mut self) -> E2eResult<String> {
        self.call_as(Request::Url).await
    }

    async fn is_visible(&mut self, locator: &Locator) -> E2eResult<bool> {
        self.call_as(Request::IsVisible { locator }).await
    }

    async fn count(&mut self, locator: &Locator) -> E2eResult<usize> {
        self.call_as(Request::Count { locator }).await
    }

    async fn text_content(&mut self, locator: &Locator) -> E2eResult<Option<String>> {
        self.call_as(Request::TextContent { locator }).await
    }

    async fn computed_style(&mut self, locator: &Locator) -> E2eResult<ComputedStyle> {
        self.call_as(Request::ComputedStyle { locator }).await
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.call(Request::Fill { locator, value }).await.map(drop)
    }

    async fn click(&mut self, locator: &Locator, position: Option<Point>) -> E2eResult<()> {
        self.call(Request::Click { locator, position }).await.map(drop)
    }

    async fn close(&mut self) -> E2eResult<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.call(Request::Close).await.map(drop);
        self.closed = true;
        if let Err(e) = &result {
            warn!("Bridge close failed, killing process: {}", e);
            let _ = self.child.kill().await;
        } else {
            let _ = timeout(BRIDGE_GRACE, self.child.wait()).await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let locator = Locator::css(".tag").first();
        let request = Request::ComputedStyle { locator: &locator };
        let json = serde_json::to_value(Envelope { id: 7, request: &request }).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["op"], "computed_style");
        assert_eq!(json["locator"]["steps"][0]["kind"], "css");
        assert_eq!(json["locator"]["steps"][1]["kind"], "first");
    }

    #[test]
    fn test_error_codes_map_to_errors() {
        let url = "/login";
        let navigate = Request::Navigate { url };
        let response: Response =
            serde_json::from_str(r#"{"id":1,"ok":false,"code":"navigation","error":"net::ERR_FAILED"}"#).unwrap();
        assert!(matches!(
            response.into_result(&navigate),
            Err(E2eError::Navigation { url, reason }) if url == "/login" && reason == "net::ERR_FAILED"
        ));

        let locator = Locator::css(".missing");
        let style = Request::ComputedStyle { locator: &locator };
        let response: Response =
            serde_json::from_str(r#"{"id":2,"ok":false,"code":"not_found","error":"css=.missing"}"#).unwrap();
        assert!(matches!(response.into_result(&style), Err(E2eError::ElementNotFound(_))));

        let response: Response =
            serde_json::from_str(r#"{"id":3,"ok":false,"code":"timeout","error":"30000ms exceeded"}"#).unwrap();
        assert!(matches!(response.into_result(&Request::Reload), Err(E2eError::Timeout(m)) if m.starts_with("reload")));
    }

    #[test]
    fn test_ok_response_without_value_is_null() {
        let response: Response = serde_json::from_str(r#"{"id":4,"ok":true}"#).unwrap();
        assert_eq!(response.into_result(&Request::Reload).unwrap(), Value::Null);
    }

    #[test]
    fn test_config_serializes_for_bridge() {
        let config = PlaywrightConfig::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["browser"], "chromium");
        assert_eq!(json["action_timeout_ms"], 10_000);
        assert!(json.get("project_dir").is_none());
    }

    /// A bridge that answers every request after `delay` seconds
    fn slow_bridge(delay: &str, action_timeout: Duration) -> PlaywrightContext {
        let script = format!(
            r#"while read -r line; do sleep {delay}; id=$(echo "$line" | sed 's/.*"id":\([0-9]*\).*/\1/'); echo "{{\"id\":$id,\"ok\":true,\"value\":true}}"; done"#
        );
        let child = TokioCommand::new("sh")
            .arg("-c")
            .arg(script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        PlaywrightContext::attach(child, action_timeout).unwrap()
    }

    #[tokio::test]
    async fn test_bridge_answers_in_time() {
        let mut context = slow_bridge("0", Duration::from_secs(5));
        let locator = Locator::text("Email");
        assert!(context.is_visible(&locator).await.unwrap());
        assert!(context.is_visible(&locator).await.unwrap());
    }

    #[tokio::test]
    async fn test_timed_out_call_abandons_context() {
        let mut context = slow_bridge("1", Duration::from_millis(200));
        let locator = Locator::pattern("email").first();

        let first = context.is_visible(&locator).await;
        assert!(matches!(first, Err(E2eError::Timeout(m)) if m.starts_with("is visible")));

        // The late reply to the first call must not be read as the answer to this one
        tokio::time::sleep(Duration::from_millis(1200)).await;
        let second = context.count(&locator).await;
        assert!(
            matches!(&second, Err(E2eError::Bridge(m)) if m.contains("timed out") && m.contains("cannot count")),
            "{:?}",
            second
        );
        assert!(context.close().await.is_ok());
    }

    #[test]
    fn test_bridge_script_handles_every_op() {
        for op in [
            "navigate", "reload", "set_content", "set_viewport", "set_offline", "add_init_script", "route",
            "url", "is_visible", "count", "text_content", "computed_style", "fill", "click", "close",
        ] {
            assert!(BRIDGE_SCRIPT.contains(&format!("{}:", op)), "bridge lacks op {}", op);
        }
    }
}
