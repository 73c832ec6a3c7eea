//! Assertions: auto-waiting hard expectations and soft/strict tag verification

use std::fmt;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::context::BrowserContext;
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;

/// Default expectation timeout (5 seconds)
pub const DEFAULT_EXPECT_TIMEOUT_MS: u64 = 5000;

/// Default polling interval between expectation probes
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Whether tag-behaviour checks abort the card or are collected
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    Strict,
    #[default]
    Soft,
}

impl Strictness {
    /// Interpret an environment value; absent, empty, `0`, `false`, `no` and
    /// `off` (any case) are soft, anything else is strict
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            None => Strictness::Soft,
            Some(v) if matches!(v.as_str(), "" | "0" | "false" | "no" | "off") => Strictness::Soft,
            Some(_) => Strictness::Strict,
        }
    }

    /// Read `TAG_IS_STRICT` from the process environment
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var("TAG_IS_STRICT").ok().as_deref())
    }

    pub fn is_strict(self) -> bool {
        self == Strictness::Strict
    }
}

/// Collects tag-behaviour outcomes under a strictness mode.
///
/// Strict: the first failure is returned as an error. Soft: failures are
/// recorded and execution continues; [`Verifier::finish`] reports them.
#[derive(Debug)]
pub struct Verifier {
    strictness: Strictness,
    failures: Vec<String>,
}

impl Verifier {
    pub fn new(strictness: Strictness) -> Self {
        Self {
            strictness,
            failures: Vec::new(),
        }
    }

    pub fn strictness(&self) -> Strictness {
        self.strictness
    }

    pub fn verify(&mut self, passed: bool, describe: impl FnOnce() -> String) -> E2eResult<()> {
        if passed {
            return Ok(());
        }
        let message = describe();
        match self.strictness {
            Strictness::Strict => Err(E2eError::AssertionFailed(message)),
            Strictness::Soft => {
                warn!("Soft assertion failed: {}", message);
                self.failures.push(message);
                Ok(())
            }
        }
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<String> {
        self.failures
    }

    /// Turn recorded soft failures into an error
    pub fn finish(self) -> E2eResult<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(E2eError::SoftAssertions(self.failures))
        }
    }
}

/// Timing for auto-waiting expectations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ExpectConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_EXPECT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

/// Something an expectation waits for
enum Condition<'a> {
    Visible(&'a Locator),
    Hidden(&'a Locator),
    Count(&'a Locator, usize),
    Css(&'a Locator, &'a str, &'a str),
    ContainsText(&'a Locator, &'a str),
    Url(&'a Regex),
}

impl fmt::Display for Condition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Visible(l) => write!(f, "{} to be visible", l),
            Condition::Hidden(l) => write!(f, "{} to be hidden", l),
            Condition::Count(l, n) => write!(f, "{} to have count {}", l, n),
            Condition::Css(l, property, value) => {
                write!(f, "{} to have CSS {} \"{}\"", l, property, value)
            }
            Condition::ContainsText(l, text) => write!(f, "{} to contain text \"{}\"", l, text),
            Condition::Url(re) => write!(f, "page URL to match /{}/", re.as_str()),
        }
    }
}

/// One probe of a condition: did it hold, and what was observed
struct Observation {
    passed: bool,
    actual: String,
}

/// Hard, auto-waiting expectations.
///
/// Each method polls until its condition holds or the timeout elapses, then
/// fails with [`E2eError::AssertionFailed`] naming the expected condition and
/// the last observed value. A driver timeout is propagated as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct Expect {
    config: ExpectConfig,
}

impl Expect {
    pub fn new(config: ExpectConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExpectConfig {
        &self.config
    }

    pub async fn visible(&self, ctx: &mut dyn BrowserContext, locator: &Locator) -> E2eResult<()> {
        self.until(ctx, Condition::Visible(locator), None).await
    }

    /// Visibility with a caller-supplied failure context
    pub async fn visible_with_message(
        &self,
        ctx: &mut dyn BrowserContext,
        locator: &Locator,
        message: &str,
    ) -> E2eResult<()> {
        self.until(ctx, Condition::Visible(locator), Some(message)).await
    }

    pub async fn hidden(&self, ctx: &mut dyn BrowserContext, locator: &Locator) -> E2eResult<()> {
        self.until(ctx, Condition::Hidden(locator), None).await
    }

    pub async fn count(&self, ctx: &mut dyn BrowserContext, locator: &Locator, expected: usize) -> E2eResult<()> {
        self.until(ctx, Condition::Count(locator, expected), None).await
    }

    pub async fn css(
        &self,
        ctx: &mut dyn BrowserContext,
        locator: &Locator,
        property: &str,
        expected: &str,
    ) -> E2eResult<()> {
        self.until(ctx, Condition::Css(locator, property, expected), None).await
    }

    pub async fn contains_text(&self, ctx: &mut dyn BrowserContext, locator: &Locator, text: &str) -> E2eResult<()> {
        self.until(ctx, Condition::ContainsText(locator, text), None).await
    }

    /// Wait for the page URL to match a regular expression
    pub async fn url_matches(&self, ctx: &mut dyn BrowserContext, pattern: &str) -> E2eResult<()> {
        let re = Regex::new(pattern)?;
        self.until(ctx, Condition::Url(&re), None).await
    }

    async fn until(&self, ctx: &mut dyn BrowserContext, condition: Condition<'_>, message: Option<&str>) -> E2eResult<()> {
        let start = Instant::now();
        loop {
            let observation = probe(ctx, &condition).await?;
            if observation.passed {
                debug!("Expectation met: {}", condition);
                return Ok(());
            }
            if start.elapsed() >= self.config.timeout {
                let detail = format!(
                    "expected {} (timed out after {} ms); actual: {}",
                    condition,
                    self.config.timeout.as_millis(),
                    observation.actual
                );
                return Err(E2eError::AssertionFailed(match message {
                    Some(m) => format!("{}: {}", m, detail),
                    None => detail,
                }));
            }
            sleep(self.config.poll_interval).await;
        }
    }
}

async fn probe(ctx: &mut dyn BrowserContext, condition: &Condition<'_>) -> E2eResult<Observation> {
    let observation = match condition {
        Condition::Visible(locator) => {
            let visible = ctx.is_visible(locator).await?;
            Observation {
                passed: visible,
                actual: if visible { "visible" } else { "not visible" }.to_string(),
            }
        }
        Condition::Hidden(locator) => {
            let visible = ctx.is_visible(locator).await?;
            Observation {
                passed: !visible,
                actual: if visible { "visible" } else { "hidden" }.to_string(),
            }
        }
        Condition::Count(locator, expected) => {
            let count = ctx.count(locator).await?;
            Observation {
                passed: count == *expected,
                actual: format!("count {}", count),
            }
        }
        Condition::Css(locator, property, expected) => match ctx.computed_style(locator).await {
            Ok(style) => {
                let value = style.get(property);
                Observation {
                    passed: value == *expected,
                    actual: format!("\"{}\"", value),
                }
            }
            Err(E2eError::ElementNotFound(what)) => Observation {
                passed: false,
                actual: format!("no element matches {}", what),
            },
            Err(e) => return Err(e),
        },
        Condition::ContainsText(locator, text) => match ctx.text_content(locator).await {
            Ok(content) => {
                let content = content.unwrap_or_default();
                Observation {
                    passed: content.contains(text),
                    actual: format!("\"{}\"", content),
                }
            }
            Err(E2eError::ElementNotFound(what)) => Observation {
                passed: false,
                actual: format!("no element matches {}", what),
            },
            Err(e) => return Err(e),
        },
        Condition::Url(re) => {
            let url = ctx.current_url().await?;
            Observation {
                passed: re.is_match(&url),
                actual: url,
            }
        }
    };
    Ok(observation)
}
