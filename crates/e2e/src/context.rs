//! The browser capabilities scenarios and tag checks run against

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::E2eResult;
use crate::locator::{Locator, Point};

/// A canned response registered for every request matching `pattern`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureRoute {
    /// Glob over the full request URL (`**` crosses `/`, `*` does not)
    pub pattern: String,
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

/// Computed style of one element, keyed by kebab-case property name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComputedStyle(HashMap<String, String>);

impl ComputedStyle {
    pub fn new(properties: HashMap<String, String>) -> Self {
        Self(properties)
    }

    /// Property value, or the empty string when the engine reported none
    pub fn get(&self, property: &str) -> &str {
        self.0.get(property).map(String::as_str).unwrap_or("")
    }

    /// Leading numeric part of a length such as `12px`; 0 when absent
    pub fn px(&self, property: &str) -> f64 {
        parse_leading_float(self.get(property)).unwrap_or(0.0)
    }

    pub fn set(&mut self, property: impl Into<String>, value: impl Into<String>) {
        self.0.insert(property.into(), value.into());
    }
}

/// Like JavaScript's `parseFloat`: the longest numeric prefix, if any
pub(crate) fn parse_leading_float(value: &str) -> Option<f64> {
    let value = value.trim();
    let end = value
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()?;
    value[..end].parse().ok()
}

/// One isolated browser context with a single page.
///
/// Every method is a suspension point; implementations bound each call by
/// their own action timeout and report it as [`crate::E2eError::Timeout`].
#[async_trait]
pub trait BrowserContext: Send {
    /// Navigate the page; relative URLs resolve against the base URL
    async fn navigate(&mut self, url: &str) -> E2eResult<()>;

    async fn reload(&mut self) -> E2eResult<()>;

    /// Replace the page document with literal HTML
    async fn set_content(&mut self, html: &str) -> E2eResult<()>;

    async fn set_viewport(&mut self, width: u32, height: u32) -> E2eResult<()>;

    async fn set_offline(&mut self, offline: bool) -> E2eResult<()>;

    /// Script evaluated before any page script on every navigation
    async fn add_init_script(&mut self, script: &str) -> E2eResult<()>;

    /// Register a route interception; the most recent match wins
    async fn intercept_route(&mut self, route: FixtureRoute) -> E2eResult<()>;

    async fn current_url(&mut self) -> E2eResult<String>;

    /// Whether the locator's first match is rendered and visible; never waits
    async fn is_visible(&mut self, locator: &Locator) -> E2eResult<bool>;

    async fn count(&mut self, locator: &Locator) -> E2eResult<usize>;

    /// Text content of the first match
    async fn text_content(&mut self, locator: &Locator) -> E2eResult<Option<String>>;

    /// Computed style of the first match
    async fn computed_style(&mut self, locator: &Locator) -> E2eResult<ComputedStyle>;

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()>;

    /// Click the first match, optionally at a position relative to it
    async fn click(&mut self, locator: &Locator, position: Option<Point>) -> E2eResult<()>;

    /// Tear the context down; nothing registered on it survives
    async fn close(&mut self) -> E2eResult<()> {
        Ok(())
    }
}

/// Produces a fresh, isolated context for each card
#[async_trait]
pub trait ContextFactory: Send + Sync {
    async fn new_context(&self) -> E2eResult<Box<dyn BrowserContext>>;
}

#[async_trait]
impl<F> ContextFactory for F
where
    F: Fn() -> E2eResult<Box<dyn BrowserContext>> + Send + Sync,
{
    async fn new_context(&self) -> E2eResult<Box<dyn BrowserContext>> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_leading_float_matches_parse_float() {
        assert_eq!(parse_leading_float("12px"), Some(12.0));
        assert_eq!(parse_leading_float("4.5px"), Some(4.5));
        assert_eq!(parse_leading_float(" 700 "), Some(700.0));
        assert_eq!(parse_leading_float("-2px"), Some(-2.0));
        assert_eq!(parse_leading_float("bold"), None);
        assert_eq!(parse_leading_float(""), None);
    }

    #[test]
    fn test_computed_style_missing_property() {
        let mut style = ComputedStyle::default();
        style.set("padding-left", "6px");
        assert_eq!(style.px("padding-left"), 6.0);
        assert_eq!(style.px("padding-right"), 0.0);
        assert_eq!(style.get("color"), "");
    }
}
