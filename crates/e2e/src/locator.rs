//! Chainable element queries
//!
//! A [`Locator`] is a plain value: building one never touches the browser.
//! Each step narrows the previous one, mirroring Playwright's
//! `page.locator(..).getByText(..).first()` chains. The Playwright bridge
//! replays the steps verbatim; the stub browser interprets them in memory.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One narrowing step of a locator chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocatorStep {
    /// CSS selector relative to the previous step
    Css { selector: String },

    /// Text content match; case-insensitive substring unless `exact`
    Text { text: String, exact: bool },

    /// Regular expression over text content
    Pattern { source: String, case_insensitive: bool },

    /// Keep only the first match
    First,
}

/// A chain of locator steps, evaluated lazily by a browser context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    steps: Vec<LocatorStep>,
}

impl Locator {
    /// Start a chain from a CSS selector
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            steps: vec![LocatorStep::Css { selector: selector.into() }],
        }
    }

    /// Start a chain from a text match (substring, case-insensitive)
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            steps: vec![LocatorStep::Text { text: text.into(), exact: false }],
        }
    }

    /// Start a chain from a case-insensitive text pattern
    pub fn pattern(source: impl Into<String>) -> Self {
        Self {
            steps: vec![LocatorStep::Pattern {
                source: source.into(),
                case_insensitive: true,
            }],
        }
    }

    /// Narrow by a CSS selector
    pub fn locator(&self, selector: impl Into<String>) -> Self {
        self.push(LocatorStep::Css { selector: selector.into() })
    }

    /// Narrow by text content (substring, case-insensitive)
    pub fn get_by_text(&self, text: impl Into<String>) -> Self {
        self.push(LocatorStep::Text { text: text.into(), exact: false })
    }

    /// Narrow by a case-insensitive text pattern
    pub fn get_by_pattern(&self, source: impl Into<String>) -> Self {
        self.push(LocatorStep::Pattern {
            source: source.into(),
            case_insensitive: true,
        })
    }

    pub fn first(&self) -> Self {
        self.push(LocatorStep::First)
    }

    pub fn steps(&self) -> &[LocatorStep] {
        &self.steps
    }

    fn push(&self, step: LocatorStep) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" >> ")?;
            }
            match step {
                LocatorStep::Css { selector } => write!(f, "css={}", selector)?,
                LocatorStep::Text { text, exact: true } => write!(f, "text=\"{}\"", text)?,
                LocatorStep::Text { text, exact: false } => write!(f, "text={}", text)?,
                LocatorStep::Pattern { source, case_insensitive } => {
                    write!(f, "text=/{}/{}", source, if *case_insensitive { "i" } else { "" })?
                }
                LocatorStep::First => f.write_str("nth=0")?,
            }
        }
        Ok(())
    }
}

/// A point relative to an element's top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}
