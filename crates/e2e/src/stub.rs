//! In-memory browser context
//!
//! `StubBrowser` answers the [`BrowserContext`] capability set from a list of
//! declared elements instead of a rendered DOM. It records every call, serves
//! navigations only through registered fixture routes, and applies declared
//! click effects, which is enough to exercise the dispatcher, tag checks and
//! scenarios without a browser.
//!
//! Elements form a tree through [`StubElement::with_child`]. The first step
//! of a locator searches every element present on the current document;
//! each later step only matches descendants of the previous step's matches,
//! and `first` keeps the earliest match in document order. A hidden element
//! hides its descendants.

use async_trait::async_trait;
use regex::RegexBuilder;
use tracing::debug;

use crate::context::{BrowserContext, ComputedStyle, FixtureRoute};
use crate::error::{E2eError, E2eResult};
use crate::fixtures::route_matches;
use crate::locator::{Locator, LocatorStep, Point};

/// Document key used after `set_content`
pub const CONTENT_PAGE: &str = "about:blank";

/// What clicking an element does
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Make every element matching the locator visible
    Show(Locator),
    /// Hide every element matching the locator
    Hide(Locator),
    /// Navigate the page, going through fixture routes
    Navigate(String),
    /// Replace the text of every element matching the locator
    SetText(Locator, String),
    /// Apply `then` only while `field` holds `value`, like form validation
    When {
        field: Locator,
        value: String,
        then: Vec<Effect>,
    },
}

/// A declared element
#[derive(Debug, Clone, PartialEq)]
pub struct StubElement {
    text: String,
    selectors: Vec<String>,
    page: Option<String>,
    connectivity: Option<bool>,
    visible: bool,
    style: ComputedStyle,
    value: String,
    on_click: Vec<Effect>,
    children: Vec<StubElement>,
    parent: Option<usize>,
    stalled: bool,
}

impl StubElement {
    /// A visible element with text content, present on every document
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            selectors: Vec::new(),
            page: None,
            connectivity: None,
            visible: true,
            style: ComputedStyle::default(),
            value: String::new(),
            on_click: Vec::new(),
            children: Vec::new(),
            parent: None,
            stalled: false,
        }
    }

    /// A visible element answering to a CSS selector
    pub fn css(selector: impl Into<String>) -> Self {
        Self::text("").with_selector(selector)
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selectors.push(selector.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Only present while the current document's path is `path`
    /// (use [`CONTENT_PAGE`] for `set_content` documents)
    pub fn on_page(mut self, path: impl Into<String>) -> Self {
        self.page = Some(path.into());
        self
    }

    /// Only present while the context's offline flag equals `offline`
    pub fn when_offline(mut self, offline: bool) -> Self {
        self.connectivity = Some(offline);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Queries that match this element time out, like a page that stopped responding
    pub fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }

    pub fn with_style(mut self, property: &str, value: &str) -> Self {
        self.style.set(property, value);
        self
    }

    pub fn on_click(mut self, effect: Effect) -> Self {
        self.on_click.push(effect);
        self
    }

    /// Nest an element inside this one
    pub fn with_child(mut self, child: StubElement) -> Self {
        self.children.push(child);
        self
    }

    fn matches_text(&self, needle: &str, exact: bool) -> bool {
        let haystack = normalize_whitespace(&self.text);
        let needle = normalize_whitespace(needle);
        if exact {
            haystack == needle
        } else {
            !needle.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Every call made against the stub, in order
#[derive(Debug, Clone, PartialEq)]
pub enum StubCall {
    Navigate(String),
    Reload,
    SetContent(String),
    SetViewport(u32, u32),
    SetOffline(bool),
    AddInitScript(String),
    Route(FixtureRoute),
    CurrentUrl,
    IsVisible(Locator),
    Count(Locator),
    TextContent(Locator),
    ComputedStyle(Locator),
    Fill(Locator, String),
    Click(Locator),
    Close,
}

/// A response fulfilled from a fixture route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedResponse {
    pub url: String,
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

/// In-memory [`BrowserContext`]
#[derive(Debug)]
pub struct StubBrowser {
    base_url: String,
    url: String,
    page_key: String,
    elements: Vec<StubElement>,
    routes: Vec<FixtureRoute>,
    served: Vec<ServedResponse>,
    calls: Vec<StubCall>,
    content: Option<String>,
    init_scripts: Vec<String>,
    viewport: Option<(u32, u32)>,
    offline: bool,
    closed: bool,
}

impl StubBrowser {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            url: CONTENT_PAGE.to_string(),
            page_key: CONTENT_PAGE.to_string(),
            elements: Vec::new(),
            routes: Vec::new(),
            served: Vec::new(),
            calls: Vec::new(),
            content: None,
            init_scripts: Vec::new(),
            viewport: None,
            offline: false,
            closed: false,
        }
    }

    pub fn with_element(mut self, element: StubElement) -> Self {
        self.add_element(element);
        self
    }

    /// Declare an element and its children, flattened in document order
    pub fn add_element(&mut self, element: StubElement) {
        self.insert(element, None);
    }

    fn insert(&mut self, mut element: StubElement, parent: Option<usize>) {
        let children = std::mem::take(&mut element.children);
        element.parent = parent;
        let index = self.elements.len();
        self.elements.push(element);
        for child in children {
            self.insert(child, Some(index));
        }
    }

    pub fn calls(&self) -> &[StubCall] {
        &self.calls
    }

    pub fn served(&self) -> &[ServedResponse] {
        &self.served
    }

    pub fn routes(&self) -> &[FixtureRoute] {
        &self.routes
    }

    /// HTML passed to the last `set_content`
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn init_scripts(&self) -> &[String] {
        &self.init_scripts
    }

    pub fn viewport(&self) -> Option<(u32, u32)> {
        self.viewport
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Value last filled into the locator's first match
    pub fn value_of(&self, locator: &Locator) -> Option<&str> {
        let index = *self.resolve(locator).ok()?.first()?;
        Some(self.elements[index].value.as_str())
    }

    fn resolve_url(&self, url: &str) -> String {
        if url.contains("://") {
            url.to_string()
        } else {
            format!("{}/{}", self.base_url.trim_end_matches('/'), url.trim_start_matches('/'))
        }
    }

    fn go(&mut self, url: &str) -> E2eResult<()> {
        let url = self.resolve_url(url);
        let mut route = None;
        for candidate in self.routes.iter().rev() {
            if route_matches(&candidate.pattern, &url)? {
                route = Some(candidate.clone());
                break;
            }
        }
        let route = route.ok_or_else(|| E2eError::Navigation {
            url: url.clone(),
            reason: "net::ERR_CONNECTION_REFUSED (no fixture route)".to_string(),
        })?;
        debug!("Stub served {} from {}", url, route.pattern);
        self.served.push(ServedResponse {
            url: url.clone(),
            status: route.status,
            content_type: route.content_type,
            body: route.body,
        });
        self.page_key = path_of(&url);
        self.url = url;
        Ok(())
    }

    fn is_present(&self, element: &StubElement) -> bool {
        element.page.as_deref().map_or(true, |p| p == self.page_key)
            && element.connectivity.map_or(true, |offline| offline == self.offline)
            && element.parent.map_or(true, |p| self.is_present(&self.elements[p]))
    }

    fn is_shown(&self, index: usize) -> bool {
        let element = &self.elements[index];
        element.visible && element.parent.map_or(true, |p| self.is_shown(p))
    }

    fn is_descendant(&self, index: usize, ancestors: &[usize]) -> bool {
        let mut current = self.elements[index].parent;
        while let Some(parent) = current {
            if ancestors.contains(&parent) {
                return true;
            }
            current = self.elements[parent].parent;
        }
        false
    }

    fn resolve(&self, locator: &Locator) -> E2eResult<Vec<usize>> {
        let matched = self.resolve_in(locator, |e| self.is_present(e))?;
        if matched.iter().any(|&i| self.elements[i].stalled) {
            return Err(E2eError::Timeout(locator.to_string()));
        }
        Ok(matched)
    }

    fn resolve_in(&self, locator: &Locator, present: impl Fn(&StubElement) -> bool) -> E2eResult<Vec<usize>> {
        // None until a step has matched against the whole document
        let mut scope: Option<Vec<usize>> = None;
        for step in locator.steps() {
            let matched = match step {
                LocatorStep::First => scope.unwrap_or_default().into_iter().take(1).collect(),
                LocatorStep::Css { selector } => {
                    self.select(&present, scope.as_deref(), |e| e.selectors.iter().any(|s| s == selector))
                }
                LocatorStep::Text { text, exact } => {
                    self.select(&present, scope.as_deref(), |e| e.matches_text(text, *exact))
                }
                LocatorStep::Pattern { source, case_insensitive } => {
                    let re = RegexBuilder::new(source)
                        .case_insensitive(*case_insensitive)
                        .build()?;
                    self.select(&present, scope.as_deref(), |e| re.is_match(&e.text))
                }
            };
            scope = Some(matched);
        }
        Ok(scope.unwrap_or_default())
    }

    fn select(
        &self,
        present: &impl Fn(&StubElement) -> bool,
        within: Option<&[usize]>,
        predicate: impl Fn(&StubElement) -> bool,
    ) -> Vec<usize> {
        self.elements
            .iter()
            .enumerate()
            .filter(|(i, _)| within.map_or(true, |ancestors| self.is_descendant(*i, ancestors)))
            .filter(|(_, e)| present(e) && predicate(e))
            .map(|(i, _)| i)
            .collect()
    }

    fn first(&self, locator: &Locator) -> E2eResult<usize> {
        self.resolve(locator)?
            .first()
            .copied()
            .ok_or_else(|| E2eError::ElementNotFound(locator.to_string()))
    }

    fn apply(&mut self, effect: Effect) -> E2eResult<()> {
        match effect {
            Effect::Show(target) => self.set_visible(&target, true),
            Effect::Hide(target) => self.set_visible(&target, false),
            Effect::Navigate(url) => self.go(&url),
            Effect::SetText(target, text) => {
                for index in self.resolve_in(&target, |_| true)? {
                    self.elements[index].text = text.clone();
                }
                Ok(())
            }
            Effect::When { field, value, then } => {
                if self.value_of(&field) != Some(value.as_str()) {
                    return Ok(());
                }
                then.into_iter().try_for_each(|effect| self.apply(effect))
            }
        }
    }

    fn set_visible(&mut self, target: &Locator, visible: bool) -> E2eResult<()> {
        // Effects reach elements on any document, e.g. a menu declared for "/"
        for index in self.resolve_in(target, |_| true)? {
            self.elements[index].visible = visible;
        }
        Ok(())
    }
}

/// Path of a URL without query or fragment, `/` when empty
fn path_of(url: &str) -> String {
    let after_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = after_scheme.find('/').map_or("/", |i| &after_scheme[i..]);
    let path = path.split(['?', '#']).next().unwrap_or("/");
    if path.is_empty() { "/".to_string() } else { path.to_string() }
}

#[async_trait]
impl BrowserContext for StubBrowser {
    async fn navigate(&mut self, url: &str) -> E2eResult<()> {
        self.calls.push(StubCall::Navigate(url.to_string()));
        self.go(url)
    }

    async fn reload(&mut self) -> E2eResult<()> {
        self.calls.push(StubCall::Reload);
        if self.page_key == CONTENT_PAGE {
            return Ok(());
        }
        let url = self.url.clone();
        self.go(&url)
    }

    async fn set_content(&mut self, html: &str) -> E2eResult<()> {
        self.calls.push(StubCall::SetContent(html.to_string()));
        self.content = Some(html.to_string());
        self.url = CONTENT_PAGE.to_string();
        self.page_key = CONTENT_PAGE.to_string();
        Ok(())
    }

    async fn set_viewport(&mut self, width: u32, height: u32) -> E2eResult<()> {
        self.calls.push(StubCall::SetViewport(width, height));
        self.viewport = Some((width, height));
        Ok(())
    }

    async fn set_offline(&mut self, offline: bool) -> E2eResult<()> {
        self.calls.push(StubCall::SetOffline(offline));
        self.offline = offline;
        Ok(())
    }

    async fn add_init_script(&mut self, script: &str) -> E2eResult<()> {
        self.calls.push(StubCall::AddInitScript(script.to_string()));
        self.init_scripts.push(script.to_string());
        Ok(())
    }

    async fn intercept_route(&mut self, route: FixtureRoute) -> E2eResult<()> {
        self.calls.push(StubCall::Route(route.clone()));
        self.routes.push(route);
        Ok(())
    }

    async fn current_url(&mut self) -> E2eResult<String> {
        self.calls.push(StubCall::CurrentUrl);
        Ok(self.url.clone())
    }

    async fn is_visible(&mut self, locator: &Locator) -> E2eResult<bool> {
        self.calls.push(StubCall::IsVisible(locator.clone()));
        Ok(self
            .resolve(locator)?
            .first()
            .map_or(false, |&i| self.is_shown(i)))
    }

    async fn count(&mut self, locator: &Locator) -> E2eResult<usize> {
        self.calls.push(StubCall::Count(locator.clone()));
        Ok(self.resolve(locator)?.len())
    }

    async fn text_content(&mut self, locator: &Locator) -> E2eResult<Option<String>> {
        self.calls.push(StubCall::TextContent(locator.clone()));
        let index = self.first(locator)?;
        Ok(Some(self.elements[index].text.clone()))
    }

    async fn computed_style(&mut self, locator: &Locator) -> E2eResult<ComputedStyle> {
        self.calls.push(StubCall::ComputedStyle(locator.clone()));
        let index = self.first(locator)?;
        Ok(self.elements[index].style.clone())
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.calls.push(StubCall::Fill(locator.clone(), value.to_string()));
        let index = self.first(locator)?;
        self.elements[index].value = value.to_string();
        Ok(())
    }

    async fn click(&mut self, locator: &Locator, _position: Option<Point>) -> E2eResult<()> {
        self.calls.push(StubCall::Click(locator.clone()));
        let index = self.first(locator)?;
        if !self.is_shown(index) {
            return Err(E2eError::Timeout(format!("click {} (element not visible)", locator)));
        }
        for effect in self.elements[index].on_click.clone() {
            self.apply(effect)?;
        }
        Ok(())
    }

    async fn close(&mut self) -> E2eResult<()> {
        self.calls.push(StubCall::Close);
        self.routes.clear();
        self.closed = true;
        Ok(())
    }
}
