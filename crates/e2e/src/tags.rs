//! Tag behaviour checks
//!
//! Tags carry semantic intent (priority, defect, design work) that should
//! show up as a distinct visual treatment. Each rule checks one property of
//! the rendered tag and reports through the [`Verifier`], so the same rule
//! runs hard or soft depending on the run's strictness.

use std::collections::HashMap;

use futures::future::BoxFuture;

use crate::context::{parse_leading_float, BrowserContext, ComputedStyle};
use crate::error::{E2eError, E2eResult};
use crate::expect::Verifier;
use crate::locator::Locator;

/// A check for one tag: (context, card container, tag text, verifier)
pub type TagCheck = for<'a> fn(
    &'a mut dyn BrowserContext,
    &'a Locator,
    &'a str,
    &'a mut Verifier,
) -> BoxFuture<'a, E2eResult<()>>;

/// Immutable lookup from tag label to check, with a default fallback
#[derive(Clone)]
pub struct TagBehaviorRegistry {
    checks: HashMap<String, TagCheck>,
    default: TagCheck,
}

impl TagBehaviorRegistry {
    /// A registry with only the default (visibility) check
    pub fn empty() -> Self {
        Self {
            checks: HashMap::new(),
            default: default_check,
        }
    }

    /// The built-in rules for the board's tag vocabulary
    pub fn builtin() -> Self {
        Self::empty()
            .with_check("High Priority", high_priority)
            .with_check("Bug", bug)
            .with_check("Design", design)
            .with_check("Feature", feature)
            .with_check("Marketing", marketing)
            .with_check("Email", email)
            .with_check("Q2", q2)
    }

    /// Add or replace the check for a label
    pub fn with_check(mut self, label: impl Into<String>, check: TagCheck) -> Self {
        self.checks.insert(label.into(), check);
        self
    }

    pub fn with_default(mut self, check: TagCheck) -> Self {
        self.default = check;
        self
    }

    /// Exact-label lookup, then the default
    pub fn check_for(&self, label: &str) -> TagCheck {
        self.checks.get(label).copied().unwrap_or(self.default)
    }

    pub fn has_check(&self, label: &str) -> bool {
        self.checks.contains_key(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.checks.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for TagBehaviorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut labels: Vec<&str> = self.labels().collect();
        labels.sort_unstable();
        f.debug_struct("TagBehaviorRegistry").field("labels", &labels).finish_non_exhaustive()
    }
}

impl Default for TagBehaviorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn tag_element(container: &Locator, tag: &str) -> Locator {
    container.get_by_text(tag).first()
}

/// Computed style of the tag chip. A chip that cannot be found is a failed
/// verification, so soft runs keep going; transport errors still propagate.
async fn tag_style(
    ctx: &mut dyn BrowserContext,
    container: &Locator,
    tag: &str,
    verifier: &mut Verifier,
) -> E2eResult<Option<ComputedStyle>> {
    match ctx.computed_style(&tag_element(container, tag)).await {
        Ok(style) => Ok(Some(style)),
        Err(E2eError::ElementNotFound(target)) => {
            verifier.verify(false, || format!("tag \"{}\" has no styled element ({})", tag, target))?;
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Numeric font weight; keywords and garbage count as normal (400)
pub fn font_weight(value: &str) -> f64 {
    match value.trim().parse::<f64>() {
        Ok(w) if w > 0.0 => w,
        _ => 400.0,
    }
}

/// Parse `rgb()`, `rgba()`, `#rgb` or `#rrggbb` into channels
pub fn parse_color(value: &str) -> Option<(u8, u8, u8)> {
    let value = value.trim().to_ascii_lowercase();
    if let Some(hex) = value.strip_prefix('#') {
        if !hex.is_ascii() {
            return None;
        }
        let expand = |s: &str| u8::from_str_radix(s, 16).ok();
        return match hex.len() {
            3 => {
                let c: Vec<u8> = hex
                    .chars()
                    .map(|ch| expand(&format!("{ch}{ch}")))
                    .collect::<Option<_>>()?;
                Some((c[0], c[1], c[2]))
            }
            6 => Some((expand(&hex[0..2])?, expand(&hex[2..4])?, expand(&hex[4..6])?)),
            _ => None,
        };
    }
    let inner = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let mut channels = inner.split(',').map(|c| c.trim().parse::<f64>().ok());
    let r = channels.next()??;
    let g = channels.next()??;
    let b = channels.next()??;
    let clamp = |v: f64| v.round().clamp(0.0, 255.0) as u8;
    Some((clamp(r), clamp(g), clamp(b)))
}

/// Strong red such as `#ef4444` / `rgb(239, 68, 68)`
pub fn is_red(value: &str) -> bool {
    matches!(parse_color(value), Some((r, g, b)) if r >= 200 && g <= 120 && b <= 120)
}

/// Fully transparent backgrounds, as computed styles report them
pub fn is_transparent(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    compact == "transparent" || compact == "rgba(0,0,0,0)"
}

fn high_priority<'a>(
    ctx: &'a mut dyn BrowserContext,
    container: &'a Locator,
    tag: &'a str,
    verifier: &'a mut Verifier,
) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(async move {
        let Some(style) = tag_style(ctx, container, tag, verifier).await? else {
            return Ok(());
        };
        let weight = font_weight(style.get("font-weight"));
        verifier.verify(weight >= 600.0, || {
            format!("tag \"{}\" font-weight {} should be >= 600", tag, weight)
        })
    })
}

fn bug<'a>(
    ctx: &'a mut dyn BrowserContext,
    container: &'a Locator,
    tag: &'a str,
    verifier: &'a mut Verifier,
) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(async move {
        let Some(style) = tag_style(ctx, container, tag, verifier).await? else {
            return Ok(());
        };
        let color = style.get("color").to_ascii_lowercase();
        verifier.verify(is_red(&color), || {
            format!("tag \"{}\" color {} should be red", tag, color)
        })
    })
}

fn design<'a>(
    ctx: &'a mut dyn BrowserContext,
    container: &'a Locator,
    tag: &'a str,
    verifier: &'a mut Verifier,
) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(async move {
        let Some(style) = tag_style(ctx, container, tag, verifier).await? else {
            return Ok(());
        };
        let background = style.get("background-color").to_ascii_lowercase();
        verifier.verify(!is_transparent(&background), || {
            format!("tag \"{}\" background {} should not be transparent", tag, background)
        })
    })
}

fn feature<'a>(
    ctx: &'a mut dyn BrowserContext,
    container: &'a Locator,
    tag: &'a str,
    verifier: &'a mut Verifier,
) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(async move {
        let Some(style) = tag_style(ctx, container, tag, verifier).await? else {
            return Ok(());
        };
        let left = parse_leading_float(style.get("padding-left"));
        let right = parse_leading_float(style.get("padding-right"));
        let padding_x = left.zip(right).map(|(l, r)| l + r);
        verifier.verify(padding_x.is_some_and(|p| p > 8.0), || {
            format!(
                "tag \"{}\" horizontal padding {} should be > 8px",
                tag,
                padding_x.map_or("unparseable".to_string(), |p| format!("{}px", p))
            )
        })
    })
}

fn marketing<'a>(
    ctx: &'a mut dyn BrowserContext,
    container: &'a Locator,
    _tag: &'a str,
    verifier: &'a mut Verifier,
) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(async move {
        let count = ctx.count(&container.get_by_text("Marketing")).await?;
        verifier.verify(count >= 1, || {
            format!("card should contain \"Marketing\" text, found {} element(s)", count)
        })
    })
}

fn email<'a>(
    ctx: &'a mut dyn BrowserContext,
    container: &'a Locator,
    _tag: &'a str,
    verifier: &'a mut Verifier,
) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(async move {
        let visible = match ctx.is_visible(&container.get_by_pattern("email").first()).await {
            Err(E2eError::ElementNotFound(_)) => false,
            other => other?,
        };
        verifier.verify(visible, || "card should show visible text matching /email/i".to_string())
    })
}

fn q2<'a>(
    ctx: &'a mut dyn BrowserContext,
    container: &'a Locator,
    _tag: &'a str,
    verifier: &'a mut Verifier,
) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(async move {
        let visible = ctx.is_visible(&container.get_by_pattern("q2").first()).await?;
        verifier.verify(visible, || "card should show visible text matching /q2/i".to_string())
    })
}

fn default_check<'a>(
    ctx: &'a mut dyn BrowserContext,
    container: &'a Locator,
    tag: &'a str,
    verifier: &'a mut Verifier,
) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(async move {
        let visible = ctx.is_visible(&tag_element(container, tag)).await?;
        verifier.verify(visible, || format!("tag \"{}\" should be visible", tag))
    })
}
