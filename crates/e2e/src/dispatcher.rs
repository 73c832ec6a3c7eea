//! Card dispatch: named scenario, or generic tag checks
//!
//! ```text
//! card ──▶ ScenarioRegistry::get(title) ──Some──▶ scenario(ctx, env)
//!                     │
//!                    None
//!                     ▼
//!          set_content(card markup)
//!          for tag in tags (declaration order):
//!              expect tag text visible        (always hard)
//!              TagBehaviorRegistry::check_for(tag)(container, tag, verifier)
//!                                             (hard or soft per strictness)
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::card::Card;
use crate::context::BrowserContext;
use crate::error::{E2eError, E2eResult};
use crate::expect::{Strictness, Verifier};
use crate::fixtures::html;
use crate::locator::Locator;
use crate::scenarios::{ScenarioEnv, ScenarioRegistry};
use crate::tags::TagBehaviorRegistry;

/// Selector of the rendered card container
pub const CARD_CONTAINER: &str = "[data-testid=\"card\"]";

/// Which verification path a card took
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchPath {
    /// A named scenario ran
    Scenario,
    /// The generic fallback checked this many tags
    TagChecks { checked: usize },
}

/// Outcome of a dispatch that did not abort
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub path: DispatchPath,
    /// Soft tag-behaviour failures, empty under strict mode
    pub soft_failures: Vec<String>,
}

impl DispatchReport {
    pub fn passed(&self) -> bool {
        self.soft_failures.is_empty()
    }

    /// Fail with the recorded soft failures, if any
    pub fn into_result(self) -> E2eResult<DispatchPath> {
        if self.soft_failures.is_empty() {
            Ok(self.path)
        } else {
            Err(E2eError::SoftAssertions(self.soft_failures))
        }
    }
}

/// Routes each card to its verification path.
///
/// Both registries are shared read-only, so one dispatcher can serve any
/// number of concurrently running cards.
#[derive(Debug, Clone)]
pub struct ScenarioDispatcher {
    scenarios: Arc<ScenarioRegistry>,
    tags: Arc<TagBehaviorRegistry>,
}

impl ScenarioDispatcher {
    pub fn new(scenarios: Arc<ScenarioRegistry>, tags: Arc<TagBehaviorRegistry>) -> Self {
        Self { scenarios, tags }
    }

    /// Dispatcher over the built-in scenarios and tag rules
    pub fn builtin() -> Self {
        Self::new(
            Arc::new(ScenarioRegistry::builtin()),
            Arc::new(TagBehaviorRegistry::builtin()),
        )
    }

    pub fn scenarios(&self) -> &ScenarioRegistry {
        &self.scenarios
    }

    pub fn tags(&self) -> &TagBehaviorRegistry {
        &self.tags
    }

    /// Verify one card.
    ///
    /// Hard failures (scenario assertions, missing tags, strict tag checks)
    /// are returned as errors. Soft failures come back in the report.
    pub async fn dispatch(
        &self,
        card: &Card,
        ctx: &mut dyn BrowserContext,
        env: &ScenarioEnv,
        strictness: Strictness,
    ) -> E2eResult<DispatchReport> {
        if let Some(scenario) = self.scenarios.get(&card.title) {
            info!("Running {} scenario for '{}'", scenario.area, card.title);
            (scenario.run)(ctx, env).await?;
            return Ok(DispatchReport {
                path: DispatchPath::Scenario,
                soft_failures: Vec::new(),
            });
        }

        info!(
            "No scenario for '{}', checking {} tag(s) ({:?})",
            card.title,
            card.tag_count(),
            strictness
        );
        ctx.set_content(&html::card(&card.title, &card.tags)).await?;
        let container = Locator::css(CARD_CONTAINER).first();
        let mut verifier = Verifier::new(strictness);

        for tag in &card.tags {
            let element = container.get_by_text(tag.as_str()).first();
            let message = format!("Missing tag \"{}\" for card \"{}\"", tag, card.title);
            env.expect.visible_with_message(ctx, &element, &message).await?;

            debug!(
                "Checking tag '{}' with {} rule",
                tag,
                if self.tags.has_check(tag) { "its own" } else { "the default" }
            );
            let check = self.tags.check_for(tag);
            check(ctx, &container, tag, &mut verifier).await?;
        }

        Ok(DispatchReport {
            path: DispatchPath::TagChecks {
                checked: card.tag_count(),
            },
            soft_failures: verifier.into_failures(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_into_result() {
        let clean = DispatchReport {
            path: DispatchPath::TagChecks { checked: 2 },
            soft_failures: Vec::new(),
        };
        assert!(clean.passed());
        assert_eq!(clean.into_result().unwrap(), DispatchPath::TagChecks { checked: 2 });

        let soft = DispatchReport {
            path: DispatchPath::TagChecks { checked: 1 },
            soft_failures: vec!["tag \"Bug\" color rgb(0, 0, 0) should be red".to_string()],
        };
        assert!(!soft.passed());
        assert!(matches!(soft.into_result(), Err(E2eError::SoftAssertions(f)) if f.len() == 1));
    }

    #[test]
    fn test_path_serialization() {
        let json = serde_json::to_string(&DispatchPath::TagChecks { checked: 3 }).unwrap();
        assert_eq!(json, r#"{"kind":"tag_checks","checked":3}"#);
    }
}
