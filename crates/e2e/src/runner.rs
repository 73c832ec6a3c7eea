//! Test runner: selects cards, gives each a fresh context, aggregates results

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{error, info, info_span, warn, Instrument};

use crate::card::{Card, CardDeck, Category};
use crate::config::Settings;
use crate::context::ContextFactory;
use crate::dispatcher::{DispatchPath, ScenarioDispatcher};
use crate::error::{E2eError, E2eResult};
use crate::expect::Strictness;
use crate::scenarios::{FeatureArea, ScenarioEnv, ScenarioRegistry};

/// Name of the results file inside the output directory
pub const RESULTS_FILE: &str = "results.json";

/// Result of verifying a single card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardResult {
    pub title: String,
    pub category: Category,
    /// `None` when the card failed before dispatch completed
    pub path: Option<DispatchPath>,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub soft_failures: Vec<String>,
}

/// Result of running a deck
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteResult {
    pub started_at: DateTime<Utc>,
    pub strictness: Strictness,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<CardResult>,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &CardResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

/// Which cards of a deck to run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardFilter {
    /// Only cards whose scenario belongs to one of these areas (empty = any)
    pub areas: Vec<FeatureArea>,

    /// Only cards without a named scenario
    pub generic_only: bool,

    /// Case-insensitive substring of the title
    pub title: Option<String>,
}

impl CardFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn areas(areas: &[FeatureArea]) -> Self {
        Self {
            areas: areas.to_vec(),
            ..Self::default()
        }
    }

    pub fn generic_only() -> Self {
        Self {
            generic_only: true,
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        self.title = if title.trim().is_empty() { None } else { Some(title) };
        self
    }

    pub fn matches(&self, card: &Card, scenarios: &ScenarioRegistry) -> bool {
        if let Some(needle) = &self.title {
            if !card.title.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if self.generic_only && scenarios.contains(&card.title) {
            return false;
        }
        if !self.areas.is_empty() {
            return scenarios
                .area_of(&card.title)
                .is_some_and(|area| self.areas.contains(&area));
        }
        true
    }
}

/// Per-run knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Cards verified concurrently
    pub workers: usize,
    pub card_timeout: Duration,
    pub strictness: Strictness,
}

impl RunSettings {
    pub fn from_settings(settings: &Settings, strictness: Strictness) -> Self {
        Self {
            workers: settings.workers,
            card_timeout: settings.timeouts.card(),
            strictness,
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from_settings(&Settings::default(), Strictness::default())
    }
}

/// Main E2E test runner
pub struct TestRunner {
    dispatcher: ScenarioDispatcher,
    env: ScenarioEnv,
    settings: RunSettings,
}

impl TestRunner {
    pub fn new(dispatcher: ScenarioDispatcher, env: ScenarioEnv, settings: RunSettings) -> Self {
        Self {
            dispatcher,
            env,
            settings,
        }
    }

    pub fn dispatcher(&self) -> &ScenarioDispatcher {
        &self.dispatcher
    }

    /// Cards of `deck` selected by `filter`, in deck order
    pub fn select<'d>(&self, deck: &'d CardDeck, filter: &CardFilter) -> Vec<&'d Card> {
        deck.cards
            .iter()
            .filter(|card| filter.matches(card, self.dispatcher.scenarios()))
            .collect()
    }

    /// Setup checks for the selected cards, run before any app or browser starts
    pub fn preflight(&self, deck: &CardDeck, filter: &CardFilter) -> E2eResult<()> {
        let scenarios = self.dispatcher.scenarios();
        if self.env.credentials.is_none() {
            if let Some(card) = self
                .select(deck, filter)
                .into_iter()
                .find(|card| scenarios.needs_credentials(&card.title))
            {
                error!("Card '{}' logs in but no credentials are set", card.title);
                return Err(E2eError::MissingEnv("USERNAME".to_string()));
            }
        }
        Ok(())
    }

    /// Run every selected card; results keep deck order
    pub async fn run(&self, deck: &CardDeck, filter: &CardFilter, factory: &dyn ContextFactory) -> SuiteResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let selected = self.select(deck, filter);
        let skipped = deck.cards.len() - selected.len();

        info!(
            "Running {} card(s) with {} worker(s), {:?} tag checks ({} skipped)",
            selected.len(),
            self.settings.workers,
            self.settings.strictness,
            skipped
        );

        let results: Vec<CardResult> = stream::iter(selected.into_iter().map(|card| self.run_card(card, factory)))
            .buffered(self.settings.workers.max(1))
            .collect()
            .await;

        let passed = results.iter().filter(|r| r.success).count();
        let failed = results.len() - passed;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );

        SuiteResult {
            started_at,
            strictness: self.settings.strictness,
            total: results.len() + skipped,
            passed,
            failed,
            skipped,
            duration_ms,
            results,
        }
    }

    /// Verify one card in its own context
    pub async fn run_card(&self, card: &Card, factory: &dyn ContextFactory) -> CardResult {
        let start = Instant::now();
        let span = info_span!("card", title = %card.title);

        let outcome = async {
            let mut ctx = factory.new_context().await?;
            let dispatched = timeout(
                self.settings.card_timeout,
                self.dispatcher
                    .dispatch(card, ctx.as_mut(), &self.env, self.settings.strictness),
            )
            .await
            .unwrap_or_else(|_| {
                Err(E2eError::Timeout(format!(
                    "card '{}' after {} ms",
                    card.title,
                    self.settings.card_timeout.as_millis()
                )))
            });
            if let Err(e) = ctx.close().await {
                warn!("Failed to close context: {}", e);
            }
            dispatched
        }
        .instrument(span)
        .await;

        let duration_ms = start.elapsed().as_millis() as u64;
        let result = match outcome {
            Ok(report) => {
                let error = (!report.passed())
                    .then(|| E2eError::SoftAssertions(report.soft_failures.clone()).to_string());
                CardResult {
                    title: card.title.clone(),
                    category: card.category,
                    success: report.passed(),
                    path: Some(report.path),
                    duration_ms,
                    error,
                    soft_failures: report.soft_failures,
                }
            }
            Err(e) => CardResult {
                title: card.title.clone(),
                category: card.category,
                path: None,
                success: false,
                duration_ms,
                error: Some(e.to_string()),
                soft_failures: Vec::new(),
            },
        };

        if result.success {
            info!("✓ {} ({} ms)", result.title, result.duration_ms);
        } else {
            error!(
                "✗ {} - {}",
                result.title,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
        result
    }
}

/// Write results to `<output_dir>/results.json`
pub fn write_results(output_dir: &Path, results: &SuiteResult) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let path = output_dir.join(RESULTS_FILE);
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

/// Load results written by a previous run
pub fn read_results(output_dir: &Path) -> E2eResult<SuiteResult> {
    let path = output_dir.join(RESULTS_FILE);
    let content = std::fs::read_to_string(&path)
        .map_err(|e| E2eError::Config(format!("no results at {}: {}", path.display(), e)))?;
    Ok(serde_json::from_str(&content)?)
}
