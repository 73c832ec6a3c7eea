//! Boardcheck E2E suite
//!
//! Data-driven browser checks for the task board. Every card in the deck is
//! verified in its own browser context, either by a named scenario or, when
//! no scenario is registered for its title, by rendering the card and running
//! one behaviour check per tag.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TestRunner (Rust)                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CardDeck (YAML) ──filter──▶ cards                          │
//! │  for each card (bounded concurrency, fresh context):        │
//! │    ScenarioDispatcher::dispatch                             │
//! │      ├── ScenarioRegistry  title ─▶ scenario(ctx, env)      │
//! │      └── TagBehaviorRegistry tag ─▶ check(container, tag,   │
//! │                                            verifier)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BrowserContext                                             │
//! │    ├── PlaywrightContext  (node bridge, JSON lines)         │
//! │    └── StubBrowser        (in-memory, for tests)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod card;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod expect;
pub mod fixtures;
pub mod locator;
pub mod pages;
pub mod playwright;
pub mod runner;
pub mod scenarios;
pub mod server;
pub mod stub;
pub mod tags;

pub use card::{Card, CardDeck, Category, DesignTokens};
pub use context::{BrowserContext, ContextFactory, FixtureRoute};
pub use dispatcher::{DispatchPath, DispatchReport, ScenarioDispatcher};
pub use error::{E2eError, E2eResult};
pub use expect::{Expect, Strictness, Verifier};
pub use locator::Locator;
pub use runner::{CardFilter, CardResult, RunSettings, SuiteResult, TestRunner};
pub use scenarios::{FeatureArea, ScenarioEnv, ScenarioRegistry};
pub use tags::TagBehaviorRegistry;
