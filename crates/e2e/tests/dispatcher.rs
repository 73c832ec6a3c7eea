//! Dispatcher behaviour against the in-memory browser

use std::sync::Arc;
use std::time::Duration;

use boardcheck_e2e::context::BrowserContext;
use boardcheck_e2e::dispatcher::CARD_CONTAINER;
use boardcheck_e2e::expect::ExpectConfig;
use boardcheck_e2e::fixtures::serve;
use boardcheck_e2e::scenarios::ScenarioFn;
use boardcheck_e2e::stub::{StubBrowser, StubCall, StubElement, CONTENT_PAGE};
use boardcheck_e2e::{
    Card, Category, DispatchPath, E2eError, E2eResult, Expect, FeatureArea, Locator, ScenarioDispatcher,
    ScenarioEnv, ScenarioRegistry, Strictness, TagBehaviorRegistry,
};
use futures::future::BoxFuture;

fn quick_env() -> ScenarioEnv {
    ScenarioEnv {
        expect: Expect::new(ExpectConfig {
            timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(10),
        }),
        ..ScenarioEnv::default()
    }
}

fn generic_dispatcher() -> ScenarioDispatcher {
    ScenarioDispatcher::new(
        Arc::new(ScenarioRegistry::empty()),
        Arc::new(TagBehaviorRegistry::builtin()),
    )
}

fn chip(tag: &str) -> StubElement {
    StubElement::text(tag)
}

/// A rendered card whose container holds the given chips
fn board(chips: impl IntoIterator<Item = StubElement>) -> StubBrowser {
    let card = chips
        .into_iter()
        .fold(StubElement::css(CARD_CONTAINER).on_page(CONTENT_PAGE), StubElement::with_child);
    StubBrowser::new("http://app.test").with_element(card)
}

fn tag_locator(tag: &str) -> Locator {
    Locator::css(CARD_CONTAINER).first().get_by_text(tag).first()
}

fn marker<'a>(ctx: &'a mut dyn BrowserContext, _env: &'a ScenarioEnv) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(async move { ctx.set_viewport(1, 1).await })
}

#[tokio::test]
async fn registered_scenario_skips_tag_checks() {
    let dispatcher = ScenarioDispatcher::new(
        Arc::new(ScenarioRegistry::empty().with_scenario("API integration", FeatureArea::Payment, marker as ScenarioFn)),
        Arc::new(TagBehaviorRegistry::builtin()),
    );
    let card = Card::new("API integration", &["Feature", "High Priority"], Category::WebApplication);
    let mut stub = StubBrowser::new("http://app.test");

    let report = dispatcher
        .dispatch(&card, &mut stub, &quick_env(), Strictness::Strict)
        .await
        .unwrap();

    assert_eq!(report.path, DispatchPath::Scenario);
    assert_eq!(stub.calls(), [StubCall::SetViewport(1, 1)]);
}

#[tokio::test]
async fn each_tag_gets_one_visibility_assertion_then_its_check_in_order() {
    let card = Card::new("Checkout button misaligned", &["Bug", "High Priority"], Category::WebApplication);
    let mut stub = board([
        chip("Bug").with_style("color", "rgb(239, 68, 68)"),
        chip("High Priority").with_style("font-weight", "700"),
    ]);

    let report = generic_dispatcher()
        .dispatch(&card, &mut stub, &quick_env(), Strictness::Strict)
        .await
        .unwrap();

    assert_eq!(report.path, DispatchPath::TagChecks { checked: 2 });
    assert!(report.passed());
    let calls = stub.calls();
    assert!(matches!(&calls[0], StubCall::SetContent(html) if html.contains("Checkout button misaligned")));
    assert_eq!(
        &calls[1..],
        [
            StubCall::IsVisible(tag_locator("Bug")),
            StubCall::ComputedStyle(tag_locator("Bug")),
            StubCall::IsVisible(tag_locator("High Priority")),
            StubCall::ComputedStyle(tag_locator("High Priority")),
        ]
    );
}

#[tokio::test]
async fn duplicate_tags_are_checked_twice() {
    let card = Card::new("Twice flagged", &["Bug", "Bug"], Category::WebApplication);
    let mut stub = board([chip("Bug").with_style("color", "#ef4444")]);

    let report = generic_dispatcher()
        .dispatch(&card, &mut stub, &quick_env(), Strictness::Strict)
        .await
        .unwrap();

    assert_eq!(report.path, DispatchPath::TagChecks { checked: 2 });
    let styles = stub
        .calls()
        .iter()
        .filter(|c| matches!(c, StubCall::ComputedStyle(_)))
        .count();
    assert_eq!(styles, 2);
}

fn badly_styled() -> StubBrowser {
    board([
        chip("Bug").with_style("color", "rgb(55, 65, 81)"),
        chip("High Priority").with_style("font-weight", "400"),
    ])
}

#[tokio::test]
async fn soft_mode_records_failures_and_keeps_going() {
    let card = Card::new("Checkout button misaligned", &["Bug", "High Priority"], Category::WebApplication);
    let mut stub = badly_styled();

    let report = generic_dispatcher()
        .dispatch(&card, &mut stub, &quick_env(), Strictness::Soft)
        .await
        .unwrap();

    assert_eq!(report.soft_failures.len(), 2);
    assert!(report.soft_failures[0].contains("should be red"));
    assert!(report.soft_failures[1].contains(">= 600"));
    assert!(matches!(report.into_result(), Err(E2eError::SoftAssertions(f)) if f.len() == 2));
}

#[tokio::test]
async fn strict_mode_aborts_at_first_failure() {
    let card = Card::new("Checkout button misaligned", &["Bug", "High Priority"], Category::WebApplication);
    let mut stub = badly_styled();

    let err = generic_dispatcher()
        .dispatch(&card, &mut stub, &quick_env(), Strictness::Strict)
        .await
        .unwrap_err();

    assert!(matches!(err, E2eError::AssertionFailed(m) if m.contains("should be red")));
    assert!(!stub
        .calls()
        .iter()
        .any(|c| *c == StubCall::IsVisible(tag_locator("High Priority"))));
}

#[tokio::test]
async fn missing_tag_is_a_hard_failure_even_in_soft_mode() {
    let card = Card::new("Offline banner", &["Feature"], Category::Mobile);
    let mut stub = board([chip("Feature").hidden()]);

    let err = generic_dispatcher()
        .dispatch(&card, &mut stub, &quick_env(), Strictness::Soft)
        .await
        .unwrap_err();

    match err {
        E2eError::AssertionFailed(message) => {
            assert!(message.starts_with("Missing tag \"Feature\" for card \"Offline banner\""));
            assert!(message.contains("timed out after 200 ms"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unregistered_tag_uses_default_visibility_check() {
    let card = Card::new("Accessibility audit", &["Urgent"], Category::WebApplication);
    let mut stub = board([chip("Urgent")]);

    let report = generic_dispatcher()
        .dispatch(&card, &mut stub, &quick_env(), Strictness::Strict)
        .await
        .unwrap();

    assert!(report.passed());
    assert_eq!(
        &stub.calls()[1..],
        [
            StubCall::IsVisible(tag_locator("Urgent")),
            StubCall::IsVisible(tag_locator("Urgent")),
        ]
    );
}

#[tokio::test]
async fn design_card_without_scenario_checks_background() {
    let card = Card::new("Design system updates", &["Design"], Category::WebApplication);
    let mut stub = board([chip("Design").with_style("background-color", "rgba(0, 0, 0, 0)")]);

    let report = generic_dispatcher()
        .dispatch(&card, &mut stub, &quick_env(), Strictness::Soft)
        .await
        .unwrap();

    assert_eq!(report.path, DispatchPath::TagChecks { checked: 1 });
    assert_eq!(report.soft_failures.len(), 1);
    assert!(report.soft_failures[0].contains("should not be transparent"));
}

#[tokio::test]
async fn marketing_email_and_q2_rules_look_for_text() {
    let card = Card::new("Q2 newsletter", &["Email", "Q2", "Marketing"], Category::Marketing);
    let mut stub = board([chip("Email"), chip("Q2"), chip("Marketing")]);

    let report = generic_dispatcher()
        .dispatch(&card, &mut stub, &quick_env(), Strictness::Strict)
        .await
        .unwrap();

    assert!(report.passed());
    assert!(stub
        .calls()
        .contains(&StubCall::Count(Locator::css(CARD_CONTAINER).first().get_by_text("Marketing"))));
}

#[tokio::test]
async fn feature_padding_rule() {
    let card = Card::new("Bulk edit", &["Feature"], Category::WebApplication);
    let mut stub = board([chip("Feature")
        .with_style("padding-left", "4px")
        .with_style("padding-right", "4px")]);

    let report = generic_dispatcher()
        .dispatch(&card, &mut stub, &quick_env(), Strictness::Soft)
        .await
        .unwrap();

    assert_eq!(report.soft_failures.len(), 1);
    assert!(report.soft_failures[0].contains("8px"));
}

#[tokio::test]
async fn serving_a_fixture_twice_gives_identical_responses() {
    let mut stub = StubBrowser::new("http://app.test");
    serve(&mut stub, "/landing", "<div>Approved</div>").await.unwrap();
    stub.navigate("/landing").await.unwrap();
    serve(&mut stub, "/landing", "<div>Approved</div>").await.unwrap();
    stub.navigate("/landing").await.unwrap();

    let served = stub.served();
    assert_eq!(served.len(), 2);
    assert_eq!(served[0], served[1]);
    assert_eq!(served[0].status, 200);
    assert_eq!(served[0].content_type, "text/html");
}

#[tokio::test]
async fn later_registration_shadows_earlier() {
    let mut stub = StubBrowser::new("http://app.test");
    serve(&mut stub, "/landing", "old").await.unwrap();
    serve(&mut stub, "/landing", "new").await.unwrap();
    stub.navigate("/landing").await.unwrap();
    assert_eq!(stub.served()[0].body, "new");
}

#[tokio::test]
async fn tag_text_outside_the_card_does_not_count() {
    let card = Card::new("Offline banner", &["Feature"], Category::Mobile);
    let mut stub = board([chip("Design")]).with_element(
        chip("Feature")
            .on_page(CONTENT_PAGE)
            .with_style("padding-left", "12px")
            .with_style("padding-right", "12px"),
    );

    let err = generic_dispatcher()
        .dispatch(&card, &mut stub, &quick_env(), Strictness::Soft)
        .await
        .unwrap_err();

    assert!(matches!(err, E2eError::AssertionFailed(m) if m.starts_with("Missing tag \"Feature\"")));
}
