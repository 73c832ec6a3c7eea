//! Named scenarios keyed by card title
//!
//! A scenario replaces the generic tag checks for its card with a scripted
//! user flow against fixtures. Every assertion inside a scenario is hard.

use std::collections::HashMap;
use std::fmt;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::card::DesignTokens;
use crate::config::Credentials;
use crate::context::BrowserContext;
use crate::error::{E2eError, E2eResult};
use crate::expect::Expect;
use crate::fixtures::{html, serve, serve_json, REJECTED_PASSWORD};
use crate::locator::Locator;
use crate::pages::{LoginPage, MobileNavigation, PaymentData, PaymentPage, SignupData, SignupPage};

/// Card number the payment fixture approves
pub const APPROVED_CARD: &str = "4242424242424242";

/// Card number the payment fixture declines
pub const DECLINED_CARD: &str = "4000000000000002";

/// Grants notification permission without a prompt
pub const NOTIFICATION_MOCK: &str =
    "window.Notification = { requestPermission: () => Promise.resolve('granted') };";

/// Inputs shared by every scenario in a run
#[derive(Debug, Clone, Default)]
pub struct ScenarioEnv {
    pub credentials: Option<Credentials>,
    pub design: DesignTokens,
    pub expect: Expect,
}

/// A scenario procedure: (context, environment)
pub type ScenarioFn = for<'a> fn(&'a mut dyn BrowserContext, &'a ScenarioEnv) -> BoxFuture<'a, E2eResult<()>>;

/// Product area a scenario exercises, used to select runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureArea {
    Auth,
    Navigation,
    Design,
    Payment,
    Docs,
    Notifications,
    Offline,
    Icons,
    Marketing,
}

impl fmt::Display for FeatureArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeatureArea::Auth => "auth",
            FeatureArea::Navigation => "navigation",
            FeatureArea::Design => "design",
            FeatureArea::Payment => "payment",
            FeatureArea::Docs => "docs",
            FeatureArea::Notifications => "notifications",
            FeatureArea::Offline => "offline",
            FeatureArea::Icons => "icons",
            FeatureArea::Marketing => "marketing",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy)]
pub struct Scenario {
    pub area: FeatureArea,
    pub run: ScenarioFn,
    /// Logs in with `USERNAME`/`PASSWORD`
    pub needs_credentials: bool,
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("area", &self.area)
            .field("needs_credentials", &self.needs_credentials)
            .finish_non_exhaustive()
    }
}

/// Immutable lookup from card title to scenario
#[derive(Debug, Clone, Default)]
pub struct ScenarioRegistry {
    scenarios: HashMap<String, Scenario>,
}

impl ScenarioRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every built-in scenario, keyed by card title or description
    pub fn builtin() -> Self {
        use FeatureArea::*;
        Self::empty()
            .with_credentialed_scenario("Implement user authentication", Auth, implement_user_authentication)
            .with_scenario("Add login and signup functionality", Auth, add_login_and_signup)
            .with_scenario("Fix navigation bug", Navigation, fix_navigation_bug)
            .with_scenario("Menu does not close on mobile", Navigation, menu_closes_on_outside_click)
            .with_scenario("Design system updates", Design, design_system_updates)
            .with_scenario("Update color palette and typography", Design, color_palette_and_typography)
            .with_scenario("API integration", Payment, api_integration)
            .with_scenario("Connect to payment gateway", Payment, connect_to_payment_gateway)
            .with_scenario("Update documentation", Docs, update_documentation)
            .with_scenario("Add API endpoints documentation", Docs, api_endpoints_documentation)
            .with_scenario("Push notification system", Notifications, push_notifications)
            .with_scenario(
                "Implement push notifications for iOS and Android",
                Notifications,
                push_notifications,
            )
            .with_scenario("Offline mode", Offline, offline_mode)
            .with_scenario("Enable offline data synchronization", Offline, offline_data_sync)
            .with_scenario("App icon design", Icons, app_icon_design)
            .with_scenario("Create app icons for all required sizes", Icons, app_icons_all_sizes)
            .with_scenario("Social media calendar", Marketing, social_media_calendar)
            .with_scenario("Plan content for next month", Marketing, plan_next_month)
            .with_scenario("Email campaign", Marketing, email_campaign)
            .with_scenario("Design and implement Q2 email campaign", Marketing, q2_email_campaign)
            .with_scenario("Landing page copy", Marketing, landing_page_copy)
            .with_scenario("Review and approve landing page content", Marketing, approve_landing_page)
    }

    /// Add or replace the scenario for a title
    pub fn with_scenario(self, title: impl Into<String>, area: FeatureArea, run: ScenarioFn) -> Self {
        self.insert(title.into(), area, run, false)
    }

    /// Add a scenario that cannot run without credentials
    pub fn with_credentialed_scenario(self, title: impl Into<String>, area: FeatureArea, run: ScenarioFn) -> Self {
        self.insert(title.into(), area, run, true)
    }

    fn insert(mut self, title: String, area: FeatureArea, run: ScenarioFn, needs_credentials: bool) -> Self {
        self.scenarios.insert(
            title,
            Scenario {
                area,
                run,
                needs_credentials,
            },
        );
        self
    }

    /// Exact-title lookup
    pub fn get(&self, title: &str) -> Option<&Scenario> {
        self.scenarios.get(title)
    }

    pub fn contains(&self, title: &str) -> bool {
        self.scenarios.contains_key(title)
    }

    pub fn area_of(&self, title: &str) -> Option<FeatureArea> {
        self.get(title).map(|s| s.area)
    }

    pub fn needs_credentials(&self, title: &str) -> bool {
        self.get(title).is_some_and(|s| s.needs_credentials)
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.scenarios.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

fn implement_user_authentication<'a>(
    ctx: &'a mut dyn BrowserContext,
    env: &'a ScenarioEnv,
) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(async move {
        let credentials = env
            .credentials
            .as_ref()
            .ok_or_else(|| E2eError::MissingEnv("USERNAME".to_string()))?;
        serve(ctx, "/login", &html::login()).await?;
        serve(ctx, "/dashboard", &html::dashboard()).await?;
        let login = LoginPage::new();
        login.navigate(ctx).await?;

        login.submit(ctx).await?;
        env.expect.visible(ctx, &login.error_message).await?;
        env.expect.contains_text(ctx, &login.error_message, "required").await?;
        env.expect.url_matches(ctx, r"/login$").await?;

        login.login(ctx, &credentials.username, REJECTED_PASSWORD).await?;
        env.expect.contains_text(ctx, &login.error_message, "Invalid credentials").await?;
        env.expect.url_matches(ctx, r"/login$").await?;

        info!("Logging in as {}", credentials.username);
        login.login(ctx, &credentials.username, &credentials.password).await?;
        env.expect.url_matches(ctx, r"/dashboard$").await?;
        env.expect.visible(ctx, &Locator::css(".welcome-message")).await
    })
}

fn add_login_and_signup<'a>(ctx: &'a mut dyn BrowserContext, env: &'a ScenarioEnv) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(async move {
        serve(ctx, "/signup", &html::signup()).await?;
        serve(ctx, "/login", &html::login()).await?;
        let signup = SignupPage::new();
        let user = SignupData::unique_test_user();
        signup.navigate(ctx).await?;

        signup.signup(ctx, &user.clone().with_mismatched_confirmation()).await?;
        env.expect
            .contains_text(ctx, &signup.error_message, "Passwords do not match")
            .await?;
        env.expect.url_matches(ctx, r"/signup$").await?;

        signup.signup(ctx, &user).await?;
        env.expect.url_matches(ctx, r"/login$").await?;
        let login = LoginPage::new();
        env.expect.contains_text(ctx, &login.success_message, "Account created").await
    })
}

async fn open_mobile_menu(ctx: &mut dyn BrowserContext, env: &ScenarioEnv, nav: &MobileNavigation) -> E2eResult<()> {
    serve(ctx, "/", &html::mobile_menu()).await?;
    nav.set_mobile_viewport(ctx).await?;
    ctx.navigate("/").await?;
    nav.open_menu(ctx).await?;
    env.expect.visible(ctx, &nav.mobile_menu).await
}

fn fix_navigation_bug<'a>(ctx: &'a mut dyn BrowserContext, env: &'a ScenarioEnv) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(async move {
        let nav = MobileNavigation::new();
        open_mobile_menu(ctx, env, &nav).await?;
        nav.click_menu_item(ctx, "Home").await?;
        env.expect.hidden(ctx, &nav.mobile_menu).await?;

        nav.open_menu(ctx).await?;
        env.expect.visible(ctx, &nav.mobile_menu).await?;
        nav.close_menu(ctx).await?;
        env.expect.hidden(ctx, &nav.mobile_menu).await
    })
}

fn menu_closes_on_outside_click<'a>(
    ctx: &'a mut dyn BrowserContext,
    env: &'a ScenarioEnv,
) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(async move {
        let nav = MobileNavigation::new();
        open_mobile_menu(ctx, env, &nav).await?;
        nav.click_outside_menu(ctx).await?;
        env.expect.hidden(ctx, &nav.mobile_menu).await
    })
}

fn design_system_updates<'a>(ctx: &'a mut dyn BrowserContext, env: &'a ScenarioEnv) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(async move {
        serve(ctx, "/", &html::design_system()).await?;
        ctx.navigate("/").await?;
        env.expect
            .css(
                ctx,
                &Locator::css("button.primary"),
                "background-color",
                &env.design.primary_button_color,
            )
            .await
    })
}

fn color_palette_and_typography<'a>(
    ctx: &'a mut dyn BrowserContext,
    env: &'a ScenarioEnv,
) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(async move {
        serve(ctx, "/", &html::design_system()).await?;
        ctx.navigate("/").await?;
        env.expect
            .css(ctx, &Locator::css("body"), "font-family", &env.design.body_font_family)
            .await?;
        env.expect
            .css(ctx, &Locator::css("h1"), "font-size", &env.design.h1_font_size)
            .await
    })
}

/// Submit a payment against the JSON fixture and wait for the status text
async fn run_payment(ctx: &mut dyn BrowserContext, env: &ScenarioEnv, data: PaymentData) -> E2eResult<()> {
    let declined = data.card_number == DECLINED_CARD;
    let (status, expected) = if declined { (400, "declined") } else { (200, "succeeded") };
    serve(ctx, "/payment", &html::payment()).await?;
    serve_json(ctx, "**/api/payments/process", status, &json!({ "status": expected })).await?;
    let payment = PaymentPage::new();
    payment.navigate(ctx).await?;
    payment.process_payment(ctx, &data).await?;
    env.expect.visible(ctx, &payment.status).await?;
    env.expect.contains_text(ctx, &payment.status, expected).await
}

fn api_integration<'a>(ctx: &'a mut dyn BrowserContext, env: &'a ScenarioEnv) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(run_payment(ctx, env, PaymentData::new(APPROVED_CARD, 1000)))
}

fn connect_to_payment_gateway<'a>(
    ctx: &'a mut dyn BrowserContext,
    env: &'a ScenarioEnv,
) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(run_payment(ctx, env, PaymentData::new(DECLINED_CARD, 2000)))
}

async fn docs_show(ctx: &mut dyn BrowserContext, env: &ScenarioEnv, endpoint: &str) -> E2eResult<()> {
    serve(ctx, "/api-docs", &html::docs()).await?;
    ctx.navigate("/api-docs").await?;
    env.expect.visible(ctx, &Locator::text(endpoint)).await
}

fn update_documentation<'a>(ctx: &'a mut dyn BrowserContext, env: &'a ScenarioEnv) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(docs_show(ctx, env, "GET /api/users"))
}

fn api_endpoints_documentation<'a>(
    ctx: &'a mut dyn BrowserContext,
    env: &'a ScenarioEnv,
) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(docs_show(ctx, env, "POST /api/users"))
}

fn push_notifications<'a>(ctx: &'a mut dyn BrowserContext, env: &'a ScenarioEnv) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(async move {
        serve(ctx, "/", &html::push()).await?;
        ctx.add_init_script(NOTIFICATION_MOCK).await?;
        ctx.navigate("/").await?;
        ctx.click(&Locator::css("button#enablePush"), None).await?;
        env.expect.visible(ctx, &Locator::pattern("notifications enabled")).await
    })
}

/// Reload while offline and expect the page to say so
async fn reload_offline(ctx: &mut dyn BrowserContext, env: &ScenarioEnv) -> E2eResult<()> {
    ctx.set_offline(true).await?;
    ctx.reload().await?;
    env.expect.visible(ctx, &Locator::pattern("offline")).await?;
    ctx.set_offline(false).await
}

fn offline_mode<'a>(ctx: &'a mut dyn BrowserContext, env: &'a ScenarioEnv) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(async move {
        serve(ctx, "/", &html::offline()).await?;
        ctx.navigate("/").await?;
        env.expect.visible(ctx, &Locator::pattern("online")).await?;
        reload_offline(ctx, env).await
    })
}

fn offline_data_sync<'a>(ctx: &'a mut dyn BrowserContext, env: &'a ScenarioEnv) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(async move {
        serve(ctx, "/", &html::offline()).await?;
        ctx.navigate("/").await?;
        reload_offline(ctx, env).await
    })
}

/// Selector for the icon link declaring `size`
fn icon_selector(size: &str) -> String {
    if size == "180x180" {
        format!("link[rel=\"apple-touch-icon\"][sizes=\"{}\"]", size)
    } else {
        format!("link[rel=\"icon\"][sizes=\"{}\"]", size)
    }
}

async fn expect_icons(ctx: &mut dyn BrowserContext, env: &ScenarioEnv, sizes: &[&str]) -> E2eResult<()> {
    serve(ctx, "/", &html::icons()).await?;
    ctx.navigate("/").await?;
    for size in sizes {
        env.expect.count(ctx, &Locator::css(icon_selector(size)), 1).await?;
    }
    Ok(())
}

fn app_icon_design<'a>(ctx: &'a mut dyn BrowserContext, env: &'a ScenarioEnv) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(expect_icons(ctx, env, &["32x32", "180x180"]))
}

fn app_icons_all_sizes<'a>(ctx: &'a mut dyn BrowserContext, env: &'a ScenarioEnv) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(expect_icons(ctx, env, &["16x16", "32x32", "180x180"]))
}

fn social_media_calendar<'a>(ctx: &'a mut dyn BrowserContext, env: &'a ScenarioEnv) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(async move {
        serve(ctx, "/calendar", &html::calendar()).await?;
        ctx.navigate("/calendar").await?;
        env.expect.count(ctx, &Locator::css("table#calendar tbody tr"), 4).await
    })
}

/// Serve a marketing page and expect a text pattern on it
async fn page_shows(
    ctx: &mut dyn BrowserContext,
    env: &ScenarioEnv,
    route: &str,
    content: String,
    pattern: &str,
) -> E2eResult<()> {
    serve(ctx, route, &content).await?;
    ctx.navigate(route).await?;
    env.expect.visible(ctx, &Locator::pattern(pattern)).await
}

fn plan_next_month<'a>(ctx: &'a mut dyn BrowserContext, env: &'a ScenarioEnv) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(page_shows(ctx, env, "/calendar", html::calendar(), "next month plan"))
}

fn email_campaign<'a>(ctx: &'a mut dyn BrowserContext, env: &'a ScenarioEnv) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(page_shows(ctx, env, "/email-preview", html::email(), "CTA"))
}

fn q2_email_campaign<'a>(ctx: &'a mut dyn BrowserContext, env: &'a ScenarioEnv) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(page_shows(ctx, env, "/email-preview", html::email(), "Q2"))
}

fn landing_page_copy<'a>(ctx: &'a mut dyn BrowserContext, env: &'a ScenarioEnv) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(page_shows(ctx, env, "/landing", html::landing(), "no lorem ipsum"))
}

fn approve_landing_page<'a>(ctx: &'a mut dyn BrowserContext, env: &'a ScenarioEnv) -> BoxFuture<'a, E2eResult<()>> {
    Box::pin(page_shows(ctx, env, "/landing", html::landing(), "approved"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalogue() {
        let registry = ScenarioRegistry::builtin();
        assert_eq!(registry.len(), 22);
        assert!(registry.contains("API integration"));
        assert!(!registry.contains("api integration"));
        assert_eq!(registry.area_of("Offline mode"), Some(FeatureArea::Offline));
        assert_eq!(registry.area_of("Email campaign"), Some(FeatureArea::Marketing));
        assert_eq!(registry.area_of("Checkout button misaligned"), None);
    }

    #[test]
    fn test_icon_selectors() {
        assert_eq!(icon_selector("16x16"), r#"link[rel="icon"][sizes="16x16"]"#);
        assert_eq!(icon_selector("180x180"), r#"link[rel="apple-touch-icon"][sizes="180x180"]"#);
    }

    #[test]
    fn test_feature_area_names() {
        assert_eq!(FeatureArea::Notifications.to_string(), "notifications");
        assert_eq!(serde_json::to_string(&FeatureArea::Auth).unwrap(), "\"auth\"");
    }
}
