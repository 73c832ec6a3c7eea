//! Page objects for the fixture-backed flows

use chrono::Utc;

use crate::context::BrowserContext;
use crate::error::E2eResult;
use crate::locator::{Locator, Point};

/// Phone-sized viewport used for mobile navigation
pub const MOBILE_VIEWPORT: (u32, u32) = (375, 667);

pub struct LoginPage {
    pub email_input: Locator,
    pub password_input: Locator,
    pub submit_button: Locator,
    pub error_message: Locator,
    pub success_message: Locator,
}

impl LoginPage {
    pub fn new() -> Self {
        Self {
            email_input: Locator::css("input[type=\"email\"]"),
            password_input: Locator::css("input[type=\"password\"]"),
            submit_button: Locator::css("button[type=\"submit\"]"),
            error_message: Locator::css(".error-message"),
            success_message: Locator::css(".success-message"),
        }
    }

    pub async fn navigate(&self, ctx: &mut dyn BrowserContext) -> E2eResult<()> {
        ctx.navigate("/login").await
    }

    pub async fn login(&self, ctx: &mut dyn BrowserContext, email: &str, password: &str) -> E2eResult<()> {
        ctx.fill(&self.email_input, email).await?;
        ctx.fill(&self.password_input, password).await?;
        self.submit(ctx).await
    }

    /// Submit whatever the form currently holds
    pub async fn submit(&self, ctx: &mut dyn BrowserContext) -> E2eResult<()> {
        ctx.click(&self.submit_button, None).await
    }
}

impl Default for LoginPage {
    fn default() -> Self {
        Self::new()
    }
}

/// Form values for a new account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupData {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignupData {
    /// A test user with a timestamped, never-reused email address
    pub fn unique_test_user() -> Self {
        Self {
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: format!("test{}@example.com", Utc::now().timestamp_millis()),
            password: "Password123!".to_string(),
            confirm_password: "Password123!".to_string(),
        }
    }

    /// The same form with a confirmation that differs from the password
    pub fn with_mismatched_confirmation(mut self) -> Self {
        self.confirm_password = format!("{}?", self.password);
        self
    }
}

pub struct SignupPage {
    pub first_name_input: Locator,
    pub last_name_input: Locator,
    pub email_input: Locator,
    pub password_input: Locator,
    pub confirm_password_input: Locator,
    pub submit_button: Locator,
    pub error_message: Locator,
}

impl SignupPage {
    pub fn new() -> Self {
        Self {
            first_name_input: Locator::css("input[name=\"firstName\"]"),
            last_name_input: Locator::css("input[name=\"lastName\"]"),
            email_input: Locator::css("input[type=\"email\"]"),
            password_input: Locator::css("input[name=\"password\"]"),
            confirm_password_input: Locator::css("input[name=\"confirmPassword\"]"),
            submit_button: Locator::css("button[type=\"submit\"]"),
            error_message: Locator::css(".error-message"),
        }
    }

    pub async fn navigate(&self, ctx: &mut dyn BrowserContext) -> E2eResult<()> {
        ctx.navigate("/signup").await
    }

    pub async fn signup(&self, ctx: &mut dyn BrowserContext, data: &SignupData) -> E2eResult<()> {
        ctx.fill(&self.first_name_input, &data.first_name).await?;
        ctx.fill(&self.last_name_input, &data.last_name).await?;
        ctx.fill(&self.email_input, &data.email).await?;
        ctx.fill(&self.password_input, &data.password).await?;
        ctx.fill(&self.confirm_password_input, &data.confirm_password).await?;
        ctx.click(&self.submit_button, None).await
    }
}

impl Default for SignupPage {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MobileNavigation {
    pub hamburger_button: Locator,
    pub mobile_menu: Locator,
    pub close_button: Locator,
}

impl MobileNavigation {
    pub fn new() -> Self {
        Self {
            hamburger_button: Locator::css(".mobile-menu-toggle"),
            mobile_menu: Locator::css(".nav-menu"),
            close_button: Locator::css(".menu-close"),
        }
    }

    pub async fn set_mobile_viewport(&self, ctx: &mut dyn BrowserContext) -> E2eResult<()> {
        let (width, height) = MOBILE_VIEWPORT;
        ctx.set_viewport(width, height).await
    }

    pub async fn open_menu(&self, ctx: &mut dyn BrowserContext) -> E2eResult<()> {
        ctx.click(&self.hamburger_button, None).await
    }

    pub async fn close_menu(&self, ctx: &mut dyn BrowserContext) -> E2eResult<()> {
        ctx.click(&self.close_button, None).await
    }

    /// Follow one of the links inside the open menu
    pub async fn click_menu_item(&self, ctx: &mut dyn BrowserContext, label: &str) -> E2eResult<()> {
        ctx.click(&self.mobile_menu.get_by_text(label).first(), None).await
    }

    /// Click the page body away from the menu panel
    pub async fn click_outside_menu(&self, ctx: &mut dyn BrowserContext) -> E2eResult<()> {
        ctx.click(&Locator::css("body"), Some(Point::new(50.0, 50.0))).await
    }

    pub async fn is_menu_visible(&self, ctx: &mut dyn BrowserContext) -> E2eResult<bool> {
        ctx.is_visible(&self.mobile_menu).await
    }
}

impl Default for MobileNavigation {
    fn default() -> Self {
        Self::new()
    }
}

/// Form values for one payment attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentData {
    pub card_number: String,
    pub expiry_date: String,
    pub cvv: String,
    pub amount: u64,
}

impl PaymentData {
    /// A payment with fixed expiry and CVV
    pub fn new(card_number: &str, amount: u64) -> Self {
        Self {
            card_number: card_number.to_string(),
            expiry_date: "12/25".to_string(),
            cvv: "123".to_string(),
            amount,
        }
    }
}

pub struct PaymentPage {
    pub card_number_input: Locator,
    pub expiry_date_input: Locator,
    pub cvv_input: Locator,
    pub amount_input: Locator,
    pub submit_button: Locator,
    pub status: Locator,
}

impl PaymentPage {
    pub fn new() -> Self {
        Self {
            card_number_input: Locator::css("input[name=\"cardNumber\"]"),
            expiry_date_input: Locator::css("input[name=\"expiryDate\"]"),
            cvv_input: Locator::css("input[name=\"cvv\"]"),
            amount_input: Locator::css("input[name=\"amount\"]"),
            submit_button: Locator::css("button[type=\"submit\"]"),
            status: Locator::css(".payment-status"),
        }
    }

    pub async fn navigate(&self, ctx: &mut dyn BrowserContext) -> E2eResult<()> {
        ctx.navigate("/payment").await
    }

    pub async fn process_payment(&self, ctx: &mut dyn BrowserContext, data: &PaymentData) -> E2eResult<()> {
        ctx.fill(&self.card_number_input, &data.card_number).await?;
        ctx.fill(&self.expiry_date_input, &data.expiry_date).await?;
        ctx.fill(&self.cvv_input, &data.cvv).await?;
        ctx.fill(&self.amount_input, &data.amount.to_string()).await?;
        ctx.click(&self.submit_button, None).await
    }
}

impl Default for PaymentPage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{Effect, StubBrowser, StubElement, StubCall};

    #[test]
    fn test_signup_emails_are_timestamped() {
        let data = SignupData::unique_test_user();
        assert!(data.email.starts_with("test"));
        assert!(data.email.ends_with("@example.com"));
        assert_eq!(data.password, data.confirm_password);
    }

    #[tokio::test]
    async fn test_login_fills_then_submits() {
        let page = LoginPage::new();
        let mut stub = StubBrowser::new("http://app.test")
            .with_element(StubElement::css("input[type=\"email\"]"))
            .with_element(StubElement::css("input[type=\"password\"]"))
            .with_element(StubElement::css("button[type=\"submit\"]"));
        page.login(&mut stub, "user@example.com", "secret").await.unwrap();

        assert_eq!(stub.value_of(&page.email_input), Some("user@example.com"));
        assert_eq!(stub.value_of(&page.password_input), Some("secret"));
        assert!(matches!(stub.calls().last(), Some(StubCall::Click(l)) if *l == page.submit_button));
    }

    #[tokio::test]
    async fn test_mobile_menu_toggle() {
        let nav = MobileNavigation::new();
        let mut stub = StubBrowser::new("http://app.test")
            .with_element(StubElement::css(".nav-menu").hidden())
            .with_element(StubElement::css(".mobile-menu-toggle").on_click(Effect::Show(nav.mobile_menu.clone())))
            .with_element(StubElement::css(".menu-close").on_click(Effect::Hide(nav.mobile_menu.clone())));

        nav.set_mobile_viewport(&mut stub).await.unwrap();
        assert_eq!(stub.viewport(), Some((375, 667)));
        nav.open_menu(&mut stub).await.unwrap();
        assert!(nav.is_menu_visible(&mut stub).await.unwrap());
        nav.close_menu(&mut stub).await.unwrap();
        assert!(!nav.is_menu_visible(&mut stub).await.unwrap());
    }

    #[test]
    fn test_mismatched_confirmation_differs_from_password() {
        let data = SignupData::unique_test_user().with_mismatched_confirmation();
        assert_ne!(data.password, data.confirm_password);
        assert!(data.confirm_password.starts_with(&data.password));
    }

    #[tokio::test]
    async fn test_menu_items_are_found_inside_the_menu() {
        let nav = MobileNavigation::new();
        let mut stub = StubBrowser::new("http://app.test")
            .with_element(StubElement::text("Home").with_selector("a"))
            .with_element(
                StubElement::css(".nav-menu")
                    .with_child(StubElement::text("Home").on_click(Effect::Hide(nav.mobile_menu.clone()))),
            );

        nav.click_menu_item(&mut stub, "Home").await.unwrap();
        assert!(!nav.is_menu_visible(&mut stub).await.unwrap());
    }

    #[tokio::test]
    async fn test_payment_amount_is_filled_as_text() {
        let page = PaymentPage::new();
        let mut stub = StubBrowser::new("http://app.test")
            .with_element(StubElement::css("input[name=\"cardNumber\"]"))
            .with_element(StubElement::css("input[name=\"expiryDate\"]"))
            .with_element(StubElement::css("input[name=\"cvv\"]"))
            .with_element(StubElement::css("input[name=\"amount\"]"))
            .with_element(StubElement::css("button[type=\"submit\"]"));
        page.process_payment(&mut stub, &PaymentData::new("4242424242424242", 1000))
            .await
            .unwrap();
        assert_eq!(stub.value_of(&page.amount_input), Some("1000"));
        assert_eq!(stub.value_of(&page.expiry_date_input), Some("12/25"));
    }
}
