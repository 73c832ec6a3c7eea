//! Fixture serving through route interception
//!
//! Fixtures stand in for the application backend: every request whose URL
//! matches the route glob is fulfilled with literal content instead of going
//! to the network. Routes must be registered before navigating; re-registering
//! a pattern shadows the earlier registration.

use regex::Regex;
use tracing::debug;

use crate::context::{BrowserContext, FixtureRoute};
use crate::error::E2eResult;

/// Serve `content` as `text/html` for every URL ending in `route_path`
pub async fn serve(ctx: &mut dyn BrowserContext, route_path: &str, content: &str) -> E2eResult<()> {
    let route = FixtureRoute {
        pattern: format!("**{}", route_path),
        status: 200,
        content_type: "text/html".to_string(),
        body: content.to_string(),
    };
    debug!("Serving HTML fixture for {}", route.pattern);
    ctx.intercept_route(route).await
}

/// Serve a JSON body with an explicit status for every URL matching `pattern`
pub async fn serve_json(
    ctx: &mut dyn BrowserContext,
    pattern: &str,
    status: u16,
    body: &serde_json::Value,
) -> E2eResult<()> {
    let route = FixtureRoute {
        pattern: pattern.to_string(),
        status,
        content_type: "application/json".to_string(),
        body: serde_json::to_string(body)?,
    };
    debug!("Serving JSON fixture for {} ({})", route.pattern, status);
    ctx.intercept_route(route).await
}

/// Compile a route glob into an anchored regex
pub fn glob_to_regex(glob: &str) -> E2eResult<Regex> {
    let mut source = String::from("^");
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                source.push_str(".*");
            }
            '*' => source.push_str("[^/]*"),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');
    Ok(Regex::new(&source)?)
}

/// Whether `url` is matched by the route glob
pub fn route_matches(glob: &str, url: &str) -> E2eResult<bool> {
    Ok(glob_to_regex(glob)?.is_match(url))
}

/// Password the login fixture always rejects as invalid
pub const REJECTED_PASSWORD: &str = "wrongpassword";

/// HTML documents served by the built-in scenarios
pub mod html {
    /// Escape text for element content and double-quoted attributes
    pub fn escape(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                other => out.push(other),
            }
        }
        out
    }

    const CARD_STYLES: &str = r#"<style>
    body { font-family: Inter, system-ui, sans-serif; }
    [data-testid="card"] { border: 1px solid #e5e7eb; border-radius: 8px; padding: 16px; max-width: 360px; }
    .tag { display: inline-block; margin: 0 4px 8px 0; padding: 2px 10px; border-radius: 9999px;
           font-size: 12px; font-weight: 500; color: #374151; background-color: #f3f4f6; }
    .tag[data-tag="High Priority"] { font-weight: 700; color: #b45309; background-color: #fef3c7; }
    .tag[data-tag="Bug"] { color: #ef4444; background-color: #fee2e2; }
    .tag[data-tag="Design"] { color: #6d28d9; background-color: #ede9fe; }
    .tag[data-tag="Feature"] { padding: 2px 12px; }
  </style>"#;

    /// Minimal card rendering used when a card has no named scenario.
    ///
    /// Tag chips precede the title so the first text match for a tag inside
    /// the card is the chip itself, not a title that happens to contain it.
    pub fn card(title: &str, tags: &[String]) -> String {
        let chips: String = tags
            .iter()
            .map(|t| {
                let t = escape(t);
                format!(r#"<span class="tag" data-tag="{t}">{t}</span>"#)
            })
            .collect();
        format!(
            r#"<!doctype html><html><head>{styles}</head><body><article data-testid="card"><div class="tags">{chips}</div><h2>{title}</h2></article></body></html>"#,
            styles = CARD_STYLES,
            chips = chips,
            title = escape(title),
        )
    }

    /// Login form. Empty fields and the rejected password show an error
    /// instead of redirecting to the dashboard.
    pub fn login() -> String {
        r#"<!doctype html><html><body>
  <form id="loginForm">
    <input type="email" />
    <input type="password" />
    <button type="submit">Login</button>
    <div class="error-message" style="display:none"></div>
    <div class="success-message" style="display:none"></div>
  </form>
  <script>
    const form = document.getElementById('loginForm');
    const email = form.querySelector('input[type="email"]');
    const password = form.querySelector('input[type="password"]');
    const error = form.querySelector('.error-message');
    const fail = (message) => {
      error.textContent = message;
      error.style.display = 'block';
    };
    form.addEventListener('submit', (e) => {
      e.preventDefault();
      email.setAttribute('aria-invalid', String(!email.value));
      password.setAttribute('aria-invalid', String(!password.value));
      if (!email.value || !password.value) return fail('Email and password are required');
      if (password.value === 'wrongpassword') {
        password.value = '';
        return fail('Invalid credentials');
      }
      location.href = '/dashboard';
    });
    if (sessionStorage.getItem('accountCreated')) {
      const note = form.querySelector('.success-message');
      note.textContent = 'Account created';
      note.style.display = 'block';
    }
  </script>
  </body></html>"#
            .to_string()
    }

    pub fn dashboard() -> String {
        r#"<!doctype html><html><body><h1>Dashboard</h1><div class="welcome-message">Welcome</div></body></html>"#
            .to_string()
    }

    pub fn signup() -> String {
        r#"<!doctype html><html><body>
  <form id="signupForm">
    <input name="firstName" />
    <input name="lastName" />
    <input type="email" />
    <input name="password" />
    <input name="confirmPassword" />
    <button type="submit">Sign up</button>
    <div class="error-message" style="display:none"></div>
  </form>
  <script>
    const form = document.getElementById('signupForm');
    form.addEventListener('submit', (e) => {
      e.preventDefault();
      const password = form.querySelector('input[name="password"]').value;
      const confirm = form.querySelector('input[name="confirmPassword"]').value;
      if (password !== confirm) {
        const error = form.querySelector('.error-message');
        error.textContent = 'Passwords do not match';
        error.style.display = 'block';
        return;
      }
      sessionStorage.setItem('accountCreated', '1');
      setTimeout(() => location.href = '/login', 10);
    });
  </script>
  </body></html>"#
            .to_string()
    }

    pub fn mobile_menu() -> String {
        r##"<!doctype html><html><head>
  <style>
    .nav-menu { display: none; position: fixed; top: 0; right: 0; bottom: 0; width: 240px; background: #eee; }
  </style>
  </head><body>
  <button aria-label="Menu" class="mobile-menu-toggle">&#9776;</button>
  <div class="nav-menu">
    <button aria-label="Close menu" class="menu-close">&times;</button>
    <a href="#">Home</a>
    <a href="#">Projects</a>
  </div>
  <script>
    const menu = document.querySelector('.nav-menu');
    const hide = () => { menu.style.display = 'none'; };
    document.querySelector('.mobile-menu-toggle').addEventListener('click', (e) => {
      e.stopPropagation();
      menu.style.display = 'block';
    });
    document.querySelector('.menu-close').addEventListener('click', (e) => {
      e.stopPropagation();
      hide();
    });
    menu.querySelectorAll('a').forEach((item) => item.addEventListener('click', hide));
    document.addEventListener('click', (e) => {
      if (!menu.contains(e.target)) hide();
    });
  </script>
  </body></html>"##
            .to_string()
    }

    pub fn design_system() -> String {
        r#"<!doctype html><html><head>
  <style>
    body { font-family: Inter, system-ui, sans-serif; }
    h1 { font-size: 36px; }
    button.primary { background-color: #3B82F6; color: white; }
  </style>
  </head><body>
    <h1>Heading</h1>
    <button class="primary">Primary</button>
  </body></html>"#
            .to_string()
    }

    pub fn payment() -> String {
        r#"<!doctype html><html><body>
  <form id="paymentForm" onsubmit="event.preventDefault(); fetch('/api/payments/process', { method: 'POST' }).then(r => r.json()).then(j => { document.body.insertAdjacentHTML('beforeend', '<div class=&quot;payment-status&quot;>' + j.status + '</div>') })">
    <input name="cardNumber" />
    <input name="expiryDate" />
    <input name="cvv" />
    <input name="amount" />
    <button type="submit">Pay</button>
  </form>
  </body></html>"#
            .to_string()
    }

    pub fn docs() -> String {
        r#"<!doctype html><html><body>
  <h1>API Reference</h1>
  <div class="endpoint">GET /api/users</div>
  <div class="endpoint">POST /api/users</div>
  </body></html>"#
            .to_string()
    }

    pub fn push() -> String {
        r#"<!doctype html><html><body>
  <button id="enablePush" onclick="Notification.requestPermission().then(() => { document.body.insertAdjacentHTML('beforeend', '<div>Notifications enabled</div>') })">Enable</button>
  </body></html>"#
            .to_string()
    }

    pub fn offline() -> String {
        r#"<!doctype html><html><body>
  <div id="status"></div>
  <script>
    document.getElementById('status').textContent = navigator.onLine ? 'online' : 'offline';
  </script>
  </body></html>"#
            .to_string()
    }

    pub fn icons() -> String {
        r#"<!doctype html><html><head>
  <link rel="icon" sizes="16x16" href="/favicon-16x16.png">
  <link rel="icon" sizes="32x32" href="/favicon-32x32.png">
  <link rel="apple-touch-icon" sizes="180x180" href="/apple-touch-icon.png">
  </head><body></body></html>"#
            .to_string()
    }

    pub fn calendar() -> String {
        r#"<!doctype html><html><body>
  <h1>Next Month Plan</h1>
  <table id="calendar"><tbody>
  <tr><td>Week 1</td><td>Post A</td></tr>
  <tr><td>Week 2</td><td>Post B</td></tr>
  <tr><td>Week 3</td><td>Post C</td></tr>
  <tr><td>Week 4</td><td>Post D</td></tr>
  </tbody></table>
  </body></html>"#
            .to_string()
    }

    pub fn email() -> String {
        r##"<!doctype html><html><body>
  <h1>Q2 Campaign</h1>
  <a href="#" class="cta">CTA</a>
  </body></html>"##
            .to_string()
    }

    pub fn landing() -> String {
        r#"<!doctype html><html><body>
  <div>Approved</div>
  <div>No lorem ipsum</div>
  </body></html>"#
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_star_crosses_path_segments() {
        assert!(route_matches("**/login", "http://localhost:3000/login").unwrap());
        assert!(route_matches("**/api/payments/process", "https://app.test/v1/api/payments/process").unwrap());
        assert!(!route_matches("**/login", "http://localhost:3000/login/help").unwrap());
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        assert!(route_matches("http://app.test/*", "http://app.test/dashboard").unwrap());
        assert!(!route_matches("http://app.test/*", "http://app.test/a/b").unwrap());
    }

    #[test]
    fn test_glob_treats_regex_metacharacters_literally() {
        assert!(route_matches("**/search?q=1", "http://app.test/search?q=1").unwrap());
        assert!(!route_matches("**/a.b", "http://app.test/axb").unwrap());
    }

    #[test]
    fn test_card_markup_puts_tags_before_title() {
        let markup = html::card("Design system updates", &["Design".to_string()]);
        let chip = markup.find(r#"data-tag="Design""#).unwrap();
        let title = markup.find("<h2>").unwrap();
        assert!(chip < title);
        assert!(markup.contains(r#"data-testid="card""#));
    }

    #[test]
    fn test_login_fixture_rejects_the_rejected_password() {
        let page = html::login();
        assert!(page.contains(&format!("'{}'", REJECTED_PASSWORD)));
        assert!(page.contains("Invalid credentials"));
        assert!(page.contains("Email and password are required"));
    }

    #[test]
    fn test_pages_with_hash_links_keep_their_markup() {
        let menu = html::mobile_menu();
        assert!(menu.contains(r##"<a href="#">Home</a>"##));
        assert!(menu.trim_end().ends_with("</html>"));
        let email = html::email();
        assert!(email.contains(r##"href="#""##));
        assert!(email.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_card_markup_escapes_text() {
        let markup = html::card("<script>", &["R&D".to_string()]);
        assert!(markup.contains("&lt;script&gt;"));
        assert!(markup.contains(r#"data-tag="R&amp;D""#));
        assert!(!markup.contains("<script>"));
    }
}
