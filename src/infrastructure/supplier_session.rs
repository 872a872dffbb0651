//! Authenticated session against the wholesale supplier portal
//!
//! Owns a single [`BrowserSession`] and performs form login: the login form
//! and its fields are located through ordered selector fallbacks (the remote
//! markup is not ours), hidden inputs are carried over, and success is
//! decided by a heuristic check for account vocabulary on the resulting
//! page. All failures surface as `SyncError::Authentication`, which is fatal
//! to a run but never crashes the process.

use scraper::{Html, Selector};
use tracing::{info, warn};

use crate::domain::error::{SyncError, SyncResult};
use crate::infrastructure::browser::BrowserSession;
use crate::infrastructure::config::SupplierConfig;
use crate::infrastructure::extractor::resolve_url;

const FORM_SELECTORS: &[&str] = &[
    "form#login",
    "form#customer_login",
    "form[action*='login']",
    "form[action*='account']",
    "form",
];

const USERNAME_SELECTORS: &[&str] = &[
    "input[name='customer[email]']",
    "input[type='email']",
    "input[name='email']",
    "input[name='username']",
];

const PASSWORD_SELECTORS: &[&str] = &["input[type='password']", "input[name='password']"];

/// Vocabulary that marks a page as belonging to a signed-in account.
const AUTHENTICATED_VOCABULARY: &[&str] = &[
    "logout",
    "log out",
    "sign out",
    "my account",
    "your orders",
    "order history",
];

/// A login form discovered on the supplier's login page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub action: Option<String>,
    pub username_field: String,
    pub password_field: String,
    /// Hidden inputs carried over verbatim (CSRF tokens and the like).
    pub hidden_fields: Vec<(String, String)>,
}

/// Locate a usable login form, trying form candidates in order and keeping
/// the first one that exposes both a username and a password input.
pub fn find_login_form(html: &str) -> Option<LoginForm> {
    let document = Html::parse_document(html);

    for form_selector in FORM_SELECTORS {
        let Ok(parsed) = Selector::parse(form_selector) else {
            continue;
        };
        for form in document.select(&parsed) {
            let username_field = first_input_name(&form, USERNAME_SELECTORS);
            let password_field = first_input_name(&form, PASSWORD_SELECTORS);
            let (Some(username_field), Some(password_field)) = (username_field, password_field)
            else {
                continue;
            };

            let hidden_selector = Selector::parse("input[type='hidden']").ok()?;
            let hidden_fields = form
                .select(&hidden_selector)
                .filter_map(|input| {
                    let name = input.value().attr("name")?;
                    let value = input.value().attr("value").unwrap_or_default();
                    Some((name.to_string(), value.to_string()))
                })
                .collect();

            return Some(LoginForm {
                action: form.value().attr("action").map(String::from),
                username_field,
                password_field,
                hidden_fields,
            });
        }
    }
    None
}

/// Heuristic: does this page read like a signed-in account page?
pub fn looks_authenticated(html: &str) -> bool {
    let text = Html::parse_document(html)
        .root_element()
        .text()
        .collect::<String>()
        .to_lowercase();
    AUTHENTICATED_VOCABULARY.iter().any(|word| text.contains(word))
}

fn first_input_name(form: &scraper::ElementRef, selectors: &[&str]) -> Option<String> {
    for selector in selectors {
        if let Ok(parsed) = Selector::parse(selector) {
            if let Some(input) = form.select(&parsed).next() {
                if let Some(name) = input.value().attr("name") {
                    return Some(name.to_string());
                }
            }
        }
    }
    None
}

/// Owns the browser session and its authenticated state for one sync run.
pub struct SessionManager {
    browser: Box<dyn BrowserSession>,
    supplier: SupplierConfig,
    authenticated: bool,
}

impl SessionManager {
    pub fn new(browser: Box<dyn BrowserSession>, supplier: SupplierConfig) -> Self {
        Self {
            browser,
            supplier,
            authenticated: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Log in to the supplier portal if not already authenticated.
    pub async fn authenticate(&mut self) -> SyncResult<()> {
        if self.authenticated {
            return Ok(());
        }

        let login_url = self.supplier.login_url();
        let login_page = self
            .browser
            .goto(&login_url)
            .await
            .map_err(|e| SyncError::Authentication(format!("login page unreachable: {e}")))?;

        let form = find_login_form(&login_page)
            .ok_or_else(|| SyncError::Authentication("login form not found".to_string()))?;

        let action = form
            .action
            .as_deref()
            .map(|a| resolve_url(a, &self.supplier.base_url))
            .unwrap_or_else(|| login_url.clone());

        let mut fields = form.hidden_fields;
        fields.push((form.username_field, self.supplier.username.clone()));
        fields.push((form.password_field, self.supplier.password.clone()));

        let landing_page = self
            .browser
            .submit_form(&action, &fields)
            .await
            .map_err(|e| SyncError::Authentication(format!("credential submit failed: {e}")))?;

        if looks_authenticated(&landing_page) {
            info!("authenticated against supplier portal");
            self.authenticated = true;
            Ok(())
        } else {
            warn!("post-login page lacks account vocabulary, treating as rejected credentials");
            Err(SyncError::Authentication(
                "credentials rejected or login flow changed".to_string(),
            ))
        }
    }

    /// Direct access to the underlying page for crawling.
    pub fn browser_mut(&mut self) -> &mut dyn BrowserSession {
        &mut *self.browser
    }

    /// Release the browser. Safe to call multiple times; always invoked by
    /// the orchestrator's cleanup step regardless of run outcome.
    pub async fn close(&mut self) {
        self.browser.close().await;
        self.authenticated = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_form_with_fallback_selectors_and_hidden_fields() {
        let html = r#"
            <form action="/do-login" method="post">
                <input type="hidden" name="csrf" value="tok123">
                <input type="email" name="customer[email]">
                <input type="password" name="customer[password]">
            </form>
        "#;

        let form = find_login_form(html).unwrap();
        assert_eq!(form.action.as_deref(), Some("/do-login"));
        assert_eq!(form.username_field, "customer[email]");
        assert_eq!(form.password_field, "customer[password]");
        assert_eq!(form.hidden_fields, vec![("csrf".to_string(), "tok123".to_string())]);
    }

    #[test]
    fn skips_forms_without_credential_inputs() {
        let html = r#"
            <form action="/search"><input type="text" name="q"></form>
            <form action="/login">
                <input name="username" type="text">
                <input name="password" type="password">
            </form>
        "#;

        let form = find_login_form(html).unwrap();
        assert_eq!(form.action.as_deref(), Some("/login"));
        assert_eq!(form.username_field, "username");
    }

    #[test]
    fn no_form_means_none() {
        assert_eq!(find_login_form("<p>maintenance page</p>"), None);
    }

    #[test]
    fn authenticated_vocabulary_heuristic() {
        assert!(looks_authenticated("<a href='/logout'>Log out</a>"));
        assert!(looks_authenticated("<h1>My Account</h1>"));
        assert!(!looks_authenticated("<h1>Please sign in</h1>"));
    }
}
