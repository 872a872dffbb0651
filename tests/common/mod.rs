//! Shared fakes and fixtures for the integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::SqlitePool;
use tempfile::TempDir;

use wholesale_sync_lib::application::{BrowserFactory, SyncOrchestrator};
use wholesale_sync_lib::domain::error::{SyncError, SyncResult};
use wholesale_sync_lib::infrastructure::browser::BrowserSession;
use wholesale_sync_lib::infrastructure::config::SupplierConfig;
use wholesale_sync_lib::infrastructure::database_connection::DatabaseConnection;
use wholesale_sync_lib::infrastructure::extractor::SupplierExtractor;

pub const BASE_URL: &str = "https://supplier.example";

/// Observer invoked with each URL as it is fetched, before the page is
/// served. Lets a test react mid-run (e.g. cancel the orchestrator).
pub type GotoHook = Arc<dyn Fn(&str) + Send + Sync>;

/// A scripted supplier site: canned pages keyed by URL, URLs that fail on
/// demand, and shared counters the tests can inspect after a run.
#[derive(Default, Clone)]
pub struct FakeSite {
    pages: HashMap<String, String>,
    fail_urls: HashSet<String>,
    on_goto: Option<GotoHook>,
    pub visited: Arc<Mutex<Vec<String>>>,
    pub closed: Arc<AtomicUsize>,
}

impl FakeSite {
    pub fn new() -> Self {
        let mut site = Self::default();
        site.page("/account/login", login_page());
        site
    }

    /// Register a page under a path relative to [`BASE_URL`].
    pub fn page(&mut self, path: &str, html: String) {
        self.pages.insert(format!("{BASE_URL}{path}"), html);
    }

    /// Make navigation to a path fail with a navigation error.
    pub fn fail(&mut self, path: &str) {
        self.fail_urls.insert(format!("{BASE_URL}{path}"));
    }

    /// Install an observer called with each fetched URL. Must be set before
    /// `factory()` hands out a session.
    pub fn on_goto(&mut self, hook: GotoHook) {
        self.on_goto = Some(hook);
    }

    pub fn visited_urls(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Browser factory handing out sessions backed by this site.
    pub fn factory(&self) -> BrowserFactory {
        let site = self.clone();
        Box::new(move || {
            Ok(Box::new(FakeBrowserSession {
                pages: site.pages.clone(),
                fail_urls: site.fail_urls.clone(),
                on_goto: site.on_goto.clone(),
                visited: site.visited.clone(),
                closed: site.closed.clone(),
                current_url: None,
            }) as Box<dyn BrowserSession>)
        })
    }
}

pub struct FakeBrowserSession {
    pages: HashMap<String, String>,
    fail_urls: HashSet<String>,
    on_goto: Option<GotoHook>,
    visited: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
    current_url: Option<String>,
}

#[async_trait]
impl BrowserSession for FakeBrowserSession {
    async fn goto(&mut self, url: &str) -> SyncResult<String> {
        self.visited.lock().unwrap().push(url.to_string());
        self.current_url = Some(url.to_string());
        if let Some(hook) = &self.on_goto {
            hook(url);
        }

        if self.fail_urls.contains(url) {
            return Err(SyncError::navigation(url, "connection reset"));
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| SyncError::navigation(url, "404 not found"))
    }

    async fn submit_form(&mut self, url: &str, _fields: &[(String, String)]) -> SyncResult<String> {
        self.visited.lock().unwrap().push(format!("POST {url}"));
        Ok("<html><body><nav><a href='/logout'>Logout</a></nav><h1>My Account</h1></body></html>"
            .to_string())
    }

    fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    async fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn supplier_config(collections: &[&str]) -> SupplierConfig {
    SupplierConfig {
        base_url: BASE_URL.to_string(),
        login_path: "/account/login".to_string(),
        username: "buyer@example.com".to_string(),
        password: "secret".to_string(),
        collections: collections.iter().map(|c| c.to_string()).collect(),
        product_path: "/products".to_string(),
    }
}

pub async fn test_database() -> (TempDir, Arc<SqlitePool>) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("sync.db").display());
    let db = DatabaseConnection::new(&url).await.unwrap();
    db.migrate().await.unwrap();
    (dir, Arc::new(db.pool().clone()))
}

pub fn orchestrator(
    site: &FakeSite,
    pool: Arc<SqlitePool>,
    collections: &[&str],
) -> SyncOrchestrator {
    let supplier = supplier_config(collections);
    let extractor = SupplierExtractor::new(BASE_URL);
    SyncOrchestrator::new(supplier, extractor, pool, site.factory())
}

pub fn login_page() -> String {
    r#"
    <html><body>
      <form id="login" action="/account/login">
        <input type="hidden" name="form_type" value="customer_login" />
        <input type="email" name="customer[email]" />
        <input type="password" name="customer[password]" />
        <button type="submit">Sign in</button>
      </form>
    </body></html>
    "#
    .to_string()
}

/// A collection listing page. Each product is (title, price, detail path);
/// `next` is an optional next-page path.
pub fn listing_page(products: &[(&str, &str, &str)], next: Option<&str>) -> String {
    let cards: String = products
        .iter()
        .map(|(title, price, path)| {
            format!(
                r#"<div class="product-card">
                     <span class="product-title">{title}</span>
                     <span class="price">{price}</span>
                     <a href="{path}">view</a>
                   </div>"#
            )
        })
        .collect();

    let pagination = next
        .map(|path| format!(r#"<a rel="next" href="{path}">Next</a>"#))
        .unwrap_or_default();

    format!("<html><body>{cards}{pagination}</body></html>")
}

pub fn detail_page(title: &str, price: &str, description: &str) -> String {
    format!(
        r#"<html><body>
             <h1 class="product-title">{title}</h1>
             <span class="price">{price}</span>
             <div class="product-description">{description}</div>
           </body></html>"#
    )
}

pub fn out_of_stock_page(title: &str, price: &str) -> String {
    format!(
        r#"<html><body>
             <h1 class="product-title">{title}</h1>
             <span class="price">{price}</span>
             <p class="stock-badge">Out of stock</p>
           </body></html>"#
    )
}

pub fn in_stock_page(title: &str, price: &str, quantity: u32) -> String {
    format!(
        r#"<html><body>
             <h1 class="product-title">{title}</h1>
             <span class="price">{price}</span>
             <p class="stock-badge">{quantity} in stock</p>
           </body></html>"#
    )
}
