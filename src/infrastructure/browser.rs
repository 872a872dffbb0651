//! Browser session abstraction over the supplier site
//!
//! The crawler, session manager and stock checker only ever talk to the
//! narrow [`BrowserSession`] trait, so all of them are testable against a
//! scripted fake without touching the network. The production
//! implementation drives a cookie-holding HTTP client; responses are
//! returned as raw HTML strings and parsed synchronously by callers, which
//! keeps every future `Send`.

use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use tracing::{debug, info};

use crate::domain::error::{SyncError, SyncResult};
use crate::infrastructure::config::BrowserConfig;

/// One logical page of an authenticated (or not yet authenticated) session.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate to a URL and return the page HTML.
    async fn goto(&mut self, url: &str) -> SyncResult<String>;

    /// Submit a form (e.g. login credentials) and return the resulting page.
    async fn submit_form(&mut self, url: &str, fields: &[(String, String)]) -> SyncResult<String>;

    /// URL of the last successful navigation, if any.
    fn current_url(&self) -> Option<&str>;

    /// Release the underlying resources. Must be idempotent.
    async fn close(&mut self);
}

/// Production [`BrowserSession`] backed by reqwest with a cookie jar.
pub struct HttpBrowserSession {
    client: Option<Client>,
    current_url: Option<String>,
}

impl HttpBrowserSession {
    pub fn new(config: &BrowserConfig) -> SyncResult<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(&config.user_agent)
            .cookie_store(true)
            .gzip(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| SyncError::Other(anyhow!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Some(client),
            current_url: None,
        })
    }

    fn client(&self, url: &str) -> SyncResult<&Client> {
        self.client.as_ref().ok_or_else(|| {
            debug!("navigation to {url} rejected: session already closed");
            SyncError::SessionClosed
        })
    }

    async fn read_page(url: &str, response: reqwest::Response) -> SyncResult<String> {
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::navigation(url, format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SyncError::navigation(url, format!("failed to read body: {e}")))?;

        if body.is_empty() {
            return Err(SyncError::navigation(url, "empty response"));
        }
        Ok(body)
    }
}

#[async_trait]
impl BrowserSession for HttpBrowserSession {
    async fn goto(&mut self, url: &str) -> SyncResult<String> {
        debug!("GET {url}");
        let response = self
            .client(url)?
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::navigation(url, e.to_string()))?;

        let body = Self::read_page(url, response).await?;
        self.current_url = Some(url.to_string());
        Ok(body)
    }

    async fn submit_form(&mut self, url: &str, fields: &[(String, String)]) -> SyncResult<String> {
        debug!("POST {url} ({} fields)", fields.len());
        let response = self
            .client(url)?
            .post(url)
            .form(fields)
            .send()
            .await
            .map_err(|e| SyncError::navigation(url, e.to_string()))?;

        let body = Self::read_page(url, response).await?;
        self.current_url = Some(url.to_string());
        Ok(body)
    }

    fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    async fn close(&mut self) {
        if self.client.take().is_some() {
            info!("browser session closed");
        }
        self.current_url = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut session = HttpBrowserSession::new(&BrowserConfig::default()).unwrap();
        session.close().await;
        session.close().await;

        let err = session.goto("https://example.com").await.unwrap_err();
        assert!(matches!(err, SyncError::SessionClosed));
    }
}
