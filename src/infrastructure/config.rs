//! Application configuration
//!
//! Layered the usual way: built-in defaults, then an optional TOML file
//! (`$CONFIG_DIR/wholesale-sync/config.toml` or an explicit path), then
//! `WHOLESALE_SYNC__`-prefixed environment variables. Supplier credentials
//! are static configuration and normally arrive via the environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub supplier: SupplierConfig,
    pub browser: BrowserConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite connection URL.
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:./data/wholesale-sync.db".to_string(),
        }
    }
}

/// Everything the engine needs to know about the wholesale supplier portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplierConfig {
    pub base_url: String,
    /// Login page path relative to `base_url`.
    pub login_path: String,
    pub username: String,
    pub password: String,
    /// Collection (category index) pages walked by a full crawl.
    pub collections: Vec<String>,
    /// Path prefix used to build a best-guess product URL from a SKU.
    pub product_path: String,
}

impl Default for SupplierConfig {
    fn default() -> Self {
        Self {
            base_url: "https://wholesale.example.com".to_string(),
            login_path: "/account/login".to_string(),
            username: String::new(),
            password: String::new(),
            collections: vec!["/collections/all".to_string()],
            product_path: "/products".to_string(),
        }
    }
}

impl SupplierConfig {
    /// Absolute login URL.
    pub fn login_url(&self) -> String {
        join_url(&self.base_url, &self.login_path)
    }

    /// Absolute collection URLs in crawl order.
    pub fn collection_urls(&self) -> Vec<String> {
        self.collections
            .iter()
            .map(|path| join_url(&self.base_url, path))
            .collect()
    }

    /// Best-guess product detail URL for a SKU.
    pub fn product_url(&self, sku: &str) -> String {
        format!("{}/{}", join_url(&self.base_url, &self.product_path), sku)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Per-navigation ceiling so a hung remote page cannot wedge a run.
    pub request_timeout_seconds: u64,
    pub user_agent: String,
    pub max_redirects: usize,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 60,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
            max_redirects: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: String,
    pub console_output: bool,
    pub file_output: bool,
    /// Directory for rolling log files when `file_output` is enabled.
    pub log_directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            log_directory: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location plus environment.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, preferring an explicit file path when given.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p.to_path_buf()).required(true),
            None => config::File::from(Self::default_config_path()).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("WHOLESALE_SYNC")
                    .separator("__")
                    .list_separator(","),
            )
            .build()
            .context("failed to assemble configuration sources")?;

        settings
            .try_deserialize()
            .context("failed to deserialize configuration")
    }

    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wholesale-sync")
            .join("config.toml")
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
