//! SQLite pool setup and schema migration
//!
//! The schema is managed in-process with idempotent `CREATE ... IF NOT
//! EXISTS` statements, so `migrate()` is safe to run on every startup.

use std::path::Path;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self> {
        // Create database file directory if it doesn't exist
        let db_path = if database_url.starts_with("sqlite://") {
            database_url.trim_start_matches("sqlite://")
        } else if database_url.starts_with("sqlite:") {
            database_url.trim_start_matches("sqlite:")
        } else {
            database_url
        };

        if db_path != ":memory:" {
            if let Some(parent) = Path::new(db_path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            if !Path::new(db_path).exists() {
                std::fs::File::create(db_path)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        let create_products_sql = r#"
            CREATE TABLE IF NOT EXISTS products (
                sku TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                brand TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT '',
                wholesale_price REAL NOT NULL,
                retail_price REAL NOT NULL,
                margin_percent REAL NOT NULL,
                description TEXT,
                images TEXT NOT NULL DEFAULT '[]',
                in_stock BOOLEAN NOT NULL DEFAULT 1,
                stock_quantity INTEGER,
                flavours TEXT,
                strengths TEXT,
                ingredients TEXT,
                allergens TEXT,
                active BOOLEAN NOT NULL DEFAULT 1,
                excluded BOOLEAN NOT NULL DEFAULT 0,
                source_url TEXT NOT NULL DEFAULT '',
                last_synced_at DATETIME NOT NULL
            )
        "#;

        let create_sync_logs_sql = r#"
            CREATE TABLE IF NOT EXISTS sync_logs (
                id TEXT PRIMARY KEY,
                sync_type TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'running',
                products_processed INTEGER NOT NULL DEFAULT 0,
                products_updated INTEGER NOT NULL DEFAULT 0,
                products_created INTEGER NOT NULL DEFAULT 0,
                products_skipped INTEGER NOT NULL DEFAULT 0,
                errors TEXT NOT NULL DEFAULT '[]',
                started_at DATETIME NOT NULL,
                completed_at DATETIME,
                duration_seconds INTEGER
            )
        "#;

        let create_settings_sql = r#"
            CREATE TABLE IF NOT EXISTS sync_settings (
                id TEXT PRIMARY KEY,
                settings TEXT NOT NULL
            )
        "#;

        let create_indexes_sql = [
            "CREATE INDEX IF NOT EXISTS idx_products_last_synced_at ON products (last_synced_at)",
            "CREATE INDEX IF NOT EXISTS idx_products_brand ON products (brand)",
            "CREATE INDEX IF NOT EXISTS idx_sync_logs_started_at ON sync_logs (started_at)",
            "CREATE INDEX IF NOT EXISTS idx_sync_logs_status ON sync_logs (status)",
        ];

        sqlx::query(create_products_sql).execute(&self.pool).await?;
        sqlx::query(create_sync_logs_sql).execute(&self.pool).await?;
        sqlx::query(create_settings_sql).execute(&self.pool).await?;
        for sql in create_indexes_sql {
            sqlx::query(sql).execute(&self.pool).await?;
        }

        Ok(())
    }
}
