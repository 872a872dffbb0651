//! Settings singleton persistence
//!
//! The settings live as one JSON blob under the `"default"` key and are
//! created with defaults the first time they are asked for.

use std::sync::Arc;

use sqlx::{Row, SqlitePool};

use crate::domain::error::SyncResult;
use crate::domain::settings::{SyncSettings, SETTINGS_KEY};

#[derive(Clone)]
pub struct SettingsRepository {
    pool: Arc<SqlitePool>,
}

impl SettingsRepository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    pub async fn load(&self) -> SyncResult<Option<SyncSettings>> {
        let row = sqlx::query("SELECT settings FROM sync_settings WHERE id = ?")
            .bind(SETTINGS_KEY)
            .fetch_optional(&*self.pool)
            .await?;

        Ok(row.and_then(|r| {
            let raw: String = r.try_get("settings").ok()?;
            serde_json::from_str(&raw).ok()
        }))
    }

    /// Load the settings, persisting defaults on first use.
    pub async fn load_or_default(&self) -> SyncResult<SyncSettings> {
        if let Some(settings) = self.load().await? {
            return Ok(settings);
        }
        let defaults = SyncSettings::default();
        self.save(&defaults).await?;
        Ok(defaults)
    }

    pub async fn save(&self, settings: &SyncSettings) -> SyncResult<()> {
        let raw = serde_json::to_string(settings)
            .map_err(|e| anyhow::anyhow!("failed to serialize settings: {e}"))?;

        sqlx::query(
            r"
            INSERT INTO sync_settings (id, settings) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET settings = excluded.settings
            ",
        )
        .bind(SETTINGS_KEY)
        .bind(raw)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }
}
