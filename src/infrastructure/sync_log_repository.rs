//! Sync run audit log persistence
//!
//! A row is created with status `running` before any work happens, receives
//! periodic progress snapshots so an observer can see liveness on long runs,
//! and is finalized exactly once to `completed` or `failed`.

use std::sync::Arc;

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::domain::error::SyncResult;
use crate::domain::sync_log::{SyncItemError, SyncLogEntry, SyncStatus, SyncType};

/// Counters accumulated over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub processed: u64,
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
}

#[derive(Clone)]
pub struct SyncLogRepository {
    pool: Arc<SqlitePool>,
}

impl SyncLogRepository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Create a new log entry in the `running` state.
    pub async fn create(&self, id: &str, sync_type: SyncType) -> SyncResult<()> {
        sqlx::query(
            "INSERT INTO sync_logs (id, sync_type, status, started_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(sync_type.as_str())
        .bind(SyncStatus::Running.as_str())
        .bind(Utc::now())
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    /// Persist a progress snapshot for a still-running entry.
    pub async fn update_progress(&self, id: &str, counters: &RunCounters) -> SyncResult<()> {
        sqlx::query(
            r"
            UPDATE sync_logs SET
                products_processed = ?, products_created = ?,
                products_updated = ?, products_skipped = ?
            WHERE id = ? AND status = 'running'
            ",
        )
        .bind(counters.processed as i64)
        .bind(counters.created as i64)
        .bind(counters.updated as i64)
        .bind(counters.skipped as i64)
        .bind(id)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    /// Finalize a run as completed. The `status = 'running'` guard makes the
    /// running → completed transition happen at most once.
    pub async fn complete(
        &self,
        id: &str,
        counters: &RunCounters,
        errors: &[SyncItemError],
    ) -> SyncResult<Option<SyncLogEntry>> {
        let completed_at = Utc::now();
        let errors_json = serde_json::to_string(errors).unwrap_or_else(|_| "[]".to_string());

        let result = sqlx::query(
            r"
            UPDATE sync_logs SET
                status = 'completed',
                products_processed = ?, products_created = ?,
                products_updated = ?, products_skipped = ?,
                errors = ?,
                completed_at = ?,
                duration_seconds = CAST((julianday(?) - julianday(started_at)) * 86400 AS INTEGER)
            WHERE id = ? AND status = 'running'
            ",
        )
        .bind(counters.processed as i64)
        .bind(counters.created as i64)
        .bind(counters.updated as i64)
        .bind(counters.skipped as i64)
        .bind(errors_json)
        .bind(completed_at)
        .bind(completed_at)
        .bind(id)
        .execute(&*self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(id, "attempted to complete a sync log that is not running");
        }
        self.find(id).await
    }

    /// Finalize a run as failed with a single top-level message.
    pub async fn fail(&self, id: &str, message: &str) -> SyncResult<Option<SyncLogEntry>> {
        let completed_at = Utc::now();
        let errors = vec![SyncItemError::new("", message)];
        let errors_json = serde_json::to_string(&errors).unwrap_or_else(|_| "[]".to_string());

        let result = sqlx::query(
            r"
            UPDATE sync_logs SET
                status = 'failed',
                errors = ?,
                completed_at = ?,
                duration_seconds = CAST((julianday(?) - julianday(started_at)) * 86400 AS INTEGER)
            WHERE id = ? AND status = 'running'
            ",
        )
        .bind(errors_json)
        .bind(completed_at)
        .bind(completed_at)
        .bind(id)
        .execute(&*self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(id, "attempted to fail a sync log that is not running");
        }
        self.find(id).await
    }

    pub async fn find(&self, id: &str) -> SyncResult<Option<SyncLogEntry>> {
        let row = sqlx::query("SELECT * FROM sync_logs WHERE id = ?")
            .bind(id)
            .fetch_optional(&*self.pool)
            .await?;
        row.map(|r| entry_from_row(&r)).transpose()
    }

    /// Most recent runs first.
    pub async fn recent(&self, limit: i64) -> SyncResult<Vec<SyncLogEntry>> {
        let rows = sqlx::query("SELECT * FROM sync_logs ORDER BY started_at DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&*self.pool)
            .await?;
        rows.iter().map(entry_from_row).collect()
    }
}

fn entry_from_row(row: &SqliteRow) -> SyncResult<SyncLogEntry> {
    let sync_type: String = row.try_get("sync_type")?;
    let status: String = row.try_get("status")?;
    let errors: String = row.try_get("errors")?;

    Ok(SyncLogEntry {
        id: row.try_get("id")?,
        sync_type: SyncType::parse(&sync_type).unwrap_or(SyncType::Full),
        status: SyncStatus::parse(&status).unwrap_or(SyncStatus::Failed),
        products_processed: row.try_get::<i64, _>("products_processed")? as u64,
        products_updated: row.try_get::<i64, _>("products_updated")? as u64,
        products_created: row.try_get::<i64, _>("products_created")? as u64,
        products_skipped: row.try_get::<i64, _>("products_skipped")? as u64,
        errors: serde_json::from_str(&errors).unwrap_or_default(),
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        duration_seconds: row.try_get("duration_seconds")?,
    })
}
