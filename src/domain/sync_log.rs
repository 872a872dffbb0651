//! Sync run audit records
//!
//! One `SyncLogEntry` is created per orchestrator run with status `running`,
//! mutated by periodic progress snapshots, and finalized exactly once to
//! `completed` or `failed`. Finalized entries are immutable and are never
//! read back into control flow within the same run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    Full,
    Incremental,
    StockCheck,
}

impl SyncType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
            Self::StockCheck => "stock_check",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full" => Some(Self::Full),
            "incremental" => Some(Self::Incremental),
            "stock_check" => Some(Self::StockCheck),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Running,
    Completed,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A single per-item failure captured during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncItemError {
    pub sku: String,
    pub message: String,
}

impl SyncItemError {
    pub fn new(sku: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: String,
    pub sync_type: SyncType,
    pub status: SyncStatus,
    pub products_processed: u64,
    pub products_updated: u64,
    pub products_created: u64,
    pub products_skipped: u64,
    pub errors: Vec<SyncItemError>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
}
