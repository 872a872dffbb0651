//! Error taxonomy for the sync engine
//!
//! The split that matters operationally is fatal versus item-level: fatal
//! errors abort the run and finalize its log entry as `failed`, while
//! item-level errors are recorded against the offending SKU and the run
//! carries on. `is_fatal` is the single place that decision lives.

use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Login failed or the session was rejected by the supplier portal.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A page could not be fetched.
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// A page was fetched but yielded no usable data.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// A single catalog record could not be written.
    #[error("reconciliation failed for {sku}: {reason}")]
    Reconciliation { sku: String, reason: String },

    /// Another sync run currently holds the run lock.
    #[error("a sync run is already in progress")]
    RunInProgress,

    /// The run was cancelled by an operator.
    #[error("sync run cancelled")]
    Cancelled,

    /// The browser session was used after being closed.
    #[error("browser session is closed")]
    SessionClosed,

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    pub fn navigation(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn reconciliation(sku: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Reconciliation {
            sku: sku.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error must abort the run it occurred in.
    ///
    /// Navigation, extraction and reconciliation failures concern a single
    /// page or record; everything else poisons the whole run.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Navigation { .. } | Self::Extraction(_) | Self::Reconciliation { .. }
        )
    }
}
