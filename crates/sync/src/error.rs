//! Sync engine error types.

use crate::verifier::VerifierError;
use thiserror::Error;
use versync_store::StoreError;

/// Errors raised by the sync pipelines.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("verifier error: {0}")]
    Verifier(#[from] VerifierError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Domain(#[from] versync_core::Error),

    /// Record exists but cannot be processed (missing code, null creation hash).
    #[error("invalid record {verified_contract_id}: {reason}")]
    InvalidRecord {
        verified_contract_id: i64,
        reason: String,
    },

    #[error("handler timed out after {0}s")]
    Timeout(u64),

    #[error("notification feed failed: {0}")]
    Feed(String),
}

/// Checkpoint persistence errors.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt checkpoint {path}: {content:?}")]
    Corrupt { path: String, content: String },

    /// Saving a cursor lower than the last saved one.
    #[error("checkpoint regression: {current} -> {attempted}")]
    CheckpointRegression { current: i64, attempted: i64 },
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

impl SyncError {
    pub(crate) fn invalid_record(verified_contract_id: i64, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            verified_contract_id,
            reason: reason.into(),
        }
    }
}
