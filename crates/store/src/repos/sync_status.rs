//! Sync status repository.

use crate::error::StoreResult;
use crate::models::{PushCandidate, SyncStatusRow, SyncStatusUpdate};
use async_trait::async_trait;
use versync_core::SyncStatus;

/// Repository for the engine-owned `sourcify_sync` table.
#[async_trait]
pub trait SyncStatusRepo: Send + Sync {
    /// Get the status row of a (chain, address).
    async fn get_sync_status(
        &self,
        chain_id: i64,
        address: &[u8],
    ) -> StoreResult<Option<SyncStatusRow>>;

    /// Insert or update the status of a (chain, address).
    ///
    /// Rows already `verified` or `already_verified` are left untouched and
    /// `false` is returned.
    async fn record_sync_status(&self, update: &SyncStatusUpdate) -> StoreResult<bool>;

    /// Update a status row by id, with the same settled-row guard as
    /// [`SyncStatusRepo::record_sync_status`].
    async fn update_sync_status(
        &self,
        id: i64,
        status: SyncStatus,
        error_message: Option<&str>,
    ) -> StoreResult<bool>;

    /// List rows in `status` with `id > after_id`, ascending.
    async fn list_sync_status(
        &self,
        status: SyncStatus,
        after_id: i64,
        limit: u32,
    ) -> StoreResult<Vec<SyncStatusRow>>;

    /// Get up to `limit` verified contracts with `id >= cursor` that still
    /// need pushing: no status row yet, or status `pending`/`submitted`.
    async fn fetch_push_batch(
        &self,
        cursor: i64,
        limit: u32,
        created_by: &[String],
    ) -> StoreResult<Vec<PushCandidate>>;
}
