//! Database-to-API push of verified contracts.
//!
//! Rows without a sync status (or still `pending`) are submitted; rows already
//! `submitted` get their job polled instead. `failed` rows are only revisited
//! by [`Pusher::resubmit_failed`].

use crate::error::SyncResult;
use crate::pipeline::{BatchPipeline, ItemOutcome, PassStats};
use crate::poller::{Poller, outcome_of};
use crate::submitter::Submitter;
use async_trait::async_trait;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use versync_core::SyncStatus;
use versync_core::config::BatchConfig;
use versync_store::models::PushCandidate;
use versync_store::{SourceRepo, SyncStatusRepo};

pub struct Pusher {
    submitter: Submitter,
    poller: Poller,
    config: BatchConfig,
}

impl Pusher {
    pub fn new(submitter: Submitter, config: BatchConfig) -> Self {
        let poller = Poller::new(
            submitter.store().clone(),
            submitter.api().clone(),
            config.batch_size,
            config.item_delay(),
        );
        Self {
            submitter,
            poller,
            config,
        }
    }

    /// Poller over the same store and API, for the pass after the scan.
    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    async fn submit(&self, verified_contract_id: i64) -> SyncResult<ItemOutcome> {
        let status = self.submitter.submit(verified_contract_id).await?;
        Ok(match status {
            SyncStatus::Failed => ItemOutcome::Failed,
            _ => ItemOutcome::Applied,
        })
    }

    /// Resubmit `failed` rows that have not used up their attempts.
    pub async fn resubmit_failed(&self, shutdown: &CancellationToken) -> SyncResult<PassStats> {
        let started = Instant::now();
        let store = self.submitter.store();
        let max_attempts = self.submitter.retry().max_attempts;
        let mut stats = PassStats::default();
        let mut after_id = 0;

        loop {
            if shutdown.is_cancelled() {
                break;
            }
            let rows = store
                .list_sync_status(SyncStatus::Failed, after_id, self.config.batch_size)
                .await?;
            let Some(last) = rows.last() else {
                break;
            };
            after_id = last.id;
            stats.batches += 1;

            for row in rows {
                let location = row.location();
                if row.attempts.max(0) as u32 >= max_attempts {
                    stats.processed += 1;
                    stats.skipped += 1;
                    tracing::debug!(
                        chain_id = location.chain_id,
                        address = %location.address,
                        attempts = row.attempts,
                        "Attempts exhausted, not resubmitting"
                    );
                    continue;
                }
                let Some(verified_contract_id) = store
                    .find_verified_contract_id(
                        row.chain_id,
                        &row.address,
                        &self.config.created_by,
                    )
                    .await?
                else {
                    stats.processed += 1;
                    stats.skipped += 1;
                    tracing::warn!(
                        chain_id = location.chain_id,
                        address = %location.address,
                        "No verified contract of a pushed origin for failed row"
                    );
                    continue;
                };

                tracing::info!(
                    verified_contract_id,
                    chain_id = location.chain_id,
                    address = %location.address,
                    attempts = row.attempts,
                    "Resubmitting failed verification"
                );
                let result = self.submit(verified_contract_id).await;
                stats.record(verified_contract_id, "resubmit", result);
                if self.config.item_delay_ms > 0 {
                    tokio::time::sleep(self.config.item_delay()).await;
                }
            }
        }

        stats.elapsed = started.elapsed();
        stats.log("resubmit");
        Ok(stats)
    }
}

#[async_trait]
impl BatchPipeline for Pusher {
    type Item = PushCandidate;

    fn name(&self) -> &'static str {
        "push"
    }

    async fn fetch_batch(&self, cursor: i64, limit: u32) -> SyncResult<Vec<PushCandidate>> {
        Ok(self
            .submitter
            .store()
            .fetch_push_batch(cursor, limit, &self.config.created_by)
            .await?)
    }

    fn item_id(&self, item: &PushCandidate) -> i64 {
        item.verified_contract_id
    }

    async fn process(&self, item: PushCandidate) -> SyncResult<ItemOutcome> {
        let status = item.status()?;
        if !status.needs_processing() {
            tracing::debug!(
                verified_contract_id = item.verified_contract_id,
                status = %status,
                "Nothing to push"
            );
            return Ok(ItemOutcome::Unchanged);
        }

        match (status, item.sync_id, item.verification_id.as_deref()) {
            (SyncStatus::Submitted, Some(sync_id), Some(verification_id)) => {
                let status = self
                    .poller
                    .check(sync_id, &item.location(), verification_id)
                    .await?;
                Ok(outcome_of(status))
            }
            // Pending, or submitted without a job id to poll
            _ => self.submit(item.verified_contract_id).await,
        }
    }
}
