//! Reconciliation of submitted verification jobs.

use crate::error::SyncResult;
use crate::pipeline::{ItemOutcome, PassStats};
use crate::verifier::VerificationApi;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use versync_core::{ContractLocation, JobOutcome, SyncStatus};
use versync_store::{ContractStore, SyncStatusRepo};

/// Polls job status for `submitted` rows and settles them.
#[derive(Clone)]
pub struct Poller {
    store: Arc<dyn ContractStore>,
    api: Arc<dyn VerificationApi>,
    page_size: u32,
    item_delay: Duration,
}

impl Poller {
    pub fn new(
        store: Arc<dyn ContractStore>,
        api: Arc<dyn VerificationApi>,
        page_size: u32,
        item_delay: Duration,
    ) -> Self {
        Self {
            store,
            api,
            page_size: page_size.max(1),
            item_delay,
        }
    }

    /// Check the job of a `submitted` row and write the resulting status.
    ///
    /// Pending jobs and transient errors leave the row `submitted`.
    pub async fn check(
        &self,
        sync_id: i64,
        location: &ContractLocation,
        verification_id: &str,
    ) -> SyncResult<SyncStatus> {
        let outcome = match self.api.job_status(verification_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    chain_id = location.chain_id,
                    address = %location.address,
                    job_id = %verification_id,
                    error = %e,
                    "Job status check failed, keeping row submitted"
                );
                return Ok(SyncStatus::Submitted);
            }
        };

        let (status, error) = match outcome {
            JobOutcome::Pending => {
                tracing::debug!(
                    chain_id = location.chain_id,
                    address = %location.address,
                    job_id = %verification_id,
                    "Verification job still running"
                );
                (SyncStatus::Submitted, None)
            }
            JobOutcome::Verified { match_kind } => {
                tracing::info!(
                    chain_id = location.chain_id,
                    address = %location.address,
                    job_id = %verification_id,
                    match_kind = %match_kind,
                    "Verification completed"
                );
                (SyncStatus::Verified, None)
            }
            JobOutcome::AlreadyVerified => {
                tracing::info!(
                    chain_id = location.chain_id,
                    address = %location.address,
                    job_id = %verification_id,
                    "Contract was already verified"
                );
                (SyncStatus::AlreadyVerified, None)
            }
            JobOutcome::Failed { error } => {
                tracing::warn!(
                    chain_id = location.chain_id,
                    address = %location.address,
                    job_id = %verification_id,
                    error = %error,
                    "Verification failed"
                );
                (SyncStatus::Failed, Some(error))
            }
        };

        if !status.is_terminal() {
            return Ok(status);
        }
        let status = SyncStatus::Submitted.transition(status)?;
        self.store
            .update_sync_status(sync_id, status, error.as_deref())
            .await?;
        Ok(status)
    }

    /// Scan every `submitted` row once.
    pub async fn run_pass(&self, shutdown: &CancellationToken) -> SyncResult<PassStats> {
        let started = Instant::now();
        let mut stats = PassStats::default();
        let mut after_id = 0;

        loop {
            if shutdown.is_cancelled() {
                tracing::info!(after_id, "Shutdown requested, stopping reconciliation");
                break;
            }
            let rows = self
                .store
                .list_sync_status(SyncStatus::Submitted, after_id, self.page_size)
                .await?;
            let Some(last) = rows.last() else {
                break;
            };
            after_id = last.id;
            stats.batches += 1;

            for row in rows {
                let location = row.location();
                let Some(verification_id) = row.verification_id.as_deref() else {
                    stats.processed += 1;
                    stats.skipped += 1;
                    tracing::warn!(
                        chain_id = location.chain_id,
                        address = %location.address,
                        "Submitted row has no job id"
                    );
                    continue;
                };
                let result = self
                    .check(row.id, &location, verification_id)
                    .await
                    .map(outcome_of);
                stats.record(row.id, "reconcile", result);
                if !self.item_delay.is_zero() {
                    tokio::time::sleep(self.item_delay).await;
                }
            }
        }

        stats.elapsed = started.elapsed();
        stats.log("reconcile");
        Ok(stats)
    }
}

/// Map a polled status to a row outcome.
pub(crate) fn outcome_of(status: SyncStatus) -> ItemOutcome {
    match status {
        SyncStatus::Verified | SyncStatus::AlreadyVerified => ItemOutcome::Applied,
        SyncStatus::Failed => ItemOutcome::Failed,
        SyncStatus::Pending | SyncStatus::Submitted => ItemOutcome::Unchanged,
    }
}
