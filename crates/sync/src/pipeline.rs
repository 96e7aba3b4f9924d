//! Checkpointed batch loop shared by the replicate and push pipelines.
//!
//! `LOAD_CHECKPOINT -> FETCH_BATCH -> (empty -> DONE) -> PROCESS_BATCH ->
//! COMMIT_CHECKPOINT -> FETCH_BATCH ...`
//!
//! Rows of one batch are processed with bounded parallelism. The checkpoint
//! only moves once every row of the batch reached a terminal outcome, so a
//! crash replays at most the uncommitted batch.

use crate::checkpoint::CheckpointStore;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use versync_core::config::BatchConfig;

/// Terminal outcome of one processed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The row produced a write (inserted, submitted, settled).
    Applied,
    /// Nothing new to write (already present, job still running).
    Unchanged,
    /// The row was handled and recorded as failed.
    Failed,
}

/// A source of rows plus the per-row step.
#[async_trait]
pub trait BatchPipeline: Send + Sync {
    type Item: Send;

    /// Pipeline name used in logs.
    fn name(&self) -> &'static str;

    /// Fetch up to `limit` rows with id `>= cursor`, ascending.
    async fn fetch_batch(&self, cursor: i64, limit: u32) -> SyncResult<Vec<Self::Item>>;

    /// Cursor id of a row.
    fn item_id(&self, item: &Self::Item) -> i64;

    /// Process one row. Errors are contained to the row.
    async fn process(&self, item: Self::Item) -> SyncResult<ItemOutcome>;
}

/// Counters of one pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassStats {
    pub batches: u64,
    pub processed: u64,
    pub applied: u64,
    pub unchanged: u64,
    /// Rows skipped for data errors (missing closure, code or creation hash).
    pub skipped: u64,
    pub failed: u64,
    pub elapsed: Duration,
}

impl PassStats {
    /// Rows per second over the pass.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }

    pub(crate) fn record(&mut self, id: i64, pipeline: &str, result: SyncResult<ItemOutcome>) {
        self.processed += 1;
        match result {
            Ok(ItemOutcome::Applied) => self.applied += 1,
            Ok(ItemOutcome::Unchanged) => self.unchanged += 1,
            Ok(ItemOutcome::Failed) => self.failed += 1,
            Err(SyncError::InvalidRecord { reason, .. }) => {
                self.skipped += 1;
                tracing::warn!(pipeline, id, reason = %reason, "Skipping record");
            }
            Err(e) => {
                self.failed += 1;
                tracing::error!(pipeline, id, error = %e, "Failed to process record");
            }
        }
    }

    pub(crate) fn log(&self, pipeline: &str) {
        tracing::info!(
            pipeline,
            batches = self.batches,
            processed = self.processed,
            applied = self.applied,
            unchanged = self.unchanged,
            skipped = self.skipped,
            failed = self.failed,
            elapsed_ms = self.elapsed.as_millis() as u64,
            rate_per_sec = self.rate(),
            "Pass finished"
        );
    }
}

/// Runs a [`BatchPipeline`] until the source is drained or shutdown is requested.
pub struct BatchRunner<P: BatchPipeline> {
    pipeline: P,
    checkpoint: Arc<dyn CheckpointStore>,
    config: BatchConfig,
    shutdown: CancellationToken,
}

impl<P: BatchPipeline> BatchRunner<P> {
    pub fn new(
        pipeline: P,
        checkpoint: Arc<dyn CheckpointStore>,
        config: BatchConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            pipeline,
            checkpoint,
            config,
            shutdown,
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Run one pass. Store and checkpoint errors end the pass; row errors do not.
    pub async fn run(&self) -> SyncResult<PassStats> {
        let name = self.pipeline.name();
        let started = Instant::now();
        let mut stats = PassStats::default();
        let mut cursor = self.checkpoint.load().await?;
        tracing::info!(pipeline = name, cursor, "Starting pass");

        loop {
            if self.shutdown.is_cancelled() {
                tracing::info!(pipeline = name, cursor, "Shutdown requested, stopping between batches");
                break;
            }

            let batch = self
                .pipeline
                .fetch_batch(cursor, self.config.batch_size)
                .await?;
            let Some(max_id) = batch.iter().map(|item| self.pipeline.item_id(item)).max() else {
                tracing::info!(pipeline = name, cursor, "No more records");
                break;
            };
            stats.batches += 1;
            tracing::debug!(pipeline = name, cursor, rows = batch.len(), "Processing batch");

            let pipeline = &self.pipeline;
            let delay = self.config.item_delay();
            let results: Vec<(i64, SyncResult<ItemOutcome>)> = futures::stream::iter(batch)
                .map(move |item| async move {
                    let id = pipeline.item_id(&item);
                    let result = pipeline.process(item).await;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    (id, result)
                })
                .buffer_unordered(self.config.concurrency.max(1))
                .collect()
                .await;

            for (id, result) in results {
                stats.record(id, name, result);
            }

            cursor = max_id + 1;
            self.checkpoint.save(cursor).await?;
            tracing::info!(
                pipeline = name,
                cursor,
                processed = stats.processed,
                "Batch committed"
            );
        }

        stats.elapsed = started.elapsed();
        stats.log(name);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::FileCheckpoint;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Rows 1..=total; even ids are applied, multiples of 5 are skipped.
    struct CountingPipeline {
        total: i64,
        seen: Mutex<Vec<i64>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl CountingPipeline {
        fn new(total: i64) -> Self {
            Self {
                total,
                seen: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl BatchPipeline for CountingPipeline {
        type Item = i64;

        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch_batch(&self, cursor: i64, limit: u32) -> SyncResult<Vec<i64>> {
            Ok((cursor..=self.total).take(limit as usize).collect())
        }

        fn item_id(&self, item: &i64) -> i64 {
            *item
        }

        async fn process(&self, item: i64) -> SyncResult<ItemOutcome> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(item);

            if item % 5 == 0 {
                Err(SyncError::invalid_record(item, "no creation code"))
            } else if item % 2 == 0 {
                Ok(ItemOutcome::Applied)
            } else {
                Ok(ItemOutcome::Unchanged)
            }
        }
    }

    fn config(batch_size: u32, concurrency: usize) -> BatchConfig {
        BatchConfig {
            batch_size,
            concurrency,
            item_delay_ms: 0,
            created_by: vec!["sourcify".to_string()],
        }
    }

    #[tokio::test]
    async fn test_runner_drains_and_commits_next_id() {
        let temp_dir = tempfile::tempdir().unwrap();
        let checkpoint = Arc::new(FileCheckpoint::in_dir(temp_dir.path(), "CURSOR"));
        let runner = BatchRunner::new(
            CountingPipeline::new(10),
            checkpoint.clone(),
            config(3, 2),
            CancellationToken::new(),
        );

        let stats = runner.run().await.unwrap();
        assert_eq!(stats.batches, 4);
        assert_eq!(stats.processed, 10);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.applied, 4);
        assert_eq!(stats.unchanged, 4);
        assert_eq!(checkpoint.load().await.unwrap(), 11);
        assert!(runner.pipeline().max_in_flight.load(Ordering::SeqCst) <= 2);

        // A second pass starts at the checkpoint and finds nothing
        let stats = runner.run().await.unwrap();
        assert_eq!(stats.processed, 0);
        assert_eq!(stats.batches, 0);
    }

    #[tokio::test]
    async fn test_runner_resumes_from_checkpoint() {
        let temp_dir = tempfile::tempdir().unwrap();
        let checkpoint = Arc::new(FileCheckpoint::in_dir(temp_dir.path(), "CURSOR"));
        checkpoint.save(7).await.unwrap();

        let runner = BatchRunner::new(
            CountingPipeline::new(9),
            checkpoint,
            config(50, 4),
            CancellationToken::new(),
        );
        runner.run().await.unwrap();

        let mut seen = runner.pipeline().seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![7, 8, 9]);
    }

    #[tokio::test]
    async fn test_cancelled_runner_processes_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let checkpoint = Arc::new(FileCheckpoint::in_dir(temp_dir.path(), "CURSOR"));
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let runner = BatchRunner::new(
            CountingPipeline::new(5),
            checkpoint.clone(),
            config(2, 1),
            shutdown,
        );
        let stats = runner.run().await.unwrap();
        assert_eq!(stats.processed, 0);
        assert_eq!(checkpoint.load().await.unwrap(), 1);
    }

    #[test]
    fn test_rate_without_elapsed_time() {
        let stats = PassStats {
            processed: 10,
            ..PassStats::default()
        };
        assert_eq!(stats.rate(), 0.0);
    }
}
