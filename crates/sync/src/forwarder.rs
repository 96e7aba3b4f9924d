//! Live forwarding of newly verified contracts to the verification API.

use crate::error::{SyncError, SyncResult};
use crate::submitter::Submitter;
use tokio_util::sync::CancellationToken;
use versync_core::config::ForwardConfig;
use versync_core::{RetryPolicy, SyncStatus, VerifiedContractNotification};
use versync_store::NotificationFeed;

/// Outcome of handling one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forwarded {
    /// Written by this system; no API call was made.
    SelfOrigin,
    /// Handed to the submitter; carries the resulting sync status.
    Submitted(SyncStatus),
}

/// Subscribes to the notification channel and submits every foreign record.
pub struct Forwarder {
    submitter: Submitter,
    config: ForwardConfig,
}

impl Forwarder {
    pub fn new(submitter: Submitter, config: ForwardConfig) -> Self {
        Self { submitter, config }
    }

    fn retry(&self) -> &RetryPolicy {
        self.submitter.retry()
    }

    /// Handle one raw notification payload.
    pub async fn handle(&self, payload: &str) -> SyncResult<Forwarded> {
        let notification = VerifiedContractNotification::parse(payload)?;
        if notification.is_self_origin(&self.config.self_provenance) {
            tracing::debug!(
                verified_contract_id = notification.id,
                created_by = %notification.created_by,
                "Ignoring self-originated notification"
            );
            return Ok(Forwarded::SelfOrigin);
        }

        tracing::info!(
            verified_contract_id = notification.id,
            created_by = %notification.created_by,
            "Forwarding verified contract"
        );
        let status = self.submitter.submit(notification.id).await?;
        Ok(Forwarded::Submitted(status))
    }

    /// [`Forwarder::handle`] bounded by the configured handler timeout.
    pub async fn handle_with_timeout(&self, payload: &str) -> SyncResult<Forwarded> {
        let timeout = self.config.handler_timeout();
        match tokio::time::timeout(timeout, self.handle(payload)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(timeout.as_secs())),
        }
    }

    async fn subscribe_with_retry(&self) -> SyncResult<Box<dyn NotificationFeed>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.submitter.store().subscribe(&self.config.channel).await {
                Ok(feed) => {
                    tracing::info!(channel = %self.config.channel, "Subscribed to notifications");
                    return Ok(feed);
                }
                Err(e) if e.is_connection() && self.retry().should_retry(attempt) => {
                    let delay = self.retry().backoff(attempt);
                    tracing::warn!(
                        channel = %self.config.channel,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Subscription failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(SyncError::Feed(e.to_string())),
            }
        }
    }

    /// Subscribe and forward until shutdown or an unrecoverable feed error.
    pub async fn run(&self, shutdown: CancellationToken) -> SyncResult<()> {
        let feed = self.subscribe_with_retry().await?;
        self.listen(feed, shutdown).await
    }

    /// Forward notifications from `feed`.
    ///
    /// Handler errors are logged and the subscription continues. Consecutive
    /// feed errors are retried under the retry policy, re-subscribing each time.
    pub async fn listen(
        &self,
        mut feed: Box<dyn NotificationFeed>,
        shutdown: CancellationToken,
    ) -> SyncResult<()> {
        let mut failures = 0;

        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, closing subscription");
                    break;
                }
                received = feed.recv() => received,
            };

            let payload = match received {
                Ok(payload) => {
                    failures = 0;
                    payload
                }
                Err(e) => {
                    failures += 1;
                    if let Err(close_err) = feed.close().await {
                        tracing::debug!(error = %close_err, "Failed to close broken subscription");
                    }
                    if !self.retry().should_retry(failures) {
                        tracing::error!(failures, error = %e, "Notification feed failed, giving up");
                        return Err(SyncError::Feed(e.to_string()));
                    }
                    let delay = self.retry().backoff(failures);
                    tracing::warn!(
                        failures,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Notification feed error, re-subscribing"
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    feed = self.subscribe_with_retry().await?;
                    continue;
                }
            };

            match self.handle_with_timeout(&payload).await {
                Ok(Forwarded::SelfOrigin) => {}
                Ok(Forwarded::Submitted(status)) => {
                    tracing::debug!(status = %status, "Notification handled");
                }
                Err(e) => {
                    tracing::error!(error = %e, payload = %payload, "Failed to handle notification");
                }
            }
        }

        if let Err(e) = feed.close().await {
            tracing::warn!(error = %e, "Failed to close subscription");
        }
        Ok(())
    }
}
