//! Live notification feed.

use crate::error::StoreResult;
use async_trait::async_trait;

/// Subscription to a notification channel.
#[async_trait]
pub trait NotificationFeed: Send {
    /// Wait for the next payload.
    ///
    /// Implementations reconnect on their own after transport errors; an
    /// error means the subscription cannot continue.
    async fn recv(&mut self) -> StoreResult<String>;

    /// Stop listening and release the connection.
    async fn close(&mut self) -> StoreResult<()>;
}
