//! In-memory notification feed.

#![allow(dead_code)]

use async_trait::async_trait;
use tokio::sync::mpsc;
use versync_store::{NotificationFeed, StoreError, StoreResult};

/// Feed fed through a channel; dropping the sender breaks the feed.
pub struct ChannelFeed {
    rx: mpsc::UnboundedReceiver<String>,
}

pub fn channel_feed() -> (mpsc::UnboundedSender<String>, Box<dyn NotificationFeed>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, Box::new(ChannelFeed { rx }))
}

#[async_trait]
impl NotificationFeed for ChannelFeed {
    async fn recv(&mut self) -> StoreResult<String> {
        self.rx.recv().await.ok_or_else(|| {
            StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "notification connection lost",
            ))
        })
    }

    async fn close(&mut self) -> StoreResult<()> {
        self.rx.close();
        Ok(())
    }
}
