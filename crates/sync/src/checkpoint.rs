//! Durable "next id to process" cursor, one file per pipeline.

use crate::error::CheckpointError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use versync_core::INITIAL_CURSOR;

/// Checkpoint file of the database-to-database replicator.
pub const REPLICATE_CHECKPOINT: &str = "CURRENT_VERIFIED_CONTRACT";

/// Checkpoint file of the database-to-API push pipeline.
pub const PUSH_CHECKPOINT: &str = "CURRENT_SOURCIFY_SYNC";

/// Persisted cursor of a batch pipeline.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Read the cursor, or [`INITIAL_CURSOR`] when nothing was saved yet.
    async fn load(&self) -> Result<i64, CheckpointError>;

    /// Persist the cursor. Values lower than the last saved one are rejected.
    async fn save(&self, cursor: i64) -> Result<(), CheckpointError>;
}

/// Checkpoint stored as a decimal integer in a single file.
pub struct FileCheckpoint {
    path: PathBuf,
    last: Mutex<Option<i64>>,
}

impl FileCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last: Mutex::new(None),
        }
    }

    /// Checkpoint named `name` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>, name: &str) -> Self {
        Self::new(dir.as_ref().join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    async fn read(&self) -> Result<Option<i64>, CheckpointError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed
            .parse::<i64>()
            .map(Some)
            .map_err(|_| CheckpointError::Corrupt {
                path: self.path.display().to_string(),
                content: trimmed.to_string(),
            })
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpoint {
    async fn load(&self) -> Result<i64, CheckpointError> {
        let mut last = self.last.lock().await;
        let value = self.read().await?;
        *last = value;
        Ok(value.unwrap_or(INITIAL_CURSOR))
    }

    async fn save(&self, cursor: i64) -> Result<(), CheckpointError> {
        let mut last = self.last.lock().await;
        let current = match *last {
            Some(value) => Some(value),
            None => self.read().await?,
        };
        if let Some(current) = current
            && cursor < current
        {
            return Err(CheckpointError::CheckpointRegression {
                current,
                attempted: cursor,
            });
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        // Write to a sibling temp file, fsync, then rename over the checkpoint
        let temp_path = self.path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4()));
        {
            let mut file = fs::File::create(&temp_path)
                .await
                .map_err(|e| self.io_error(e))?;
            file.write_all(cursor.to_string().as_bytes())
                .await
                .map_err(|e| self.io_error(e))?;
            file.sync_all().await.map_err(|e| self.io_error(e))?;
        }
        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(self.io_error(e));
        }

        *last = Some(cursor);
        tracing::debug!(path = %self.path.display(), cursor, "Checkpoint saved");
        Ok(())
    }
}
