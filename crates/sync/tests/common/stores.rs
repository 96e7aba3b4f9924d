//! Source/target stores and checkpoints in a temporary directory.

#![allow(dead_code)]

use std::sync::Arc;
use tempfile::TempDir;
use versync::FileCheckpoint;
use versync_store::models::{ReplicateOutcome, ReplicationBundle};
use versync_store::{ContractStore, ReplicaRepo, SqliteStore};

/// Two SQLite stores and a checkpoint directory, removed on drop.
pub struct TestEnv {
    pub source: Arc<dyn ContractStore>,
    pub target: Arc<dyn ContractStore>,
    temp_dir: TempDir,
}

impl TestEnv {
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let source = SqliteStore::new(temp_dir.path().join("source.db"))
            .await
            .expect("Failed to create source store");
        let target = SqliteStore::new(temp_dir.path().join("target.db"))
            .await
            .expect("Failed to create target store");

        Self {
            source: Arc::new(source),
            target: Arc::new(target),
            temp_dir,
        }
    }

    /// Checkpoint file `name` in the shared checkpoint directory.
    pub fn checkpoint(&self, name: &str) -> Arc<FileCheckpoint> {
        Arc::new(FileCheckpoint::in_dir(
            self.temp_dir.path().join("checkpoints"),
            name,
        ))
    }

    /// Write a bundle into the source store, returning its verified contract id.
    pub async fn seed(&self, bundle: &ReplicationBundle) -> i64 {
        match self.source.replicate(bundle).await.expect("seed failed") {
            ReplicateOutcome::Inserted {
                verified_contract_id,
            } => verified_contract_id,
            ReplicateOutcome::AlreadyPresent => panic!("fixture seeded twice"),
        }
    }
}
