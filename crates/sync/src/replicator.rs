//! Database-to-database replication of verified contracts.

use crate::error::{SyncError, SyncResult};
use crate::pipeline::{BatchPipeline, ItemOutcome};
use async_trait::async_trait;
use std::sync::Arc;
use versync_store::models::{ReplicateOutcome, ReplicationBundle, VerifiedContractRow};
use versync_store::{ContractStore, ReplicaRepo, SourceRepo};

/// Copies verified contracts from a source store into a target store.
pub struct Replicator {
    source: Arc<dyn ContractStore>,
    target: Arc<dyn ContractStore>,
    created_by: Vec<String>,
}

impl Replicator {
    pub fn new(
        source: Arc<dyn ContractStore>,
        target: Arc<dyn ContractStore>,
        created_by: Vec<String>,
    ) -> Self {
        Self {
            source,
            target,
            created_by,
        }
    }

    /// Collect everything the target needs for one verified contract.
    ///
    /// Missing closures, null creation code hashes and missing code rows are
    /// data errors and reported as [`SyncError::InvalidRecord`].
    pub async fn build_bundle(&self, verified_contract_id: i64) -> SyncResult<ReplicationBundle> {
        let closure = self
            .source
            .fetch_closure(verified_contract_id)
            .await?
            .ok_or_else(|| SyncError::invalid_record(verified_contract_id, "closure not found"))?;

        if closure.compilation.creation_code_hash.is_none() {
            return Err(SyncError::invalid_record(
                verified_contract_id,
                "compilation has no creation code hash",
            ));
        }

        let hashes = closure.code_hashes();
        let mut found = self.source.fetch_codes_by_hashes(&hashes).await?;
        let mut codes = Vec::with_capacity(hashes.len());
        for hash in &hashes {
            match found.remove(hash) {
                Some(code) => codes.push(code),
                None => {
                    return Err(SyncError::invalid_record(
                        verified_contract_id,
                        format!("code {} not found", versync_core::to_prefixed_hex(hash)),
                    ));
                }
            }
        }

        let sources = self
            .source
            .fetch_compilation_sources(closure.compilation.id)
            .await?;

        Ok(ReplicationBundle {
            codes,
            contract: closure.contract,
            deployment: closure.deployment,
            compilation: closure.compilation,
            sources,
            verified: closure.verified,
        })
    }
}

#[async_trait]
impl BatchPipeline for Replicator {
    type Item = VerifiedContractRow;

    fn name(&self) -> &'static str {
        "replicate"
    }

    async fn fetch_batch(&self, cursor: i64, limit: u32) -> SyncResult<Vec<VerifiedContractRow>> {
        Ok(self
            .source
            .fetch_verified_batch(cursor, limit, &self.created_by)
            .await?)
    }

    fn item_id(&self, item: &VerifiedContractRow) -> i64 {
        item.id
    }

    async fn process(&self, item: VerifiedContractRow) -> SyncResult<ItemOutcome> {
        let bundle = self.build_bundle(item.id).await?;
        let location = bundle.deployment.location();

        match self.target.replicate(&bundle).await? {
            ReplicateOutcome::Inserted {
                verified_contract_id,
            } => {
                tracing::info!(
                    verified_contract_id = item.id,
                    target_id = verified_contract_id,
                    chain_id = location.chain_id,
                    address = %location.address,
                    "Replicated verified contract"
                );
                Ok(ItemOutcome::Applied)
            }
            ReplicateOutcome::AlreadyPresent => {
                tracing::debug!(
                    verified_contract_id = item.id,
                    chain_id = location.chain_id,
                    address = %location.address,
                    "Verified contract already present in target"
                );
                Ok(ItemOutcome::Unchanged)
            }
        }
    }
}
