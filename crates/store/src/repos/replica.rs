//! Write side of the contract graph.

use crate::error::StoreResult;
use crate::models::{
    CodeRow, CompilationRow, ContractRow, DeploymentRow, ReplicateOutcome, ReplicationBundle,
    SourceRow,
};
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for idempotent writes into a target store.
///
/// Every upsert inserts when the natural key is absent and otherwise leaves
/// the stored row untouched; the returned id is the stored one.
#[async_trait]
pub trait ReplicaRepo: Send + Sync {
    /// Insert code rows in one statement, ignoring existing hashes.
    /// Returns the number of rows actually inserted.
    async fn upsert_codes(&self, codes: &[CodeRow]) -> StoreResult<u64>;

    /// Insert source rows in one statement, ignoring existing hashes.
    /// Returns the number of rows actually inserted.
    async fn upsert_sources(&self, sources: &[SourceRow]) -> StoreResult<u64>;

    /// Insert-or-fetch a contract by (creation, runtime) code hash.
    async fn upsert_contract(&self, contract: &ContractRow) -> StoreResult<Uuid>;

    /// Insert-or-fetch a deployment by (chain, address, transaction hash).
    async fn upsert_deployment(&self, deployment: &DeploymentRow) -> StoreResult<Uuid>;

    /// Insert-or-fetch a compilation by (compiler, language, creation, runtime).
    async fn upsert_compilation(&self, compilation: &CompilationRow) -> StoreResult<Uuid>;

    /// Write a whole verified contract in one transaction.
    ///
    /// When the (compilation, deployment) fact already exists the transaction
    /// is rolled back and [`ReplicateOutcome::AlreadyPresent`] is returned.
    async fn replicate(&self, bundle: &ReplicationBundle) -> StoreResult<ReplicateOutcome>;
}
