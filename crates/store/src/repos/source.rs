//! Read side of the contract graph.

use crate::error::StoreResult;
use crate::models::{CodeRow, CompilationSourceRow, VerifiedContractClosure, VerifiedContractRow};
use async_trait::async_trait;
use std::collections::HashMap;

/// Repository for reading verified contracts and their content.
#[async_trait]
pub trait SourceRepo: Send + Sync {
    /// Get one code row by hash.
    async fn fetch_code_by_hash(&self, code_hash: &[u8]) -> StoreResult<Option<CodeRow>>;

    /// Get multiple code rows by hash in a single query.
    ///
    /// Hashes that don't exist are simply not included in the result.
    async fn fetch_codes_by_hashes(
        &self,
        code_hashes: &[Vec<u8>],
    ) -> StoreResult<HashMap<Vec<u8>, CodeRow>>;

    /// Get source contents by hash in a single query.
    async fn fetch_sources_by_hashes(
        &self,
        source_hashes: &[Vec<u8>],
    ) -> StoreResult<HashMap<Vec<u8>, String>>;

    /// Get the source files of a compilation, ordered by path.
    async fn fetch_compilation_sources(
        &self,
        compilation_id: uuid::Uuid,
    ) -> StoreResult<Vec<CompilationSourceRow>>;

    /// Get deployment, contract and compilation of a verified contract in one
    /// round trip.
    async fn fetch_closure(
        &self,
        verified_contract_id: i64,
    ) -> StoreResult<Option<VerifiedContractClosure>>;

    /// Get up to `limit` verified contracts with `id >= cursor`, ascending.
    ///
    /// Only rows whose deployment has a transaction hash and whose
    /// `created_by` is one of `created_by` are returned.
    async fn fetch_verified_batch(
        &self,
        cursor: i64,
        limit: u32,
        created_by: &[String],
    ) -> StoreResult<Vec<VerifiedContractRow>>;

    /// Get the newest verified contract deployed at (chain, address) whose
    /// `created_by` is one of `created_by`.
    async fn find_verified_contract_id(
        &self,
        chain_id: i64,
        address: &[u8],
        created_by: &[String],
    ) -> StoreResult<Option<i64>>;

    /// Count verified contracts.
    async fn count_verified_contracts(&self) -> StoreResult<i64>;
}
