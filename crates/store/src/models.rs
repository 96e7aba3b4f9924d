//! Database models mapping to the contract schema.
//!
//! Hashes, addresses and bytecode are raw bytes. Numeric chain columns are
//! read back as `i64`.

use serde_json::Value;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;
use versync_core::{ContractLocation, HexBytes, SyncStatus};

// =============================================================================
// Content-addressed rows
// =============================================================================

/// Bytecode addressed by its hash.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CodeRow {
    pub code_hash: Vec<u8>,
    pub code_hash_keccak: Vec<u8>,
    pub code: Option<Vec<u8>>,
}

/// Source file addressed by its hash.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SourceRow {
    pub source_hash: Vec<u8>,
    pub source_hash_keccak: Vec<u8>,
    pub content: String,
}

// =============================================================================
// Contract graph
// =============================================================================

/// Pair of creation/runtime code.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ContractRow {
    pub id: Uuid,
    pub creation_code_hash: Option<Vec<u8>>,
    pub runtime_code_hash: Vec<u8>,
}

/// On-chain occurrence of a contract.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct DeploymentRow {
    pub id: Uuid,
    pub chain_id: i64,
    pub address: Vec<u8>,
    pub transaction_hash: Option<Vec<u8>>,
    pub block_number: Option<i64>,
    pub transaction_index: Option<i64>,
    pub deployer: Option<Vec<u8>>,
    pub contract_id: Uuid,
}

impl DeploymentRow {
    pub fn location(&self) -> ContractLocation {
        ContractLocation::new(self.chain_id, HexBytes::new(self.address.clone()))
    }
}

/// Compiler output for one contract.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct CompilationRow {
    pub id: Uuid,
    pub compiler: String,
    pub version: String,
    pub language: String,
    pub name: String,
    pub fully_qualified_name: String,
    pub compiler_settings: Value,
    pub compilation_artifacts: Value,
    /// `None` marks a compilation that cannot be verified.
    pub creation_code_hash: Option<Vec<u8>>,
    pub creation_code_artifacts: Value,
    pub runtime_code_hash: Vec<u8>,
    pub runtime_code_artifacts: Value,
}

/// Source file of a compilation with its path.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CompilationSourceRow {
    pub path: String,
    pub source_hash: Vec<u8>,
    pub source_hash_keccak: Vec<u8>,
    pub content: String,
}

/// Fact that a deployment matches a compilation. Insert-only.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct VerifiedContractRow {
    pub id: i64,
    pub deployment_id: Uuid,
    pub compilation_id: Uuid,
    pub creation_match: bool,
    pub creation_values: Option<Value>,
    pub creation_transformations: Option<Value>,
    pub creation_metadata_match: Option<bool>,
    pub runtime_match: bool,
    pub runtime_values: Option<Value>,
    pub runtime_transformations: Option<Value>,
    pub runtime_metadata_match: Option<bool>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub created_by: String,
    pub updated_by: String,
}

/// Deployment, contract and compilation of one verified contract.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedContractClosure {
    pub verified: VerifiedContractRow,
    pub deployment: DeploymentRow,
    pub contract: ContractRow,
    pub compilation: CompilationRow,
}

impl VerifiedContractClosure {
    /// Code hashes the closure references, deduplicated, creation first.
    pub fn code_hashes(&self) -> Vec<Vec<u8>> {
        let mut hashes: Vec<Vec<u8>> = Vec::with_capacity(4);
        let candidates = [
            self.compilation.creation_code_hash.as_ref(),
            Some(&self.compilation.runtime_code_hash),
            self.contract.creation_code_hash.as_ref(),
            Some(&self.contract.runtime_code_hash),
        ];
        for hash in candidates.into_iter().flatten() {
            if !hashes.contains(hash) {
                hashes.push(hash.clone());
            }
        }
        hashes
    }
}

/// Flat join row behind [`VerifiedContractClosure`].
#[derive(Debug, FromRow)]
pub(crate) struct ClosureRow {
    pub vc_id: i64,
    pub vc_creation_match: bool,
    pub vc_creation_values: Option<Value>,
    pub vc_creation_transformations: Option<Value>,
    pub vc_creation_metadata_match: Option<bool>,
    pub vc_runtime_match: bool,
    pub vc_runtime_values: Option<Value>,
    pub vc_runtime_transformations: Option<Value>,
    pub vc_runtime_metadata_match: Option<bool>,
    pub vc_created_at: OffsetDateTime,
    pub vc_updated_at: OffsetDateTime,
    pub vc_created_by: String,
    pub vc_updated_by: String,
    pub cd_id: Uuid,
    pub cd_chain_id: i64,
    pub cd_address: Vec<u8>,
    pub cd_transaction_hash: Option<Vec<u8>>,
    pub cd_block_number: Option<i64>,
    pub cd_transaction_index: Option<i64>,
    pub cd_deployer: Option<Vec<u8>>,
    pub c_id: Uuid,
    pub c_creation_code_hash: Option<Vec<u8>>,
    pub c_runtime_code_hash: Vec<u8>,
    pub cc_id: Uuid,
    pub cc_compiler: String,
    pub cc_version: String,
    pub cc_language: String,
    pub cc_name: String,
    pub cc_fully_qualified_name: String,
    pub cc_compiler_settings: Value,
    pub cc_compilation_artifacts: Value,
    pub cc_creation_code_hash: Option<Vec<u8>>,
    pub cc_creation_code_artifacts: Value,
    pub cc_runtime_code_hash: Vec<u8>,
    pub cc_runtime_code_artifacts: Value,
}

impl From<ClosureRow> for VerifiedContractClosure {
    fn from(row: ClosureRow) -> Self {
        Self {
            verified: VerifiedContractRow {
                id: row.vc_id,
                deployment_id: row.cd_id,
                compilation_id: row.cc_id,
                creation_match: row.vc_creation_match,
                creation_values: row.vc_creation_values,
                creation_transformations: row.vc_creation_transformations,
                creation_metadata_match: row.vc_creation_metadata_match,
                runtime_match: row.vc_runtime_match,
                runtime_values: row.vc_runtime_values,
                runtime_transformations: row.vc_runtime_transformations,
                runtime_metadata_match: row.vc_runtime_metadata_match,
                created_at: row.vc_created_at,
                updated_at: row.vc_updated_at,
                created_by: row.vc_created_by,
                updated_by: row.vc_updated_by,
            },
            deployment: DeploymentRow {
                id: row.cd_id,
                chain_id: row.cd_chain_id,
                address: row.cd_address,
                transaction_hash: row.cd_transaction_hash,
                block_number: row.cd_block_number,
                transaction_index: row.cd_transaction_index,
                deployer: row.cd_deployer,
                contract_id: row.c_id,
            },
            contract: ContractRow {
                id: row.c_id,
                creation_code_hash: row.c_creation_code_hash,
                runtime_code_hash: row.c_runtime_code_hash,
            },
            compilation: CompilationRow {
                id: row.cc_id,
                compiler: row.cc_compiler,
                version: row.cc_version,
                language: row.cc_language,
                name: row.cc_name,
                fully_qualified_name: row.cc_fully_qualified_name,
                compiler_settings: row.cc_compiler_settings,
                compilation_artifacts: row.cc_compilation_artifacts,
                creation_code_hash: row.cc_creation_code_hash,
                creation_code_artifacts: row.cc_creation_code_artifacts,
                runtime_code_hash: row.cc_runtime_code_hash,
                runtime_code_artifacts: row.cc_runtime_code_artifacts,
            },
        }
    }
}

// =============================================================================
// Replication
// =============================================================================

/// Everything needed to write one verified contract into a target store.
///
/// Ids of the contract, deployment and compilation are proposals: when the
/// natural key already exists in the target, the existing id wins.
#[derive(Debug, Clone)]
pub struct ReplicationBundle {
    pub codes: Vec<CodeRow>,
    pub contract: ContractRow,
    pub deployment: DeploymentRow,
    pub compilation: CompilationRow,
    pub sources: Vec<CompilationSourceRow>,
    pub verified: VerifiedContractRow,
}

impl ReplicationBundle {
    /// Source rows of the bundle (content addressed).
    pub fn source_rows(&self) -> Vec<SourceRow> {
        self.sources
            .iter()
            .map(|source| SourceRow {
                source_hash: source.source_hash.clone(),
                source_hash_keccak: source.source_hash_keccak.clone(),
                content: source.content.clone(),
            })
            .collect()
    }
}

/// Result of replicating one bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicateOutcome {
    /// A new verified contract row was written.
    Inserted { verified_contract_id: i64 },
    /// The (compilation, deployment) fact already existed; nothing was kept.
    AlreadyPresent,
}

// =============================================================================
// Sync status
// =============================================================================

/// External verification job state for one (chain, address).
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SyncStatusRow {
    pub id: i64,
    pub chain_id: i64,
    pub address: Vec<u8>,
    pub verification_id: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl SyncStatusRow {
    pub fn status(&self) -> versync_core::Result<SyncStatus> {
        self.status.parse()
    }

    pub fn location(&self) -> ContractLocation {
        ContractLocation::new(self.chain_id, HexBytes::new(self.address.clone()))
    }
}

/// Status write keyed by (chain, address).
#[derive(Debug, Clone)]
pub struct SyncStatusUpdate {
    pub chain_id: i64,
    pub address: Vec<u8>,
    pub status: SyncStatus,
    /// Kept from the stored row when `None`.
    pub verification_id: Option<String>,
    pub error_message: Option<String>,
    /// Count this write as a submission attempt.
    pub counts_attempt: bool,
}

impl SyncStatusUpdate {
    pub fn new(location: &ContractLocation, status: SyncStatus) -> Self {
        Self {
            chain_id: location.chain_id,
            address: location.address.as_bytes().to_vec(),
            status,
            verification_id: None,
            error_message: None,
            counts_attempt: false,
        }
    }

    pub fn with_verification_id(mut self, verification_id: impl Into<String>) -> Self {
        self.verification_id = Some(verification_id.into());
        self
    }

    pub fn with_error(mut self, error_message: impl Into<String>) -> Self {
        self.error_message = Some(error_message.into());
        self
    }

    pub fn attempt(mut self) -> Self {
        self.counts_attempt = true;
        self
    }
}

/// Row of the push scan: a verified contract and its sync state, if any.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct PushCandidate {
    pub verified_contract_id: i64,
    pub chain_id: i64,
    pub address: Vec<u8>,
    pub sync_id: Option<i64>,
    pub sync_status: Option<String>,
    pub verification_id: Option<String>,
}

impl PushCandidate {
    pub fn location(&self) -> ContractLocation {
        ContractLocation::new(self.chain_id, HexBytes::new(self.address.clone()))
    }

    /// Stored status; a missing row reads as `pending`.
    pub fn status(&self) -> versync_core::Result<SyncStatus> {
        match &self.sync_status {
            Some(status) => status.parse(),
            None => Ok(SyncStatus::Pending),
        }
    }
}
