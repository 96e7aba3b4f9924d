//! Test fixtures for generating contract records.

use serde_json::json;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;
use versync_store::models::*;

/// Generate deterministic test data based on a seed.
pub fn seeded_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        // Simple LCG for deterministic data
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    data
}

/// SHA-256 of data.
pub fn sha256(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}

/// Stand-in for the secondary hash column.
pub fn secondary_hash(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(b"secondary");
    hasher.update(data);
    hasher.finalize().to_vec()
}

pub fn code_row(code: Vec<u8>) -> CodeRow {
    CodeRow {
        code_hash: sha256(&code),
        code_hash_keccak: secondary_hash(&code),
        code: Some(code),
    }
}

pub fn compilation_source(path: &str, content: &str) -> CompilationSourceRow {
    CompilationSourceRow {
        path: path.to_string(),
        source_hash: sha256(content.as_bytes()),
        source_hash_keccak: secondary_hash(content.as_bytes()),
        content: content.to_string(),
    }
}

/// Build a complete, self-consistent verified contract record.
///
/// Different seeds produce disjoint code, deployments and compilations.
pub fn sample_bundle(seed: u64, created_by: &str) -> ReplicationBundle {
    let creation = code_row(seeded_bytes(seed * 2 + 1, 64));
    let runtime = code_row(seeded_bytes(seed * 2 + 2, 48));
    let name = format!("Token{seed}");
    let path = format!("contracts/{name}.sol");

    let contract = ContractRow {
        id: Uuid::new_v4(),
        creation_code_hash: Some(creation.code_hash.clone()),
        runtime_code_hash: runtime.code_hash.clone(),
    };
    let deployment = DeploymentRow {
        id: Uuid::new_v4(),
        chain_id: 11155111,
        address: seeded_bytes(seed + 1000, 20),
        transaction_hash: Some(seeded_bytes(seed + 2000, 32)),
        block_number: Some(seed as i64 + 100),
        transaction_index: Some(0),
        deployer: Some(seeded_bytes(seed + 3000, 20)),
        contract_id: contract.id,
    };
    let compilation = CompilationRow {
        id: Uuid::new_v4(),
        compiler: "solc".to_string(),
        version: "0.8.19+commit.7dd6d404".to_string(),
        language: "solidity".to_string(),
        name: name.clone(),
        fully_qualified_name: format!("{path}:{name}"),
        compiler_settings: json!({
            "optimizer": {"enabled": true, "runs": 200},
            "compilationTarget": {path.clone(): name.clone()}
        }),
        compilation_artifacts: json!({"abi": [], "userdoc": {}, "devdoc": {}}),
        creation_code_hash: Some(creation.code_hash.clone()),
        creation_code_artifacts: json!({"sourceMap": "1:2:3"}),
        runtime_code_hash: runtime.code_hash.clone(),
        runtime_code_artifacts: json!({"immutableReferences": {}}),
    };
    let verified = VerifiedContractRow {
        id: 0,
        deployment_id: deployment.id,
        compilation_id: compilation.id,
        creation_match: true,
        creation_values: Some(json!({})),
        creation_transformations: Some(json!([])),
        creation_metadata_match: Some(true),
        runtime_match: true,
        runtime_values: Some(json!({})),
        runtime_transformations: Some(json!([])),
        runtime_metadata_match: Some(true),
        created_at: OffsetDateTime::from_unix_timestamp(1_700_000_000 + seed as i64).unwrap(),
        updated_at: OffsetDateTime::from_unix_timestamp(1_700_086_400 + seed as i64).unwrap(),
        created_by: created_by.to_string(),
        updated_by: "curator".to_string(),
    };

    ReplicationBundle {
        codes: vec![creation, runtime],
        contract,
        deployment,
        compilation,
        sources: vec![compilation_source(
            &path,
            &format!("// SPDX-License-Identifier: MIT\ncontract {name} {{}}\n"),
        )],
        verified,
    }
}

/// A bundle whose compilation has no creation code.
pub fn bundle_without_creation_code(seed: u64, created_by: &str) -> ReplicationBundle {
    let mut bundle = sample_bundle(seed, created_by);
    bundle.codes.truncate(1);
    bundle.codes[0] = code_row(seeded_bytes(seed * 2 + 2, 48));
    bundle.contract.creation_code_hash = None;
    bundle.compilation.creation_code_hash = None;
    bundle
}
