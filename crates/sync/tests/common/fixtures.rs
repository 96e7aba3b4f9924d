//! Verified contract fixtures.

#![allow(dead_code)]

use serde_json::json;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;
use versync_core::{ContractLocation, to_prefixed_hex};
use versync_store::models::*;

pub const CHAIN_ID: i64 = 11155111;

/// Deterministic pseudo-random bytes.
pub fn seeded_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed.wrapping_add(0x9e37_79b9_7f4a_7c15);
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 56) as u8
        })
        .collect()
}

fn code(bytes: Vec<u8>) -> CodeRow {
    let mut secondary = Sha256::new();
    secondary.update(b"keccak-stand-in");
    secondary.update(&bytes);
    CodeRow {
        code_hash: Sha256::digest(&bytes).to_vec(),
        code_hash_keccak: secondary.finalize().to_vec(),
        code: Some(bytes),
    }
}

/// A verified contract on [`CHAIN_ID`]; each seed gets its own address and code.
pub fn contract_bundle(seed: u64, created_by: &str) -> ReplicationBundle {
    let creation = code(seeded_bytes(seed * 10 + 1, 96));
    let runtime = code(seeded_bytes(seed * 10 + 2, 64));
    let name = format!("Vault{seed}");
    let path = format!("src/{name}.sol");
    let content = format!("pragma solidity ^0.8.0;\ncontract {name} {{ uint256 public x = {seed}; }}\n");

    let contract_id = Uuid::new_v4();
    let deployment_id = Uuid::new_v4();
    let compilation_id = Uuid::new_v4();

    ReplicationBundle {
        contract: ContractRow {
            id: contract_id,
            creation_code_hash: Some(creation.code_hash.clone()),
            runtime_code_hash: runtime.code_hash.clone(),
        },
        deployment: DeploymentRow {
            id: deployment_id,
            chain_id: CHAIN_ID,
            address: seeded_bytes(seed + 500, 20),
            transaction_hash: Some(seeded_bytes(seed + 900, 32)),
            block_number: Some(4_000_000 + seed as i64),
            transaction_index: Some(seed as i64 % 7),
            deployer: Some(seeded_bytes(seed + 1300, 20)),
            contract_id,
        },
        compilation: CompilationRow {
            id: compilation_id,
            compiler: "solc".to_string(),
            version: "0.8.24+commit.e11b9ed9".to_string(),
            language: "solidity".to_string(),
            name: name.clone(),
            fully_qualified_name: format!("{path}:{name}"),
            compiler_settings: json!({
                "evmVersion": "paris",
                "optimizer": {"enabled": false, "runs": 200},
                "compilationTarget": {path.clone(): name.clone()}
            }),
            compilation_artifacts: json!({"abi": [], "sources": {}}),
            creation_code_hash: Some(creation.code_hash.clone()),
            creation_code_artifacts: json!({}),
            runtime_code_hash: runtime.code_hash.clone(),
            runtime_code_artifacts: json!({}),
        },
        sources: vec![CompilationSourceRow {
            path,
            source_hash: Sha256::digest(content.as_bytes()).to_vec(),
            source_hash_keccak: Sha256::digest(format!("k{content}").as_bytes()).to_vec(),
            content,
        }],
        verified: VerifiedContractRow {
            id: 0,
            deployment_id,
            compilation_id,
            creation_match: true,
            creation_values: None,
            creation_transformations: None,
            creation_metadata_match: Some(true),
            runtime_match: true,
            runtime_values: None,
            runtime_transformations: None,
            runtime_metadata_match: Some(true),
            created_at: OffsetDateTime::from_unix_timestamp(1_700_000_000 + seed as i64).unwrap(),
            updated_at: OffsetDateTime::from_unix_timestamp(1_700_086_400 + seed as i64).unwrap(),
            created_by: created_by.to_string(),
            updated_by: "curator".to_string(),
        },
        codes: vec![creation, runtime],
    }
}

/// Same as [`contract_bundle`] but the compilation has no creation code.
pub fn runtime_only_bundle(seed: u64, created_by: &str) -> ReplicationBundle {
    let mut bundle = contract_bundle(seed, created_by);
    bundle.codes.remove(0);
    bundle.contract.creation_code_hash = None;
    bundle.compilation.creation_code_hash = None;
    bundle
}

pub fn location_of(bundle: &ReplicationBundle) -> ContractLocation {
    bundle.deployment.location()
}

/// Path of the submission endpoint for a bundle.
pub fn submit_path(bundle: &ReplicationBundle) -> String {
    format!(
        "/v2/verify/{}/{}",
        bundle.deployment.chain_id,
        to_prefixed_hex(&bundle.deployment.address)
    )
}

/// Notification payload as emitted by the insert trigger.
pub fn notification_payload(id: i64, bundle: &ReplicationBundle) -> String {
    json!({
        "id": id,
        "created_by": bundle.verified.created_by,
        "deployment_id": bundle.deployment.id,
        "compilation_id": bundle.compilation.id,
        "creation_match": true,
        "runtime_match": true
    })
    .to_string()
}
