//! Core domain types shared by the versync crates.
//!
//! This crate defines the data model that both pipelines agree on:
//! - Hex rendering of raw byte columns and on-chain locations
//! - The sync status lifecycle of external verification jobs
//! - The notification payload announcing new verified contracts
//! - Wire types and response classification of the verification API
//! - Retry policy and application configuration

pub mod config;
pub mod error;
pub mod hex;
pub mod notification;
pub mod retry;
pub mod sync_status;
pub mod verification;

pub use error::{Error, Result};
pub use hex::{ContractLocation, HexBytes, from_prefixed_hex, to_prefixed_hex};
pub use notification::VerifiedContractNotification;
pub use retry::RetryPolicy;
pub use sync_status::SyncStatus;
pub use verification::{CompilationInput, JobOutcome, VerifyRequest, classify_job_status};

/// Checkpoint value used when no checkpoint has been persisted yet.
pub const INITIAL_CURSOR: i64 = 1;
