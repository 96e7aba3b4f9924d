//! Sync engine for verified contract records.
//!
//! This crate wires the contract stores to each other and to the external
//! verification service:
//! - Checkpointed batch replication between two stores
//! - Checkpointed push of stored contracts to the verification API
//! - Reconciliation of submitted verification jobs
//! - Live forwarding of newly inserted verified contracts

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod forwarder;
pub mod pipeline;
pub mod poller;
pub mod pusher;
pub mod replicator;
pub mod shutdown;
pub mod submitter;
pub mod telemetry;
pub mod verifier;

pub use checkpoint::{CheckpointStore, FileCheckpoint, PUSH_CHECKPOINT, REPLICATE_CHECKPOINT};
pub use error::{CheckpointError, SyncError, SyncResult};
pub use forwarder::{Forwarded, Forwarder};
pub use pipeline::{BatchPipeline, BatchRunner, ItemOutcome, PassStats};
pub use poller::Poller;
pub use pusher::Pusher;
pub use replicator::Replicator;
pub use submitter::Submitter;
pub use verifier::{SubmitOutcome, VerificationApi, VerifierClient, VerifierError};
