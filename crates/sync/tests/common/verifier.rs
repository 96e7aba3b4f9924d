//! Verification API client pointed at a mock server.

#![allow(dead_code)]

use httpmock::MockServer;
use std::net::TcpListener;
use std::sync::Arc;
use versync::{Submitter, VerificationApi, VerifierClient};
use versync_core::RetryPolicy;
use versync_core::config::VerifierConfig;
use versync_store::ContractStore;

pub fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

/// Retry quickly so tests don't sleep.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
        multiplier: 2.0,
    }
}

pub fn verifier_for(server: &MockServer) -> Arc<dyn VerificationApi> {
    let config = VerifierConfig {
        base_url: server.base_url(),
        request_timeout_secs: 5,
        retry: fast_retry(3),
    };
    Arc::new(VerifierClient::new(&config).expect("verifier client"))
}

pub fn submitter_for(
    store: Arc<dyn ContractStore>,
    server: &MockServer,
    retry: RetryPolicy,
) -> Submitter {
    Submitter::new(store, verifier_for(server), retry)
}
