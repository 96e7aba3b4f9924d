//! Submission of one stored verified contract to the verification API.
//!
//! Shared by the push pipeline, failed-row resubmission and the forwarder.

use crate::error::{SyncError, SyncResult};
use crate::verifier::{SubmitOutcome, VerificationApi, rejection_message, submit_with_retry};
use std::sync::Arc;
use versync_core::verification::CompilationInput;
use versync_core::{ContractLocation, RetryPolicy, SyncStatus, VerifyRequest};
use versync_store::models::SyncStatusUpdate;
use versync_store::{ContractStore, SourceRepo, SyncStatusRepo};

/// Builds verification requests from the store and records their outcome.
#[derive(Clone)]
pub struct Submitter {
    store: Arc<dyn ContractStore>,
    api: Arc<dyn VerificationApi>,
    retry: RetryPolicy,
}

impl Submitter {
    pub fn new(
        store: Arc<dyn ContractStore>,
        api: Arc<dyn VerificationApi>,
        retry: RetryPolicy,
    ) -> Self {
        Self { store, api, retry }
    }

    pub fn store(&self) -> &Arc<dyn ContractStore> {
        &self.store
    }

    pub fn api(&self) -> &Arc<dyn VerificationApi> {
        &self.api
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Rebuild the verification request of a stored verified contract.
    pub async fn build_request(
        &self,
        verified_contract_id: i64,
    ) -> SyncResult<(ContractLocation, VerifyRequest)> {
        let closure = self
            .store
            .fetch_closure(verified_contract_id)
            .await?
            .ok_or_else(|| SyncError::invalid_record(verified_contract_id, "closure not found"))?;
        if closure.compilation.creation_code_hash.is_none() {
            return Err(SyncError::invalid_record(
                verified_contract_id,
                "compilation has no creation code hash",
            ));
        }

        let sources: Vec<(String, String)> = self
            .store
            .fetch_compilation_sources(closure.compilation.id)
            .await?
            .into_iter()
            .map(|source| (source.path, source.content))
            .collect();

        let compilation = &closure.compilation;
        let request = VerifyRequest::build(
            CompilationInput {
                language: &compilation.language,
                version: &compilation.version,
                name: &compilation.name,
                fully_qualified_name: &compilation.fully_qualified_name,
                compiler_settings: &compilation.compiler_settings,
            },
            sources,
            closure.deployment.transaction_hash.as_deref(),
        )?;
        Ok((closure.deployment.location(), request))
    }

    /// Submit a verified contract and record the resulting sync status.
    ///
    /// A contract whose stored status cannot move to `submitted` is left
    /// alone and its stored status returned.
    pub async fn submit(&self, verified_contract_id: i64) -> SyncResult<SyncStatus> {
        let (location, request) = self.build_request(verified_contract_id).await?;

        let current = match self
            .store
            .get_sync_status(location.chain_id, location.address.as_bytes())
            .await?
        {
            Some(row) => row.status()?,
            None => SyncStatus::Pending,
        };
        if let Err(e) = current.transition(SyncStatus::Submitted) {
            tracing::debug!(
                verified_contract_id,
                chain_id = location.chain_id,
                address = %location.address,
                error = %e,
                "Sync status settled, not submitting"
            );
            return Ok(current);
        }

        let update = match submit_with_retry(self.api.as_ref(), &self.retry, &location, &request)
            .await
        {
            Ok(SubmitOutcome::Submitted { verification_id }) => {
                tracing::info!(
                    verified_contract_id,
                    chain_id = location.chain_id,
                    address = %location.address,
                    job_id = %verification_id,
                    "Verification job submitted"
                );
                SyncStatusUpdate::new(&location, SyncStatus::Submitted)
                    .with_verification_id(verification_id)
            }
            Ok(SubmitOutcome::AlreadyVerified) => {
                tracing::info!(
                    verified_contract_id,
                    chain_id = location.chain_id,
                    address = %location.address,
                    "Contract already verified"
                );
                SyncStatusUpdate::new(&location, SyncStatus::AlreadyVerified)
            }
            Ok(SubmitOutcome::Rejected { status, body }) => {
                let message = rejection_message(status, &body);
                tracing::warn!(
                    verified_contract_id,
                    chain_id = location.chain_id,
                    address = %location.address,
                    status,
                    error = %message,
                    "Verification request rejected"
                );
                SyncStatusUpdate::new(&location, SyncStatus::Failed).with_error(message)
            }
            Err(e) => {
                tracing::error!(
                    verified_contract_id,
                    chain_id = location.chain_id,
                    address = %location.address,
                    error = %e,
                    "Verification request failed"
                );
                SyncStatusUpdate::new(&location, SyncStatus::Failed).with_error(e.to_string())
            }
        };

        let status = current.transition(update.status)?;
        let written = self.store.record_sync_status(&update.attempt()).await?;
        if !written {
            tracing::debug!(
                verified_contract_id,
                chain_id = location.chain_id,
                address = %location.address,
                "Sync status already settled, left unchanged"
            );
        }
        Ok(status)
    }
}
