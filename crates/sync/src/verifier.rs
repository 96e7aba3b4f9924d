//! Client for the external verification API (`/v2/verify`).

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use thiserror::Error;
use versync_core::verification::{VerifyAccepted, error_message};
use versync_core::{ContractLocation, JobOutcome, RetryPolicy, VerifyRequest, classify_job_status};
use versync_core::config::VerifierConfig;

/// Verification API errors.
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid verifier URL: {0}")]
    Url(String),

    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl VerifierError {
    /// Transport failures, 429 and 5xx are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            VerifierError::Http(_) => true,
            VerifierError::Status { status, .. } => *status == 429 || *status >= 500,
            VerifierError::Url(_) | VerifierError::InvalidResponse(_) => false,
        }
    }
}

/// Result of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// 202: a verification job was started.
    Submitted { verification_id: String },
    /// 409: the service already has this contract.
    AlreadyVerified,
    /// Any other non-transient status. `body` is kept verbatim.
    Rejected { status: u16, body: String },
}

/// Operations of the verification service used by the pipelines.
#[async_trait]
pub trait VerificationApi: Send + Sync {
    /// `POST /v2/verify/{chainId}/{address}`.
    async fn submit(
        &self,
        location: &ContractLocation,
        request: &VerifyRequest,
    ) -> Result<SubmitOutcome, VerifierError>;

    /// `GET /v2/verify/{jobId}`.
    async fn job_status(&self, verification_id: &str) -> Result<JobOutcome, VerifierError>;
}

/// reqwest-backed [`VerificationApi`].
#[derive(Clone)]
pub struct VerifierClient {
    http: reqwest::Client,
    base_url: Url,
}

impl VerifierClient {
    pub fn new(config: &VerifierConfig) -> Result<Self, VerifierError> {
        let mut base_url =
            Url::parse(&config.base_url).map_err(|e| VerifierError::Url(e.to_string()))?;
        // Paths are joined relative to the base, which must end with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("versync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, VerifierError> {
        self.base_url
            .join(path)
            .map_err(|e| VerifierError::Url(e.to_string()))
    }
}

#[async_trait]
impl VerificationApi for VerifierClient {
    async fn submit(
        &self,
        location: &ContractLocation,
        request: &VerifyRequest,
    ) -> Result<SubmitOutcome, VerifierError> {
        let url = self.url(&format!(
            "v2/verify/{}/{}",
            location.chain_id, location.address
        ))?;
        let response = self.http.post(url).json(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        match status {
            StatusCode::ACCEPTED => {
                let accepted: VerifyAccepted = serde_json::from_str(&body)
                    .map_err(|e| VerifierError::InvalidResponse(format!("{e}: {body}")))?;
                Ok(SubmitOutcome::Submitted {
                    verification_id: accepted.verification_id,
                })
            }
            StatusCode::CONFLICT => Ok(SubmitOutcome::AlreadyVerified),
            s if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => {
                Err(VerifierError::Status {
                    status: s.as_u16(),
                    body,
                })
            }
            s => Ok(SubmitOutcome::Rejected {
                status: s.as_u16(),
                body,
            }),
        }
    }

    async fn job_status(&self, verification_id: &str) -> Result<JobOutcome, VerifierError> {
        let url = self.url(&format!("v2/verify/{verification_id}"))?;
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok(classify_job_status(status.as_u16(), &body))
    }
}

/// Submit, retrying transient failures under `policy`.
pub async fn submit_with_retry(
    api: &dyn VerificationApi,
    policy: &RetryPolicy,
    location: &ContractLocation,
    request: &VerifyRequest,
) -> Result<SubmitOutcome, VerifierError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match api.submit(location, request).await {
            Err(e) if e.is_transient() && policy.should_retry(attempt) => {
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    chain_id = location.chain_id,
                    address = %location.address,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient submission failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            result => return result,
        }
    }
}

/// Text stored as `error_message` for a rejected submission.
pub fn rejection_message(status: u16, body: &str) -> String {
    if body.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        error_message(body)
    }
}
