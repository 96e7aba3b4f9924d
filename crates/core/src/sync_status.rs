//! Lifecycle of an external verification job tracked per (chain, address).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sync status of one contract against the external verification service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Known but not yet submitted.
    Pending,
    /// Submitted; the external job has not reported a result yet.
    Submitted,
    /// The external job matched the contract.
    Verified,
    /// The external service already had the contract.
    AlreadyVerified,
    /// Submission or verification failed; may be resubmitted.
    Failed,
}

impl SyncStatus {
    pub const ALL: [SyncStatus; 5] = [
        Self::Pending,
        Self::Submitted,
        Self::Verified,
        Self::AlreadyVerified,
        Self::Failed,
    ];

    /// Database / wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Submitted => "submitted",
            Self::Verified => "verified",
            Self::AlreadyVerified => "already_verified",
            Self::Failed => "failed",
        }
    }

    /// Check if no further automatic processing happens for this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified | Self::AlreadyVerified | Self::Failed)
    }

    /// Check whether the batch scan still picks up a row in this status.
    pub fn needs_processing(&self) -> bool {
        matches!(self, Self::Pending | Self::Submitted)
    }

    /// Transitions move toward a terminal status; only `failed` may go back
    /// to `pending`/`submitted` through resubmission.
    pub fn can_transition_to(&self, next: SyncStatus) -> bool {
        match self {
            Self::Verified | Self::AlreadyVerified => false,
            Self::Pending => next != Self::Pending,
            Self::Submitted => next != Self::Pending,
            Self::Failed => true,
        }
    }

    /// Validate a transition, returning the new status.
    pub fn transition(self, next: SyncStatus) -> crate::Result<SyncStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(crate::Error::InvalidStateTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| crate::Error::UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_roundtrip() {
        for status in SyncStatus::ALL {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
        assert!("done".parse::<SyncStatus>().is_err());
    }

    #[test]
    fn test_settled_statuses_never_move() {
        for next in SyncStatus::ALL {
            assert!(!SyncStatus::Verified.can_transition_to(next));
            assert!(!SyncStatus::AlreadyVerified.can_transition_to(next));
        }
    }

    #[test]
    fn test_failed_can_be_resubmitted() {
        assert!(SyncStatus::Failed.can_transition_to(SyncStatus::Submitted));
        assert!(SyncStatus::Failed.can_transition_to(SyncStatus::Pending));
        assert!(!SyncStatus::Submitted.can_transition_to(SyncStatus::Pending));
        assert_eq!(
            SyncStatus::Submitted.transition(SyncStatus::Verified).unwrap(),
            SyncStatus::Verified
        );
        assert!(SyncStatus::Verified.transition(SyncStatus::Failed).is_err());
    }

    #[test]
    fn test_terminal_classification() {
        assert!(!SyncStatus::Pending.is_terminal());
        assert!(!SyncStatus::Submitted.is_terminal());
        assert!(SyncStatus::Failed.is_terminal());
        assert!(SyncStatus::Submitted.needs_processing());
        assert!(!SyncStatus::Failed.needs_processing());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&SyncStatus::AlreadyVerified).unwrap();
        assert_eq!(json, "\"already_verified\"");
    }
}
