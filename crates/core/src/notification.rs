//! Payload of the `new_verified_contract` notification channel.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One newly inserted verified contract, as announced on the notification feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedContractNotification {
    /// Verified contract row id.
    pub id: i64,
    /// Provenance tag of the writer.
    pub created_by: String,
    pub deployment_id: Uuid,
    pub compilation_id: Uuid,
}

impl VerifiedContractNotification {
    /// Parse a raw JSON payload.
    pub fn parse(payload: &str) -> crate::Result<Self> {
        serde_json::from_str(payload).map_err(|e| crate::Error::InvalidNotification(e.to_string()))
    }

    /// True when the row was written by this system itself.
    pub fn is_self_origin(&self, self_provenance: &str) -> bool {
        self.created_by == self_provenance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload_with_extra_fields() {
        let payload = r#"{
            "id": 192,
            "created_by": "routescan",
            "deployment_id": "4f9f1f56-0d4e-4d7a-9a55-5c0e6f0d8a11",
            "compilation_id": "b6a9d0a4-6c1c-4b8e-8a0e-1a2b3c4d5e6f",
            "creation_match": true
        }"#;
        let notification = VerifiedContractNotification::parse(payload).unwrap();
        assert_eq!(notification.id, 192);
        assert!(!notification.is_self_origin("sourcify"));
        assert!(notification.is_self_origin("routescan"));
    }

    #[test]
    fn test_parse_rejects_missing_fields() {
        let err = VerifiedContractNotification::parse(r#"{"id": 1}"#).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidNotification(_)));
    }
}
