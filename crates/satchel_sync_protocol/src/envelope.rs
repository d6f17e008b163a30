//! Mutation envelopes: the per-item push form sent to the remote.

use crate::item::QueueOp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single mutation as transmitted to the remote backup service.
///
/// The payload is encrypted before it leaves the device; the remote only
/// sees routing metadata (device, user, collection, record id) so it can
/// attribute writes to their origin and apply last-writer-wins.
///
/// Envelope ids equal the queue item ids they were built from, which
/// makes replay after a retry idempotent on the remote side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationEnvelope {
    /// Queue item id this envelope was built from.
    pub item_id: Uuid,
    /// Originating device.
    pub device_id: String,
    /// Owning user.
    pub user_id: String,
    /// The mutation kind.
    pub op: QueueOp,
    /// Collection the mutation applies to.
    pub collection: String,
    /// Primary key of the affected record.
    pub record_id: String,
    /// AES-256-GCM ciphertext of the record payload. None for deletes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_payload: Option<Vec<u8>>,
    /// Original enqueue time, Unix millis.
    pub timestamp_ms: u64,
}

/// Generic acknowledgement returned by the remote for push operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    /// Whether the remote accepted the request.
    pub success: bool,
    /// Error description when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Ack {
    /// Creates a success acknowledgement.
    #[must_use]
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// Creates an error acknowledgement.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_envelope() -> MutationEnvelope {
        MutationEnvelope {
            item_id: Uuid::new_v4(),
            device_id: "dev-1".into(),
            user_id: "user-1".into(),
            op: QueueOp::Update,
            collection: "tasks".into(),
            record_id: "t1".into(),
            encrypted_payload: Some(vec![0xDE, 0xAD]),
            timestamp_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn envelope_serde_roundtrip() {
        let envelope = make_envelope();
        let bytes = serde_json::to_vec(&envelope).unwrap();
        let decoded: MutationEnvelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn envelope_uses_camel_case_fields() {
        let json = serde_json::to_string(&make_envelope()).unwrap();
        assert!(json.contains("\"deviceId\""));
        assert!(json.contains("\"recordId\""));
        assert!(json.contains("\"encryptedPayload\""));
    }

    #[test]
    fn delete_envelope_omits_payload_field() {
        let mut envelope = make_envelope();
        envelope.op = QueueOp::Delete;
        envelope.encrypted_payload = None;

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(!json.contains("encryptedPayload"));
    }

    #[test]
    fn ack_constructors() {
        let ok = Ack::success();
        assert!(ok.success);
        assert!(ok.error.is_none());

        let err = Ack::error("quota exceeded");
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("quota exceeded"));
    }
}
