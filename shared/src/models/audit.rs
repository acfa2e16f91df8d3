//! Audit Log Model
//!
//! An [`AuditLogEntry`] is append-only: after it is written only the sync
//! flags (`is_synced`, `synced_at`) may change. The tamper-evidence tag is
//! computed over the canonical string of the immutable fields.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Delimiter joining the canonical tuple
pub const CANONICAL_DELIMITER: char = '|';

/// How the voter's identity was checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationMethod {
    Otp,
    Face,
    Document,
    Manual,
}

impl VerificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Otp => "OTP",
            Self::Face => "FACE",
            Self::Document => "DOCUMENT",
            Self::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a verification action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationResult {
    Success,
    Failed,
    Pending,
}

impl VerificationResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Pending => "PENDING",
        }
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verification action reported by the UI, before signing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationEvent {
    pub voter_id: String,
    pub booth_id: String,
    pub verification_method: VerificationMethod,
    pub verification_result: VerificationResult,
    #[serde(default)]
    pub failure_reason: Option<String>,
    /// Unix millis
    pub timestamp: i64,
}

impl VerificationEvent {
    pub fn canonical_string(&self) -> String {
        canonical_string(
            &self.voter_id,
            self.timestamp,
            self.verification_method,
            self.verification_result,
            &self.booth_id,
        )
    }
}

/// Persisted audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Assigned by the store on append, monotonically increasing
    pub local_id: u64,
    pub voter_id: String,
    pub booth_id: String,
    pub verification_method: VerificationMethod,
    pub verification_result: VerificationResult,
    #[serde(default)]
    pub failure_reason: Option<String>,
    /// Unix millis
    pub timestamp: i64,
    /// Hex HMAC-SHA256 over [`AuditLogEntry::canonical_string`]
    pub hmac_signature: String,
    #[serde(default)]
    pub is_synced: bool,
    #[serde(default)]
    pub synced_at: Option<i64>,
}

impl AuditLogEntry {
    /// Build an unsynced entry from a signed event; `local_id` is filled in by
    /// the store.
    pub fn from_event(event: VerificationEvent, hmac_signature: String) -> Self {
        Self {
            local_id: 0,
            voter_id: event.voter_id,
            booth_id: event.booth_id,
            verification_method: event.verification_method,
            verification_result: event.verification_result,
            failure_reason: event.failure_reason,
            timestamp: event.timestamp,
            hmac_signature,
            is_synced: false,
            synced_at: None,
        }
    }

    pub fn canonical_string(&self) -> String {
        canonical_string(
            &self.voter_id,
            self.timestamp,
            self.verification_method,
            self.verification_result,
            &self.booth_id,
        )
    }

    /// True when every field except the sync flags matches `other`
    pub fn same_immutable_fields(&self, other: &AuditLogEntry) -> bool {
        self.local_id == other.local_id
            && self.voter_id == other.voter_id
            && self.booth_id == other.booth_id
            && self.verification_method == other.verification_method
            && self.verification_result == other.verification_result
            && self.failure_reason == other.failure_reason
            && self.timestamp == other.timestamp
            && self.hmac_signature == other.hmac_signature
    }
}

/// `voter_id|timestamp|method|result|booth_id`
pub fn canonical_string(
    voter_id: &str,
    timestamp: i64,
    method: VerificationMethod,
    result: VerificationResult,
    booth_id: &str,
) -> String {
    let d = CANONICAL_DELIMITER;
    format!(
        "{voter_id}{d}{timestamp}{d}{}{d}{}{d}{booth_id}",
        method.as_str(),
        result.as_str()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> VerificationEvent {
        VerificationEvent {
            voter_id: "ABC1234567".to_string(),
            booth_id: "BOOTH-7".to_string(),
            verification_method: VerificationMethod::Otp,
            verification_result: VerificationResult::Success,
            failure_reason: None,
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_canonical_string_layout() {
        assert_eq!(
            event().canonical_string(),
            "ABC1234567|1700000000000|OTP|SUCCESS|BOOTH-7"
        );
    }

    #[test]
    fn test_entry_and_event_share_canonical_form() {
        let e = event();
        let entry = AuditLogEntry::from_event(e.clone(), "00".to_string());
        assert_eq!(entry.canonical_string(), e.canonical_string());
        assert!(!entry.is_synced);
        assert!(entry.synced_at.is_none());
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&VerificationMethod::Document).unwrap(),
            "\"DOCUMENT\""
        );
        assert_eq!(
            serde_json::to_string(&VerificationResult::Failed).unwrap(),
            "\"FAILED\""
        );
    }

    #[test]
    fn test_same_immutable_fields_ignores_sync_flags() {
        let a = AuditLogEntry::from_event(event(), "ab".to_string());
        let mut b = a.clone();
        b.is_synced = true;
        b.synced_at = Some(5);
        assert!(a.same_immutable_fields(&b));

        b.verification_result = VerificationResult::Failed;
        assert!(!a.same_immutable_fields(&b));
    }
}
