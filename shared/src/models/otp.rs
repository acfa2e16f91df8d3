//! OTP Verification Model

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OtpStatus {
    Pending,
    Failed,
    Expired,
}

/// Ephemeral record of a dispatched one-time password
///
/// Removed on successful verification, or by the expiry purge once
/// `expires_at` plus the grace window has passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpVerificationRecord {
    pub verification_id: String,
    pub voter_id: String,
    pub status: OtpStatus,
    /// Failed verification attempts so far
    #[serde(default)]
    pub attempts: u32,
    pub expires_at: i64,
    pub created_at: i64,
}

impl OtpVerificationRecord {
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}
