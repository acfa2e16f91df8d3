//! Remote authority request/response types
//!
//! Shapes of the JSON bodies exchanged with the remote API. Field names
//! follow the authority's wire contract (`accessToken`, `boothId`, ...).

use serde::{Deserialize, Serialize};

use crate::models::{AuditLogEntry, VoterRecord};

// =============================================================================
// Auth API DTOs
// =============================================================================

/// `POST /auth/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub booth_id: String,
}

/// `POST /auth/refresh`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Token issued by login or refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as Unix seconds
    pub exp: i64,
}

// =============================================================================
// Sync API DTOs
// =============================================================================

/// `POST /sync/audit-logs`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogBatch {
    pub logs: Vec<AuditLogEntry>,
    pub booth_id: String,
}

/// Acknowledgement of an audit batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogPushResponse {
    pub successful: u32,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl AuditLogPushResponse {
    /// The whole batch was accepted
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// `GET /sync/voters?booth_id=&since=`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterPullResponse {
    #[serde(default)]
    pub voters: Vec<VoterRecord>,
    /// Server-side cursor to resume from on the next pull
    pub watermark: i64,
}
