// shared/src/models/sync.rs
use serde::{Deserialize, Serialize};

/// SyncStatus collection keys
pub mod sync_keys {
    /// Pull watermark reported by the authority
    pub const LAST_SYNC: &str = "last_sync";
    /// Wall-clock time of the last cycle that made progress
    pub const LAST_SUCCESS_AT: &str = "last_success_at";
}

/// Row of the SyncStatus collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatusEntry {
    pub key: String,
    pub value: i64,
    pub updated_at: i64,
}

/// Local counters kept next to the audit log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoothStats {
    pub verifications_total: u64,
    pub verifications_success: u64,
    pub verifications_failed: u64,
    /// Audit entries waiting to be pushed
    pub audit_pending: u64,
}
