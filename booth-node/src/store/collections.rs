//! Named collections held by the store
//!
//! | Collection | Key | Record |
//! |------------|-----|--------|
//! | `voters` | `voter_id` | [`VoterRecord`] |
//! | `audit_logs` | zero-padded `local_id` | [`AuditLogEntry`] |
//! | `otp_verifications` | `verification_id` | [`OtpVerificationRecord`] |
//! | `config` | `key` | [`ConfigEntry`] |
//! | `sync_status` | `key` | [`SyncStatusEntry`] |
//!
//! Audit rows are keyed so that lexicographic key order equals append order.

use redb::TableDefinition;
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::models::{
    AuditLogEntry, ConfigEntry, OtpVerificationRecord, SyncStatusEntry, VoterRecord,
};

/// A typed, keyed collection stored as JSON values
pub trait Collection {
    const NAME: &'static str;

    type Record: Serialize + DeserializeOwned;

    /// Unique key of a record
    fn key(record: &Self::Record) -> String;

    /// Whether bulk deletion may remove this record
    fn deletable(_record: &Self::Record) -> bool {
        true
    }

    fn table() -> TableDefinition<'static, &'static str, &'static [u8]> {
        TableDefinition::new(Self::NAME)
    }
}

/// Collections that accept generic `put`/`bulk_put` upserts.
///
/// Audit rows change only through append and mark-synced; sync status rows
/// only through the monotonic cursor and success writers.
pub trait Upsertable: Collection {}

pub struct Voters;

impl Collection for Voters {
    const NAME: &'static str = "voters";
    type Record = VoterRecord;

    fn key(record: &VoterRecord) -> String {
        record.voter_id.clone()
    }
}

impl Upsertable for Voters {}

pub struct AuditLogs;

impl AuditLogs {
    pub fn key_for(local_id: u64) -> String {
        format!("{local_id:020}")
    }
}

impl Collection for AuditLogs {
    const NAME: &'static str = "audit_logs";
    type Record = AuditLogEntry;

    fn key(record: &AuditLogEntry) -> String {
        Self::key_for(record.local_id)
    }

    /// Only rows already delivered to the authority may be purged
    fn deletable(record: &AuditLogEntry) -> bool {
        record.is_synced
    }
}

pub struct OtpVerifications;

impl Collection for OtpVerifications {
    const NAME: &'static str = "otp_verifications";
    type Record = OtpVerificationRecord;

    fn key(record: &OtpVerificationRecord) -> String {
        record.verification_id.clone()
    }
}

impl Upsertable for OtpVerifications {}

pub struct Config;

impl Collection for Config {
    const NAME: &'static str = "config";
    type Record = ConfigEntry;

    fn key(record: &ConfigEntry) -> String {
        record.key.clone()
    }
}

impl Upsertable for Config {}

pub struct SyncStatus;

impl Collection for SyncStatus {
    const NAME: &'static str = "sync_status";
    type Record = SyncStatusEntry;

    fn key(record: &SyncStatusEntry) -> String {
        record.key.clone()
    }
}

/// Names of every collection, in export order
pub const COLLECTION_NAMES: [&str; 5] = [
    Voters::NAME,
    AuditLogs::NAME,
    OtpVerifications::NAME,
    Config::NAME,
    SyncStatus::NAME,
];
