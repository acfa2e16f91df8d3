//! Audit log persistence
//!
//! Appends assign `local_id` from the `audit_seq` counter and bump the booth
//! statistics in the same transaction. Afterwards only the sync flags move.

use redb::ReadableTable;
use shared::models::{AuditLogEntry, VerificationResult};

use super::{
    AUDIT_PENDING_KEY, AUDIT_SEQ_KEY, AuditLogs, BoothStore, COUNTERS_TABLE, Collection, Query,
    StoreResult, VERIFICATIONS_FAILED_KEY, VERIFICATIONS_SUCCESS_KEY, VERIFICATIONS_TOTAL_KEY,
    adjust_counter,
};

impl BoothStore {
    /// Persist a signed entry; returns it with its assigned `local_id`
    pub fn append_audit(&self, mut entry: AuditLogEntry) -> StoreResult<AuditLogEntry> {
        let txn = self.db.begin_write()?;
        {
            let mut counters = txn.open_table(COUNTERS_TABLE)?;
            entry.local_id = adjust_counter(&mut counters, AUDIT_SEQ_KEY, 1)?;
            entry.is_synced = false;
            entry.synced_at = None;

            adjust_counter(&mut counters, VERIFICATIONS_TOTAL_KEY, 1)?;
            match entry.verification_result {
                VerificationResult::Success => {
                    adjust_counter(&mut counters, VERIFICATIONS_SUCCESS_KEY, 1)?;
                }
                VerificationResult::Failed => {
                    adjust_counter(&mut counters, VERIFICATIONS_FAILED_KEY, 1)?;
                }
                VerificationResult::Pending => {}
            }
            adjust_counter(&mut counters, AUDIT_PENDING_KEY, 1)?;

            let mut table = txn.open_table(AuditLogs::table())?;
            let value = serde_json::to_vec(&entry)?;
            table.insert(AuditLogs::key(&entry).as_str(), value.as_slice())?;
        }
        txn.commit()?;
        Ok(entry)
    }

    pub fn get_audit(&self, local_id: u64) -> StoreResult<Option<AuditLogEntry>> {
        self.get::<AuditLogs>(&AuditLogs::key_for(local_id))
    }

    /// Unsynced entries in append order, resuming after `after_id`
    pub fn pending_audit(
        &self,
        after_id: Option<u64>,
        limit: usize,
    ) -> StoreResult<Vec<AuditLogEntry>> {
        let mut query = Query::new(limit).filter(|entry: &AuditLogEntry| !entry.is_synced);
        if let Some(id) = after_id {
            query = query.after(AuditLogs::key_for(id));
        }
        self.query::<AuditLogs>(&query)
    }

    /// Entries in append order, resuming after `after_id`
    pub fn audit_page(
        &self,
        after_id: Option<u64>,
        limit: usize,
    ) -> StoreResult<Vec<AuditLogEntry>> {
        let mut query = Query::new(limit);
        if let Some(id) = after_id {
            query = query.after(AuditLogs::key_for(id));
        }
        self.query::<AuditLogs>(&query)
    }

    /// Flag exactly these entries as delivered. Unknown or already synced
    /// ids are skipped; returns how many rows changed.
    pub fn mark_audit_synced(&self, local_ids: &[u64], now: i64) -> StoreResult<usize> {
        let txn = self.db.begin_write()?;
        let updated = {
            let mut table = txn.open_table(AuditLogs::table())?;
            let mut updated = 0usize;

            for id in local_ids {
                let key = AuditLogs::key_for(*id);
                let existing: Option<AuditLogEntry> = table
                    .get(key.as_str())?
                    .map(|value| serde_json::from_slice(value.value()))
                    .transpose()?;

                let Some(mut entry) = existing else {
                    continue;
                };
                if entry.is_synced {
                    continue;
                }

                entry.is_synced = true;
                entry.synced_at = Some(now);
                let value = serde_json::to_vec(&entry)?;
                table.insert(key.as_str(), value.as_slice())?;
                updated += 1;
            }

            if updated > 0 {
                let mut counters = txn.open_table(COUNTERS_TABLE)?;
                adjust_counter(&mut counters, AUDIT_PENDING_KEY, -(updated as i64))?;
            }
            updated
        };

        if updated > 0 {
            txn.commit()?;
        } else {
            txn.abort()?;
        }
        Ok(updated)
    }

    /// Retention cleanup: delete synced rows delivered before `cutoff`
    pub fn purge_synced_audit_before(&self, cutoff: i64) -> StoreResult<usize> {
        self.delete_where::<AuditLogs>(|entry| {
            entry.synced_at.is_some_and(|synced_at| synced_at < cutoff)
        })
    }

    pub fn pending_audit_count(&self) -> StoreResult<u64> {
        Ok(self.stats()?.audit_pending)
    }
}
