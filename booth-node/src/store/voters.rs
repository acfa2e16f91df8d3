//! Voter cache: pull application and directory lookups

use redb::ReadableTable;
use shared::models::{VoterRecord, sync_keys};

use super::{
    BoothStore, Collection, Query, StoreResult, SyncStatus, Voters, advance_sync_value,
};

/// What one pull response did to the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullApplied {
    /// Rows inserted or overwritten
    pub written: usize,
    /// Rows whose authoritative content already matched
    pub unchanged: usize,
    /// Cursor after the pull
    pub cursor: Option<i64>,
    pub cursor_advanced: bool,
}

impl BoothStore {
    /// Upsert pulled voters and advance the cursor in one transaction.
    ///
    /// Rows whose content is unchanged are not rewritten. The cursor moves
    /// only forward; a watermark at or below the stored one leaves it as is.
    pub fn apply_voter_pull(
        &self,
        voters: &[VoterRecord],
        watermark: i64,
        now: i64,
    ) -> StoreResult<PullApplied> {
        let txn = self.db.begin_write()?;
        let mut applied = PullApplied::default();
        {
            let mut table = txn.open_table(Voters::table())?;
            for voter in voters {
                let existing: Option<VoterRecord> = table
                    .get(voter.voter_id.as_str())?
                    .map(|value| serde_json::from_slice(value.value()))
                    .transpose()?;

                if existing.is_some_and(|current| current.same_content(voter)) {
                    applied.unchanged += 1;
                    continue;
                }

                let record = VoterRecord {
                    last_synced_at: Some(now),
                    ..voter.clone()
                };
                let value = serde_json::to_vec(&record)?;
                table.insert(Voters::key(&record).as_str(), value.as_slice())?;
                applied.written += 1;
            }

            let mut status = txn.open_table(SyncStatus::table())?;
            applied.cursor_advanced =
                advance_sync_value(&mut status, sync_keys::LAST_SYNC, watermark, now)?;
        }

        if applied.written > 0 || applied.cursor_advanced {
            txn.commit()?;
        } else {
            txn.abort()?;
        }

        applied.cursor = self.sync_cursor()?;
        Ok(applied)
    }

    pub fn get_voter(&self, voter_id: &str) -> StoreResult<Option<VoterRecord>> {
        self.get::<Voters>(voter_id)
    }

    /// Case-insensitive match on voter-id prefix or name; active voters
    /// first, each group in voter-id order.
    pub fn search_voters(&self, text: &str, limit: usize) -> StoreResult<Vec<VoterRecord>> {
        let needle = text.trim().to_lowercase();
        let matches = |voter: &VoterRecord| {
            needle.is_empty()
                || voter.voter_id.to_lowercase().starts_with(&needle)
                || voter.full_name.to_lowercase().contains(&needle)
        };

        let mut found = self.query::<Voters>(
            &Query::new(limit).filter(|voter: &VoterRecord| voter.is_active && matches(voter)),
        )?;

        let remaining = limit.saturating_sub(found.len());
        if remaining > 0 {
            found.extend(self.query::<Voters>(
                &Query::new(remaining)
                    .filter(|voter: &VoterRecord| !voter.is_active && matches(voter)),
            )?);
        }
        Ok(found)
    }

    pub fn voter_count(&self) -> StoreResult<u64> {
        self.count::<Voters>()
    }
}
