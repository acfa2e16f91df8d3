//! redb-based durable store for the booth
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `voters` | `voter_id` | `VoterRecord` | Cached authoritative voters (pull only) |
//! | `audit_logs` | `{local_id:020}` | `AuditLogEntry` | Signed verification events (append-only) |
//! | `otp_verifications` | `verification_id` | `OtpVerificationRecord` | Ephemeral OTP state |
//! | `config` | key | `ConfigEntry` | Booth config, settings, secret, init marker |
//! | `sync_status` | key | `SyncStatusEntry` | Sync cursor, last success |
//! | `counters` | name | `u64` | Audit sequence and booth statistics |
//!
//! # Durability
//!
//! redb commits with `Durability::Immediate`: once `commit()` returns the
//! write survives power loss. Operations that touch several tables (audit
//! append + counters, voter upsert + cursor) run in a single transaction.

mod audit;
pub mod collections;
pub mod error;
pub mod query;
mod voters;

pub use collections::{
    AuditLogs, Collection, Config, OtpVerifications, SyncStatus, Upsertable, Voters,
};
pub use error::{StoreError, StoreResult};
pub use query::{MAX_QUERY_LIMIT, Order, Query};
pub use voters::PullApplied;

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, Table, TableDefinition,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::models::{
    BoothStats, ConfigEntry, InitializedMarker, SyncStatusEntry, config_keys, sync_keys,
};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

use collections::COLLECTION_NAMES;

/// Current on-disk layout version, recorded in the init marker
pub const SCHEMA_VERSION: u32 = 1;

/// Counters: key = counter name, value = u64
const COUNTERS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("counters");

const AUDIT_SEQ_KEY: &str = "audit_seq";
const VERIFICATIONS_TOTAL_KEY: &str = "verifications_total";
const VERIFICATIONS_SUCCESS_KEY: &str = "verifications_success";
const VERIFICATIONS_FAILED_KEY: &str = "verifications_failed";
const AUDIT_PENDING_KEY: &str = "audit_pending";

/// Every collection as ordered `(key, json)` rows, plus the counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreExport {
    pub collections: BTreeMap<String, Vec<(String, String)>>,
    pub counters: BTreeMap<String, u64>,
}

/// Booth store backed by redb
#[derive(Clone)]
pub struct BoothStore {
    db: Arc<Database>,
}

impl std::fmt::Debug for BoothStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoothStore").finish_non_exhaustive()
    }
}

impl BoothStore {
    /// Open or create the database at the given path
    ///
    /// A database locked by another process or an unwritable directory
    /// yields [`StoreError::Unavailable`]; the call is safe to retry.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("{}: {e}", parent.display()))
            })?;
        }

        let db = Database::create(path).map_err(StoreError::from_open)?;
        Self::with_tables(db)
    }

    /// Open an in-memory database (tests, dry runs)
    pub fn open_in_memory() -> StoreResult<Self> {
        let db =
            Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::with_tables(db)
    }

    fn with_tables(db: Database) -> StoreResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(Voters::table())?;
            let _ = write_txn.open_table(AuditLogs::table())?;
            let _ = write_txn.open_table(OtpVerifications::table())?;
            let _ = write_txn.open_table(Config::table())?;
            let _ = write_txn.open_table(SyncStatus::table())?;
            let _ = write_txn.open_table(COUNTERS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Write the `initialized` marker on first run; idempotent afterwards
    pub fn initialize(&self, now: i64) -> StoreResult<InitializedMarker> {
        let (marker, created) = self.get_or_init_config(config_keys::INITIALIZED, || {
            InitializedMarker {
                schema_version: SCHEMA_VERSION,
                created_at: now,
            }
        })?;

        if created {
            tracing::info!(schema_version = marker.schema_version, "Store initialized");
        } else if marker.schema_version != SCHEMA_VERSION {
            tracing::warn!(
                stored = marker.schema_version,
                current = SCHEMA_VERSION,
                "Store schema version differs from this build"
            );
        }
        Ok(marker)
    }

    // ========== Generic collection operations ==========

    pub fn get<C: Collection>(&self, key: &str) -> StoreResult<Option<C::Record>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(C::table())?;

        match table.get(key)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Upsert by the collection's unique key
    pub fn put<C: Upsertable>(&self, record: &C::Record) -> StoreResult<()> {
        self.bulk_put::<C>(std::slice::from_ref(record)).map(|_| ())
    }

    /// Upsert many records in one transaction
    pub fn bulk_put<C: Upsertable>(&self, records: &[C::Record]) -> StoreResult<usize> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(C::table())?;
            for record in records {
                let value = serde_json::to_vec(record)?;
                table.insert(C::key(record).as_str(), value.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(records.len())
    }

    /// Bounded, key-ordered scan
    pub fn query<C: Collection>(&self, query: &Query<'_, C::Record>) -> StoreResult<Vec<C::Record>> {
        let mut records = Vec::new();
        if query.limit == 0 {
            return Ok(records);
        }

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(C::table())?;

        let range = match (query.order, query.after.as_deref()) {
            (_, None) => table.iter()?,
            (Order::Ascending, Some(after)) => {
                table.range::<&str>((Bound::Excluded(after), Bound::Unbounded))?
            }
            (Order::Descending, Some(after)) => {
                table.range::<&str>((Bound::Unbounded, Bound::Excluded(after)))?
            }
        };

        let mut accept = |value: &[u8]| -> StoreResult<bool> {
            let record: C::Record = serde_json::from_slice(value)?;
            if query.matches(&record) {
                records.push(record);
            }
            Ok(records.len() < query.limit)
        };

        match query.order {
            Order::Ascending => {
                for item in range {
                    let (_key, value) = item?;
                    if !accept(value.value())? {
                        break;
                    }
                }
            }
            Order::Descending => {
                for item in range.rev() {
                    let (_key, value) = item?;
                    if !accept(value.value())? {
                        break;
                    }
                }
            }
        }

        Ok(records)
    }

    /// Remove one record; refuses records the collection marks non-deletable
    pub fn delete<C: Collection>(&self, key: &str) -> StoreResult<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(C::table())?;
            let existing: Option<C::Record> = table
                .get(key)?
                .map(|value| serde_json::from_slice(value.value()))
                .transpose()?;

            match existing {
                None => false,
                Some(record) if !C::deletable(&record) => {
                    return Err(StoreError::Immutable {
                        collection: C::NAME,
                        key: key.to_string(),
                    });
                }
                Some(_) => {
                    table.remove(key)?;
                    true
                }
            }
        };

        if removed {
            txn.commit()?;
        } else {
            txn.abort()?;
        }
        Ok(removed)
    }

    /// Bulk delete for retention and expiry; non-deletable records are kept
    pub fn delete_where<C: Collection>(
        &self,
        predicate: impl Fn(&C::Record) -> bool,
    ) -> StoreResult<usize> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(C::table())?;
            let mut doomed = Vec::new();
            for item in table.iter()? {
                let (key, value) = item?;
                let record: C::Record = serde_json::from_slice(value.value())?;
                if predicate(&record) && C::deletable(&record) {
                    doomed.push(key.value().to_string());
                }
            }
            for key in &doomed {
                table.remove(key.as_str())?;
            }
            doomed.len()
        };

        if removed > 0 {
            txn.commit()?;
            tracing::debug!(collection = C::NAME, removed, "Bulk delete committed");
        } else {
            txn.abort()?;
        }
        Ok(removed)
    }

    pub fn count<C: Collection>(&self) -> StoreResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(C::table())?;
        Ok(table.len()?)
    }

    // ========== Config ==========

    pub fn get_config<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.get::<Config>(key)? {
            Some(entry) => Ok(Some(serde_json::from_value(entry.value)?)),
            None => Ok(None),
        }
    }

    pub fn put_config<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        self.put::<Config>(&ConfigEntry {
            key: key.to_string(),
            value: serde_json::to_value(value)?,
        })
    }

    /// Read `key`, or write `init()` if absent, in one write transaction.
    ///
    /// Returns the value and whether it was created by this call; concurrent
    /// callers observe exactly one creation.
    pub fn get_or_init_config<T, F>(&self, key: &str, init: F) -> StoreResult<(T, bool)>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        let txn = self.db.begin_write()?;
        let existing: Option<ConfigEntry> = {
            let table = txn.open_table(Config::table())?;
            table
                .get(key)?
                .map(|value| serde_json::from_slice(value.value()))
                .transpose()?
        };

        if let Some(entry) = existing {
            txn.abort()?;
            return Ok((serde_json::from_value(entry.value)?, false));
        }

        let value = init();
        {
            let mut table = txn.open_table(Config::table())?;
            let entry = ConfigEntry {
                key: key.to_string(),
                value: serde_json::to_value(&value)?,
            };
            table.insert(key, serde_json::to_vec(&entry)?.as_slice())?;
        }
        txn.commit()?;
        Ok((value, true))
    }

    // ========== Sync status ==========

    fn sync_value(&self, key: &str) -> StoreResult<Option<i64>> {
        Ok(self.get::<SyncStatus>(key)?.map(|entry| entry.value))
    }

    /// Server watermark of the last fully applied pull
    pub fn sync_cursor(&self) -> StoreResult<Option<i64>> {
        self.sync_value(sync_keys::LAST_SYNC)
    }

    pub fn last_success_at(&self) -> StoreResult<Option<i64>> {
        self.sync_value(sync_keys::LAST_SUCCESS_AT)
    }

    /// Record a successful cycle; never moves the timestamp backwards
    pub fn record_sync_success(&self, at: i64) -> StoreResult<bool> {
        let txn = self.db.begin_write()?;
        let advanced = {
            let mut table = txn.open_table(SyncStatus::table())?;
            advance_sync_value(&mut table, sync_keys::LAST_SUCCESS_AT, at, at)?
        };
        if advanced {
            txn.commit()?;
        } else {
            txn.abort()?;
        }
        Ok(advanced)
    }

    // ========== Counters ==========

    pub fn stats(&self) -> StoreResult<BoothStats> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(COUNTERS_TABLE)?;
        let read = |key: &str| -> StoreResult<u64> {
            Ok(table.get(key)?.map(|guard| guard.value()).unwrap_or(0))
        };

        Ok(BoothStats {
            verifications_total: read(VERIFICATIONS_TOTAL_KEY)?,
            verifications_success: read(VERIFICATIONS_SUCCESS_KEY)?,
            verifications_failed: read(VERIFICATIONS_FAILED_KEY)?,
            audit_pending: read(AUDIT_PENDING_KEY)?,
        })
    }

    // ========== Export ==========

    /// Snapshot every table in key order. The HMAC secret never leaves the
    /// store, so its config row is left out.
    pub fn export(&self) -> StoreResult<StoreExport> {
        let read_txn = self.db.begin_read()?;
        let mut export = StoreExport::default();

        for name in COLLECTION_NAMES {
            let table = read_txn.open_table(TableDefinition::<&str, &[u8]>::new(name))?;
            let mut rows = Vec::new();
            for item in table.iter()? {
                let (key, value) = item?;
                if name == Config::NAME && key.value() == config_keys::HMAC_SECRET {
                    continue;
                }
                rows.push((
                    key.value().to_string(),
                    String::from_utf8_lossy(value.value()).into_owned(),
                ));
            }
            export.collections.insert(name.to_string(), rows);
        }

        let counters = read_txn.open_table(COUNTERS_TABLE)?;
        for item in counters.iter()? {
            let (key, value) = item?;
            export.counters.insert(key.value().to_string(), value.value());
        }

        Ok(export)
    }
}

/// Add `delta` to a counter (saturating at zero) and return the new value
fn adjust_counter(
    table: &mut Table<'_, &'static str, u64>,
    key: &str,
    delta: i64,
) -> StoreResult<u64> {
    let current = table.get(key)?.map(|guard| guard.value()).unwrap_or(0);
    let next = current.saturating_add_signed(delta);
    table.insert(key, next)?;
    Ok(next)
}

/// Write a sync status value only if it is strictly greater than the stored one
fn advance_sync_value(
    table: &mut Table<'_, &'static str, &'static [u8]>,
    key: &str,
    value: i64,
    now: i64,
) -> StoreResult<bool> {
    let current: Option<SyncStatusEntry> = table
        .get(key)?
        .map(|guard| serde_json::from_slice(guard.value()))
        .transpose()?;

    if current.is_some_and(|entry| entry.value >= value) {
        return Ok(false);
    }

    let entry = SyncStatusEntry {
        key: key.to_string(),
        value,
        updated_at: now,
    };
    table.insert(key, serde_json::to_vec(&entry)?.as_slice())?;
    Ok(true)
}
