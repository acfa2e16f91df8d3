//! OTP verification ledger
//!
//! Tracks dispatched one-time passwords until they are verified (row removed),
//! fail, or expire. Validity comes from `otp_ttl_secs` in the operator
//! settings. Expired rows are purged after a grace window.

use std::sync::Arc;

use serde::Serialize;
use shared::Clock;
use shared::models::{OtpStatus, OtpVerificationRecord};

use crate::error::{BoothError, BoothResult};
use crate::settings::SettingsService;
use crate::store::{BoothStore, OtpVerifications};

/// Outcome of resolving an OTP attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OtpOutcome {
    Verified,
    Failed { attempts: u32 },
    Expired,
}

#[derive(Debug, Clone)]
pub struct OtpLedger {
    store: BoothStore,
    settings: SettingsService,
    clock: Arc<dyn Clock>,
}

impl OtpLedger {
    pub fn new(store: BoothStore, settings: SettingsService, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            settings,
            clock,
        }
    }

    /// Record that an OTP was sent to `voter_id`
    pub fn record_dispatch(&self, voter_id: &str) -> BoothResult<OtpVerificationRecord> {
        if voter_id.trim().is_empty() {
            return Err(BoothError::validation("voter_id is required"));
        }
        let ttl_secs = self.settings.current().otp_ttl_secs;
        if ttl_secs <= 0 {
            return Err(BoothError::validation("OTP ttl must be positive"));
        }

        let now = self.clock.now_millis();
        let record = OtpVerificationRecord {
            verification_id: shared::util::new_id(),
            voter_id: voter_id.to_string(),
            status: OtpStatus::Pending,
            attempts: 0,
            expires_at: now + ttl_secs * 1000,
            created_at: now,
        };
        self.store.put::<OtpVerifications>(&record)?;

        tracing::debug!(
            verification_id = %record.verification_id,
            voter_id = %voter_id,
            expires_at = record.expires_at,
            "OTP dispatched"
        );
        Ok(record)
    }

    pub fn get(&self, verification_id: &str) -> BoothResult<Option<OtpVerificationRecord>> {
        Ok(self.store.get::<OtpVerifications>(verification_id)?)
    }

    /// Apply the result of an OTP check.
    ///
    /// Success removes the row; a failure bumps the attempt counter. Past
    /// `expires_at` the row is marked expired whatever the check said.
    pub fn resolve(&self, verification_id: &str, success: bool) -> BoothResult<OtpOutcome> {
        let mut record = self
            .store
            .get::<OtpVerifications>(verification_id)?
            .ok_or_else(|| {
                BoothError::validation(format!("Unknown OTP verification: {verification_id}"))
            })?;

        let now = self.clock.now_millis();
        if record.status == OtpStatus::Expired || record.is_expired_at(now) {
            if record.status != OtpStatus::Expired {
                record.status = OtpStatus::Expired;
                self.store.put::<OtpVerifications>(&record)?;
            }
            return Ok(OtpOutcome::Expired);
        }

        if success {
            self.store.delete::<OtpVerifications>(verification_id)?;
            tracing::debug!(verification_id = %verification_id, "OTP verified");
            return Ok(OtpOutcome::Verified);
        }

        record.attempts += 1;
        record.status = OtpStatus::Failed;
        self.store.put::<OtpVerifications>(&record)?;
        Ok(OtpOutcome::Failed {
            attempts: record.attempts,
        })
    }

    /// Delete rows whose expiry plus `grace_secs` has passed
    pub fn purge_expired(&self, grace_secs: i64) -> BoothResult<usize> {
        let cutoff = self.clock.now_millis() - grace_secs.max(0) * 1000;
        let removed = self
            .store
            .delete_where::<OtpVerifications>(|record| record.expires_at <= cutoff)?;
        if removed > 0 {
            tracing::info!(removed, "Purged expired OTP verifications");
        }
        Ok(removed)
    }
}
