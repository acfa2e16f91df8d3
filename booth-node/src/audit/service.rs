//! Audit log service
//!
//! `AuditService` signs verification events, appends them to the store and
//! re-derives tags on demand to detect later modification.

use serde::Serialize;
use shared::models::{AuditLogEntry, BoothStats, VerificationEvent};

use super::signer::AuditSigner;
use crate::error::{BoothError, BoothResult};
use crate::store::{BoothStore, StoreError};

/// Entries read per page when verifying the whole log
const VERIFY_PAGE_SIZE: usize = 500;

/// Result of re-deriving tags over the audit log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditVerification {
    /// Entries checked
    pub total_entries: u64,
    /// No mismatch found
    pub intact: bool,
    /// `local_id`s whose stored fields no longer match their tag
    pub tampered: Vec<u64>,
}

#[derive(Debug, Clone)]
pub struct AuditService {
    store: BoothStore,
    signer: AuditSigner,
}

impl AuditService {
    pub fn new(store: BoothStore, signer: AuditSigner) -> Self {
        Self { store, signer }
    }

    /// Sign and append a verification event
    pub fn record(&self, event: VerificationEvent) -> BoothResult<AuditLogEntry> {
        validate_event(&event)?;

        let signature = self.signer.sign_event(&event);
        let entry = self
            .store
            .append_audit(AuditLogEntry::from_event(event, signature))?;

        tracing::info!(
            target: "audit",
            local_id = entry.local_id,
            voter_id = %entry.voter_id,
            booth_id = %entry.booth_id,
            method = %entry.verification_method,
            result = %entry.verification_result,
            "Verification recorded"
        );
        Ok(entry)
    }

    /// Whether the stored entry still matches its tag
    pub fn verify_entry(&self, local_id: u64) -> BoothResult<bool> {
        let entry = self
            .store
            .get_audit(local_id)?
            .ok_or_else(|| StoreError::NotFound {
                collection: "audit_logs",
                key: local_id.to_string(),
            })?;

        let intact = self.signer.verify(&entry);
        if !intact {
            tracing::error!(target: "audit", local_id, "Audit entry failed integrity check");
        }
        Ok(intact)
    }

    /// Check up to `limit` entries in append order
    pub fn verify_all(&self, limit: usize) -> BoothResult<AuditVerification> {
        let mut report = AuditVerification {
            intact: true,
            ..AuditVerification::default()
        };
        let mut after = None;
        let mut remaining = limit;

        while remaining > 0 {
            let page = self
                .store
                .audit_page(after, remaining.min(VERIFY_PAGE_SIZE))?;
            let Some(last) = page.last() else {
                break;
            };
            after = Some(last.local_id);
            remaining -= page.len();

            for entry in &page {
                report.total_entries += 1;
                if !self.signer.verify(entry) {
                    report.tampered.push(entry.local_id);
                }
            }
        }

        report.intact = report.tampered.is_empty();
        if !report.intact {
            tracing::error!(
                target: "audit",
                checked = report.total_entries,
                tampered = ?report.tampered,
                "Audit log integrity check found mismatches"
            );
        }
        Ok(report)
    }

    /// Retention cleanup; rows not yet delivered are never removed
    pub fn purge_synced_before(&self, cutoff: i64) -> BoothResult<usize> {
        let removed = self.store.purge_synced_audit_before(cutoff)?;
        if removed > 0 {
            tracing::info!(removed, cutoff, "Purged synced audit entries");
        }
        Ok(removed)
    }

    pub fn pending_count(&self) -> BoothResult<u64> {
        Ok(self.store.pending_audit_count()?)
    }

    pub fn stats(&self) -> BoothResult<BoothStats> {
        Ok(self.store.stats()?)
    }

    pub fn signer(&self) -> &AuditSigner {
        &self.signer
    }
}

fn validate_event(event: &VerificationEvent) -> BoothResult<()> {
    if event.voter_id.trim().is_empty() {
        return Err(BoothError::validation("voter_id is required"));
    }
    if event.booth_id.trim().is_empty() {
        return Err(BoothError::validation("booth_id is required"));
    }
    if event.timestamp <= 0 {
        return Err(BoothError::validation("timestamp must be positive"));
    }
    if event.voter_id.contains(shared::models::CANONICAL_DELIMITER)
        || event.booth_id.contains(shared::models::CANONICAL_DELIMITER)
    {
        return Err(BoothError::validation(
            "voter_id and booth_id may not contain the canonical delimiter",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::signer::{ConfigSecretStore, SECRET_LEN};
    use crate::error::ErrorKind;
    use shared::models::{VerificationMethod, VerificationResult};

    fn service() -> (BoothStore, AuditService) {
        let store = BoothStore::open_in_memory().unwrap();
        let signer = AuditSigner::new(&ConfigSecretStore::new(store.clone())).unwrap();
        (store.clone(), AuditService::new(store, signer))
    }

    fn event(voter: &str, result: VerificationResult) -> VerificationEvent {
        VerificationEvent {
            voter_id: voter.to_string(),
            booth_id: "BOOTH-7".to_string(),
            verification_method: VerificationMethod::Document,
            verification_result: result,
            failure_reason: None,
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_record_signs_and_counts() {
        let (store, audit) = service();
        let entry = audit
            .record(event("V1", VerificationResult::Success))
            .unwrap();
        assert_eq!(entry.local_id, 1);
        assert!(audit.signer().verify(&entry));
        assert!(audit.verify_entry(1).unwrap());
        assert_eq!(audit.pending_count().unwrap(), 1);
        assert_eq!(store.stats().unwrap().verifications_success, 1);
    }

    #[test]
    fn test_invalid_events_are_rejected() {
        let (_store, audit) = service();
        let err = audit
            .record(event("", VerificationResult::Success))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = audit
            .record(event("V1|x", VerificationResult::Success))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(audit.pending_count().unwrap(), 0);
    }

    #[test]
    fn test_verify_missing_entry() {
        let (_store, audit) = service();
        let err = audit.verify_entry(9).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_verify_all_pages_through_log() {
        let (_store, audit) = service();
        for i in 0..1_203 {
            audit
                .record(event(&format!("V{i}"), VerificationResult::Success))
                .unwrap();
        }

        let report = audit.verify_all(usize::MAX).unwrap();
        assert_eq!(report.total_entries, 1_203);
        assert!(report.intact);

        let partial = audit.verify_all(10).unwrap();
        assert_eq!(partial.total_entries, 10);
    }

    #[test]
    fn test_other_key_sees_every_entry_as_tampered() {
        let (store, audit) = service();
        audit
            .record(event("V1", VerificationResult::Failed))
            .unwrap();
        audit
            .record(event("V2", VerificationResult::Success))
            .unwrap();

        let foreign = AuditService::new(
            store,
            AuditSigner::from_key(&[1u8; SECRET_LEN]).unwrap(),
        );
        let report = foreign.verify_all(100).unwrap();
        assert!(!report.intact);
        assert_eq!(report.tampered, vec![1, 2]);
    }
}
