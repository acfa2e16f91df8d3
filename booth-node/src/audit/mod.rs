//! Audit log: tamper-evident verification records
//!
//! ```text
//! VerificationEvent (UI)
//!   └─ AuditService::record()
//!        ├─ AuditSigner::sign_event()  HMAC-SHA256(secret, canonical string)
//!        └─ BoothStore::append_audit() is_synced = false, counters bumped
//! ```
//!
//! The secret comes from a [`SecretStore`]; by default the store's own
//! `config` collection.

pub mod service;
pub mod signer;

pub use service::{AuditService, AuditVerification};
pub use signer::{AuditSigner, ConfigSecretStore, SECRET_LEN, SecretStore};
