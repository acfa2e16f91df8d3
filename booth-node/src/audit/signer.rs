//! Audit integrity signer
//!
//! `hmac_signature = hex(HMAC-SHA256(secret, canonical_string))` where the
//! canonical string is `voter_id|timestamp|METHOD|RESULT|booth_id`.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use shared::models::{AuditLogEntry, VerificationEvent, config_keys};

use crate::error::{BoothError, BoothResult};
use crate::store::BoothStore;

type HmacSha256 = Hmac<Sha256>;

/// Signing key length in bytes
pub const SECRET_LEN: usize = 32;

/// Where the signing key lives
pub trait SecretStore: Send + Sync {
    /// Return the key, generating and persisting it on the very first call
    fn load_or_create(&self) -> BoothResult<Vec<u8>>;
}

/// Keeps the key as hex in the store's `config` collection under
/// `hmac_secret`. The key is never transmitted.
#[derive(Debug, Clone)]
pub struct ConfigSecretStore {
    store: BoothStore,
}

impl ConfigSecretStore {
    pub fn new(store: BoothStore) -> Self {
        Self { store }
    }
}

impl SecretStore for ConfigSecretStore {
    fn load_or_create(&self) -> BoothResult<Vec<u8>> {
        let (encoded, created) =
            self.store
                .get_or_init_config(config_keys::HMAC_SECRET, || -> String {
                    let mut key = [0u8; SECRET_LEN];
                    rand::rngs::OsRng.fill_bytes(&mut key);
                    hex::encode(key)
                })?;

        if created {
            tracing::info!(target: "audit", "Generated audit signing secret");
        }

        let key = hex::decode(&encoded)
            .map_err(|e| BoothError::Config(format!("Stored hmac secret is not hex: {e}")))?;
        if key.len() != SECRET_LEN {
            return Err(BoothError::Config(format!(
                "Stored hmac secret has {} bytes, expected {SECRET_LEN}",
                key.len()
            )));
        }
        Ok(key)
    }
}

/// Computes and checks tamper-evidence tags
#[derive(Clone)]
pub struct AuditSigner {
    mac: HmacSha256,
}

impl std::fmt::Debug for AuditSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditSigner").finish_non_exhaustive()
    }
}

impl AuditSigner {
    /// Load (or create) the key from `secrets`
    pub fn new(secrets: &dyn SecretStore) -> BoothResult<Self> {
        Self::from_key(&secrets.load_or_create()?)
    }

    pub fn from_key(key: &[u8]) -> BoothResult<Self> {
        let mac = HmacSha256::new_from_slice(key)
            .map_err(|_| BoothError::Config("Invalid hmac key length".to_string()))?;
        Ok(Self { mac })
    }

    /// Hex tag over an arbitrary canonical string
    pub fn sign(&self, canonical: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(canonical.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn sign_event(&self, event: &VerificationEvent) -> String {
        self.sign(&event.canonical_string())
    }

    /// Recompute the tag from the entry's current fields (constant-time compare)
    pub fn verify(&self, entry: &AuditLogEntry) -> bool {
        let Ok(expected) = hex::decode(&entry.hmac_signature) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(entry.canonical_string().as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}
