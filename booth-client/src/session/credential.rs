// booth-client/src/session/credential.rs
// Credential storage: one JSON file

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::token::SessionToken;

/// Locally held credential state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub booth_id: String,
    pub token: SessionToken,
    /// Unix millis of the login that produced this credential
    pub logged_in_at: i64,
}

/// Credential file on disk
#[derive(Debug, Clone)]
pub struct CredentialStorage {
    path: PathBuf,
}

impl CredentialStorage {
    /// Storage at `dir/file_name`
    pub fn new(base_path: impl Into<PathBuf>, filename: &str) -> Self {
        let path = base_path.into().join(filename);
        Self { path }
    }

    /// Create the directory if missing
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Write the credential
    pub fn save(&self, credential: &Credential) -> std::io::Result<()> {
        self.ensure_dir()?;
        let json = serde_json::to_string_pretty(credential)?;
        fs::write(&self.path, json)
    }

    /// Read the credential; unreadable files count as absent
    pub fn load(&self) -> Option<Credential> {
        if !self.path.exists() {
            return None;
        }
        let json = fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&json).ok()
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Remove the file if present
    pub fn delete(&self) -> std::io::Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_delete() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = CredentialStorage::new(dir.path().join("auth"), "credential.json");
        assert!(storage.load().is_none());

        let credential = Credential {
            username: "officer-1".to_string(),
            booth_id: "BOOTH-7".to_string(),
            token: SessionToken {
                access_token: "a".to_string(),
                refresh_token: Some("r".to_string()),
                exp: 1_700_000_000,
            },
            logged_in_at: 1_699_999_000_000,
        };

        storage.save(&credential).unwrap();
        assert!(storage.exists());
        assert_eq!(storage.load(), Some(credential));

        storage.delete().unwrap();
        assert!(!storage.exists());
        assert!(storage.load().is_none());
    }

    #[test]
    fn test_corrupt_file_is_ignored() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = CredentialStorage::new(dir.path(), "credential.json");
        fs::write(storage.path(), "{not json").unwrap();
        assert!(storage.load().is_none());
    }
}
