//! Booth configuration and settings stored in the Config collection

use serde::{Deserialize, Serialize};

/// Config collection keys
pub mod config_keys {
    pub const BOOTH_CONFIG: &str = "booth_config";
    pub const APP_SETTINGS: &str = "app_settings";
    pub const HMAC_SECRET: &str = "hmac_secret";
    pub const INITIALIZED: &str = "initialized";
}

/// Singleton key-value row of the Config collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: serde_json::Value,
}

/// Identity of this booth, loaded before sync may run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoothConfig {
    pub booth_id: String,
    pub booth_name: String,
    pub district: String,
    #[serde(default)]
    pub constituency: Option<String>,
    /// Presiding officer on duty
    #[serde(default)]
    pub officer_id: Option<String>,
}

/// Operator-adjustable runtime settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    pub auto_sync: bool,
    pub sync_interval_secs: u64,
    pub otp_ttl_secs: i64,
    pub audit_retention_days: i64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            auto_sync: true,
            sync_interval_secs: 300,
            otp_ttl_secs: 300,
            audit_retention_days: 30,
        }
    }
}

/// Written once by store initialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializedMarker {
    pub schema_version: u32,
    pub created_at: i64,
}
