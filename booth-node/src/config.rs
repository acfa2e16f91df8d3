use std::path::PathBuf;

use booth_client::{ClientConfig, SessionConfig};
use shared::models::AppSettings;

use crate::store::MAX_QUERY_LIMIT;
use crate::sync::DEFAULT_PUSH_BATCH_SIZE;

/// Booth node configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | ./work_dir | store, logs and credential file |
/// | REMOTE_API_URL | http://localhost:8080/api | remote authority base URL |
/// | SYNC_INTERVAL_SECS | 300 | periodic sync tick |
/// | PUSH_BATCH_SIZE | 50 | audit entries per push request |
/// | REQUEST_TIMEOUT_MS | 30000 | data-call timeout |
/// | PROBE_TIMEOUT_MS | 5000 | reachability probe timeout |
/// | TOKEN_REFRESH_MARGIN_SECS | 300 | proactive refresh margin |
/// | OTP_TTL_SECS | 300 | validity of a dispatched OTP |
/// | AUDIT_RETENTION_DAYS | 30 | keep synced audit rows this long |
/// | OTP_GRACE_SECS | 600 | keep expired OTP rows this long |
/// | LOG_LEVEL | info | default log filter |
/// | LOG_JSON | false | JSON log lines |
/// | ENVIRONMENT | development | development / staging / production |
///
/// `SYNC_INTERVAL_SECS`, `OTP_TTL_SECS` and `AUDIT_RETENTION_DAYS` only seed
/// [`AppSettings`]; once an operator saves `app_settings` the stored values win.
///
/// ```ignore
/// WORK_DIR=/data/booth REMOTE_API_URL=https://authority.example/api cargo run
/// ```
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub work_dir: String,
    pub remote_api_url: String,
    pub sync_interval_secs: u64,
    pub push_batch_size: usize,
    pub request_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    pub token_refresh_margin_secs: i64,
    pub otp_ttl_secs: i64,
    pub audit_retention_days: i64,
    pub otp_grace_secs: i64,
    pub log_level: String,
    pub log_json: bool,
    /// development | staging | production
    pub environment: String,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl NodeConfig {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./work_dir".into()),
            remote_api_url: std::env::var("REMOTE_API_URL")
                .unwrap_or_else(|_| "http://localhost:8080/api".into()),
            sync_interval_secs: env_or("SYNC_INTERVAL_SECS", 300u64).max(1),
            push_batch_size: env_or("PUSH_BATCH_SIZE", DEFAULT_PUSH_BATCH_SIZE)
                .clamp(1, MAX_QUERY_LIMIT),
            request_timeout_ms: env_or("REQUEST_TIMEOUT_MS", 30_000),
            probe_timeout_ms: env_or("PROBE_TIMEOUT_MS", 5_000),
            token_refresh_margin_secs: env_or("TOKEN_REFRESH_MARGIN_SECS", 300),
            otp_ttl_secs: env_or("OTP_TTL_SECS", 300i64).max(1),
            audit_retention_days: env_or("AUDIT_RETENTION_DAYS", 30i64).max(0),
            otp_grace_secs: env_or("OTP_GRACE_SECS", 600),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: env_or("LOG_JSON", false),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// Environment config with a different work dir; used by tests
    pub fn with_work_dir(work_dir: impl Into<String>) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn store_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("booth.redb")
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    pub fn auth_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("auth")
    }

    /// Settings in effect until an operator saves `app_settings`
    pub fn app_settings(&self) -> AppSettings {
        AppSettings {
            auto_sync: true,
            sync_interval_secs: self.sync_interval_secs.max(1),
            otp_ttl_secs: self.otp_ttl_secs.max(1),
            audit_retention_days: self.audit_retention_days.max(0),
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.remote_api_url)
            .with_request_timeout_ms(self.request_timeout_ms)
            .with_probe_timeout_ms(self.probe_timeout_ms)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            refresh_margin_secs: self.token_refresh_margin_secs,
            ..SessionConfig::default()
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
