//! Daily housekeeping
//!
//! Purges expired OTP rows, applies the `audit_retention_days` setting to
//! rows already delivered, and removes old app log files. Runs once at startup and then
//! every [`MAINTENANCE_INTERVAL`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use shared::Clock;
use tokio_util::sync::CancellationToken;

use crate::audit::AuditService;
use crate::logger::{APP_LOG_RETENTION_DAYS, cleanup_old_logs};
use crate::otp::OtpLedger;
use crate::settings::SettingsService;

pub const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(24 * 3600);

const DAY_MILLIS: i64 = 24 * 3600 * 1000;

#[derive(Debug, Clone)]
pub struct MaintenancePolicy {
    pub otp_grace_secs: i64,
    pub log_dir: Option<PathBuf>,
}

/// Rows and files removed by one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub otp_purged: usize,
    pub audit_purged: usize,
    pub logs_removed: usize,
}

/// Registered as `TaskKind::Periodic`
pub struct MaintenanceWorker {
    audit: AuditService,
    otp: OtpLedger,
    settings: SettingsService,
    clock: Arc<dyn Clock>,
    policy: MaintenancePolicy,
    shutdown: CancellationToken,
}

impl MaintenanceWorker {
    pub fn new(
        audit: AuditService,
        otp: OtpLedger,
        settings: SettingsService,
        clock: Arc<dyn Clock>,
        policy: MaintenancePolicy,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            audit,
            otp,
            settings,
            clock,
            policy,
            shutdown,
        }
    }

    pub async fn run(self) {
        tracing::info!("Maintenance worker started");
        let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Maintenance worker shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.run_once();
                }
            }
        }
    }

    /// One pass; each step logs its own failure and the rest still run
    pub fn run_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match self.otp.purge_expired(self.policy.otp_grace_secs) {
            Ok(n) => report.otp_purged = n,
            Err(e) => tracing::error!("OTP purge failed: {e}"),
        }

        let retention_days = self.settings.current().audit_retention_days;
        if retention_days > 0 {
            let cutoff = self.clock.now_millis() - retention_days * DAY_MILLIS;
            match self.audit.purge_synced_before(cutoff) {
                Ok(n) => report.audit_purged = n,
                Err(e) => tracing::error!("Audit retention cleanup failed: {e}"),
            }
        }

        if let Some(dir) = &self.policy.log_dir {
            match cleanup_old_logs(dir, APP_LOG_RETENTION_DAYS) {
                Ok(n) => report.logs_removed = n,
                Err(e) => tracing::error!(error = %e, "Failed to cleanup old logs"),
            }
        }

        tracing::info!(
            otp_purged = report.otp_purged,
            audit_purged = report.audit_purged,
            logs_removed = report.logs_removed,
            "Maintenance pass finished"
        );
        report
    }
}
