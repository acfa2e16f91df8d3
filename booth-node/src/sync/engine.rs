//! Sync engine: probe → push → pull → report
//!
//! ```text
//! run_cycle(trigger)
//!   ├─ single-flight latch        (AlreadyRunning if held)
//!   ├─ auto_sync setting          (AutoSyncDisabled unless manual)
//!   ├─ readiness: live token + booth_config, no network   (NotReady)
//!   ├─ probe   GET /health        (Offline on failure)
//!   ├─ push    pending audit in batches, mark each accepted batch synced
//!   ├─ pull    voters since cursor, upsert + advance cursor in one txn
//!   └─ report  always produced; latch released on every path
//! ```
//!
//! Failures inside push and pull are folded into the report. Nothing is
//! retried here: the next tick or trigger is the retry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use booth_client::{AuthContext, RemoteApi, SessionManager};
use serde::Serialize;
use shared::Clock;
use shared::client::AuditLogBatch;
use shared::models::{BoothConfig, config_keys};
use tokio::sync::RwLock;
use tracing::Instrument;

use super::report::{CycleStatus, PullSummary, SyncIssue, SyncPhase, SyncReport, SyncTrigger};
use crate::error::{BoothError, BoothResult};
use crate::settings::SettingsService;
use crate::store::{BoothStore, MAX_QUERY_LIMIT};

/// Default audit entries per push request
pub const DEFAULT_PUSH_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone)]
pub struct SyncEngineConfig {
    /// Clamped to `1..=MAX_QUERY_LIMIT`; one pending read fills one batch
    pub push_batch_size: usize,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            push_batch_size: DEFAULT_PUSH_BATCH_SIZE,
        }
    }
}

/// Observable sync state for the UI
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatusSnapshot {
    pub is_syncing: bool,
    pub pending_count: u64,
    pub last_success_at: Option<i64>,
    pub cursor: Option<i64>,
    pub last_report: Option<SyncReport>,
}

/// Whether the cycle may go on after a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhaseFlow {
    Continue,
    AuthFailed,
}

/// Clears the latch when dropped, including on early return
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncEngine {
    store: BoothStore,
    remote: Arc<dyn RemoteApi>,
    session: Arc<SessionManager>,
    settings: SettingsService,
    clock: Arc<dyn Clock>,
    config: SyncEngineConfig,
    syncing: AtomicBool,
    /// Success time of the latest clean cycle, including no-op ones that
    /// leave the store untouched
    last_success_at: RwLock<Option<i64>>,
    last_report: RwLock<Option<SyncReport>>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("syncing", &self.syncing.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    pub fn new(
        store: BoothStore,
        remote: Arc<dyn RemoteApi>,
        session: Arc<SessionManager>,
        settings: SettingsService,
        clock: Arc<dyn Clock>,
        mut config: SyncEngineConfig,
    ) -> Self {
        config.push_batch_size = config.push_batch_size.clamp(1, MAX_QUERY_LIMIT);
        Self {
            store,
            remote,
            session,
            settings,
            clock,
            config,
            syncing: AtomicBool::new(false),
            last_success_at: RwLock::new(None),
            last_report: RwLock::new(None),
        }
    }

    pub fn settings(&self) -> &SettingsService {
        &self.settings
    }

    pub fn config(&self) -> &SyncEngineConfig {
        &self.config
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    fn try_begin(&self) -> Option<FlightGuard<'_>> {
        self.syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard(&self.syncing))
    }

    /// Run one cycle. Always returns a report; a second concurrent call gets
    /// `AlreadyRunning` without doing any work. With `auto_sync` off only
    /// manual triggers run.
    pub async fn run_cycle(&self, trigger: SyncTrigger) -> SyncReport {
        let started_at = self.clock.now_millis();
        let Some(_flight) = self.try_begin() else {
            tracing::debug!(%trigger, "Sync already running, trigger dropped");
            return SyncReport::skipped(CycleStatus::AlreadyRunning, trigger, started_at);
        };

        if trigger != SyncTrigger::Manual && !self.settings.current().auto_sync {
            tracing::debug!(%trigger, "Auto sync disabled, sync skipped");
            return SyncReport::skipped(CycleStatus::AutoSyncDisabled, trigger, started_at);
        }

        let booth = match self.readiness().await {
            Ok(booth) => booth,
            Err(reason) => {
                tracing::debug!(%trigger, reason, "Booth not ready, sync skipped");
                return SyncReport::skipped(CycleStatus::NotReady, trigger, started_at);
            }
        };

        let mut report = SyncReport::begin(trigger, started_at);
        let span = tracing::info_span!("sync_cycle", %trigger, booth_id = %booth.booth_id);
        let status = self
            .execute(&booth, &mut report)
            .instrument(span)
            .await;
        report.status = status;
        report.finished_at = self.clock.now_millis();

        self.finish(&report).await;
        report
    }

    /// Local checks only; never touches the network
    async fn readiness(&self) -> Result<BoothConfig, &'static str> {
        if !self.session.has_live_token().await {
            return Err("no live session token");
        }
        let booth = match self.store.get_config::<BoothConfig>(config_keys::BOOTH_CONFIG) {
            Ok(Some(booth)) => booth,
            Ok(None) => return Err("booth configuration not loaded"),
            Err(e) => {
                tracing::warn!("Failed to read booth configuration: {e}");
                return Err("booth configuration unreadable");
            }
        };
        if let Some(credential) = self.session.credential().await
            && credential.booth_id != booth.booth_id
        {
            tracing::warn!(
                session_booth = %credential.booth_id,
                configured_booth = %booth.booth_id,
                "Session belongs to a different booth"
            );
            return Err("session booth does not match configuration");
        }
        Ok(booth)
    }

    async fn execute(&self, booth: &BoothConfig, report: &mut SyncReport) -> CycleStatus {
        if let Err(e) = self.remote.health().await {
            tracing::info!("Remote authority unreachable: {e}");
            report.record(SyncIssue::new(SyncPhase::Probe, None, &e.into()));
            return CycleStatus::Offline;
        }

        if self.push_phase(&booth.booth_id, report).await == PhaseFlow::AuthFailed {
            return CycleStatus::AuthFailed;
        }
        if self.pull_phase(report).await == PhaseFlow::AuthFailed {
            return CycleStatus::AuthFailed;
        }

        if report.errors.is_empty() {
            CycleStatus::Success
        } else {
            CycleStatus::PartialSuccess
        }
    }

    /// Send pending entries in append order, one batch at a time.
    ///
    /// Reads resume after the last id of the previous batch, so a rejected
    /// batch is not re-read within the same cycle.
    async fn push_phase(&self, booth_id: &str, report: &mut SyncReport) -> PhaseFlow {
        let batch_size = self.config.push_batch_size;
        let mut after = None;
        let mut batch_index = 0usize;

        loop {
            let logs = match self.store.pending_audit(after, batch_size) {
                Ok(logs) => logs,
                Err(e) => {
                    tracing::error!(batch_index, "Failed to read pending audit entries: {e}");
                    report.record(SyncIssue::new(
                        SyncPhase::Push,
                        Some(batch_index),
                        &BoothError::from(e),
                    ));
                    break;
                }
            };
            let Some(last) = logs.last() else {
                break;
            };
            after = Some(last.local_id);

            let ids: Vec<u64> = logs.iter().map(|entry| entry.local_id).collect();
            let is_last = ids.len() < batch_size;
            let batch = AuditLogBatch {
                logs,
                booth_id: booth_id.to_string(),
            };

            let remote = &self.remote;
            let batch_ref = &batch;
            let result = self
                .session
                .authorized(move |auth: AuthContext| async move {
                    remote.push_audit_logs(&auth, batch_ref).await
                })
                .await;
            report.push.batches_sent += 1;

            match result {
                Ok(ack) if ack.is_clean() => {
                    match self.store.mark_audit_synced(&ids, self.clock.now_millis()) {
                        Ok(marked) => {
                            report.push.entries_synced += marked;
                            tracing::debug!(batch_index, entries = marked, "Audit batch synced");
                        }
                        Err(e) => {
                            // Authority has the rows; they will be re-sent next cycle
                            tracing::error!(batch_index, "Failed to mark batch synced: {e}");
                            report.push.batches_failed += 1;
                            report.record(SyncIssue::new(
                                SyncPhase::Push,
                                Some(batch_index),
                                &BoothError::from(e),
                            ));
                        }
                    }
                }
                Ok(ack) => {
                    tracing::warn!(
                        batch_index,
                        accepted = ack.successful,
                        rejected = ack.errors.len(),
                        "Audit batch rejected by authority"
                    );
                    report.push.batches_failed += 1;
                    report.record(SyncIssue::new(
                        SyncPhase::Push,
                        Some(batch_index),
                        &BoothError::validation(ack.errors.join("; ")),
                    ));
                }
                Err(e) if e.is_auth() => {
                    tracing::warn!(batch_index, "Audit push not authorized: {e}");
                    report.push.batches_failed += 1;
                    report.record(SyncIssue::new(SyncPhase::Push, Some(batch_index), &e.into()));
                    return PhaseFlow::AuthFailed;
                }
                Err(e) => {
                    tracing::warn!(batch_index, "Audit batch failed: {e}");
                    report.push.batches_failed += 1;
                    report.record(SyncIssue::new(SyncPhase::Push, Some(batch_index), &e.into()));
                }
            }

            batch_index += 1;
            if is_last {
                break;
            }
        }

        if report.push.batches_sent > 0 {
            tracing::info!(
                batches = report.push.batches_sent,
                failed = report.push.batches_failed,
                entries = report.push.entries_synced,
                "Push phase finished"
            );
        }
        PhaseFlow::Continue
    }

    /// Fetch voters changed since the cursor and apply them atomically
    async fn pull_phase(&self, report: &mut SyncReport) -> PhaseFlow {
        let since = match self.store.sync_cursor() {
            Ok(since) => since,
            Err(e) => {
                tracing::error!("Failed to read sync cursor: {e}");
                report.record(SyncIssue::new(SyncPhase::Pull, None, &BoothError::from(e)));
                return PhaseFlow::Continue;
            }
        };

        let remote = &self.remote;
        let result = self
            .session
            .authorized(move |auth: AuthContext| async move {
                remote.pull_voters(&auth, since).await
            })
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let auth_failed = e.is_auth();
                tracing::warn!(since = ?since, "Voter pull failed: {e}");
                report.record(SyncIssue::new(SyncPhase::Pull, None, &e.into()));
                return if auth_failed {
                    PhaseFlow::AuthFailed
                } else {
                    PhaseFlow::Continue
                };
            }
        };

        if let Some(bad) = response
            .voters
            .iter()
            .position(|voter| voter.voter_id.trim().is_empty())
        {
            tracing::warn!(index = bad, "Pull response contains a voter without id");
            report.record(SyncIssue::new(
                SyncPhase::Pull,
                None,
                &BoothError::validation(format!("voter at index {bad} has an empty voter_id")),
            ));
            return PhaseFlow::Continue;
        }

        let received = response.voters.len();
        match self
            .store
            .apply_voter_pull(&response.voters, response.watermark, self.clock.now_millis())
        {
            Ok(applied) => {
                tracing::info!(
                    received,
                    written = applied.written,
                    watermark = response.watermark,
                    cursor_advanced = applied.cursor_advanced,
                    "Pull phase finished"
                );
                report.pull = Some(PullSummary {
                    received,
                    written: applied.written,
                    unchanged: applied.unchanged,
                    cursor: applied.cursor,
                    cursor_advanced: applied.cursor_advanced,
                });
            }
            Err(e) => {
                tracing::error!(received, "Failed to apply voter pull: {e}");
                report.record(SyncIssue::new(SyncPhase::Pull, None, &BoothError::from(e)));
            }
        }
        PhaseFlow::Continue
    }

    async fn finish(&self, report: &SyncReport) {
        if report.is_success() {
            *self.last_success_at.write().await = Some(report.finished_at);
            // A cycle that changed nothing leaves the store untouched
            if report.made_progress()
                && let Err(e) = self.store.record_sync_success(report.finished_at)
            {
                tracing::warn!("Failed to persist last sync time: {e}");
            }
        }

        for issue in &report.errors {
            tracing::warn!(
                phase = ?issue.phase,
                batch_index = ?issue.batch_index,
                kind = %issue.kind,
                "{}",
                issue.message
            );
        }
        tracing::info!(
            status = %report.status,
            trigger = %report.trigger,
            batches_sent = report.push.batches_sent,
            entries_synced = report.push.entries_synced,
            errors = report.errors.len(),
            duration_ms = report.finished_at - report.started_at,
            "Sync cycle finished"
        );

        *self.last_report.write().await = Some(report.clone());
    }

    pub async fn last_report(&self) -> Option<SyncReport> {
        self.last_report.read().await.clone()
    }

    /// Pending count, last success and the latest report
    pub async fn status(&self) -> BoothResult<SyncStatusSnapshot> {
        let persisted = self.store.last_success_at()?;
        let in_memory = *self.last_success_at.read().await;
        Ok(SyncStatusSnapshot {
            is_syncing: self.is_syncing(),
            pending_count: self.store.pending_audit_count()?,
            last_success_at: persisted.max(in_memory),
            cursor: self.store.sync_cursor()?,
            last_report: self.last_report().await,
        })
    }
}
