//! Sync cycle report
//!
//! Every call to [`SyncEngine::run_cycle`](super::SyncEngine::run_cycle)
//! produces exactly one [`SyncReport`]; callers match on its status.

use serde::Serialize;

use crate::error::{BoothError, ErrorKind};

/// What asked for a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Startup,
    Timer,
    ConnectivityRegained,
    Manual,
}

impl std::fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SyncTrigger::Startup => "startup",
            SyncTrigger::Timer => "timer",
            SyncTrigger::ConnectivityRegained => "connectivity_regained",
            SyncTrigger::Manual => "manual",
        })
    }
}

/// Final status of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    /// Push and pull both completed without error
    Success,
    /// Some batches or the pull failed; everything else was committed
    PartialSuccess,
    /// Reachability probe failed, nothing attempted
    Offline,
    /// Token rejected after one refresh; the failing call committed nothing
    AuthFailed,
    /// No live token or no booth configuration; skipped
    NotReady,
    /// Another cycle holds the single-flight latch; skipped
    AlreadyRunning,
    /// `auto_sync` is off and the trigger was not manual; skipped
    AutoSyncDisabled,
}

impl CycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Success => "success",
            CycleStatus::PartialSuccess => "partial_success",
            CycleStatus::Offline => "offline",
            CycleStatus::AuthFailed => "auth_failed",
            CycleStatus::NotReady => "not_ready",
            CycleStatus::AlreadyRunning => "already_running",
            CycleStatus::AutoSyncDisabled => "auto_sync_disabled",
        }
    }

    /// Skipped without touching the network
    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            CycleStatus::NotReady | CycleStatus::AlreadyRunning | CycleStatus::AutoSyncDisabled
        )
    }
}

impl std::fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Probe,
    Push,
    Pull,
}

/// One failure folded into the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncIssue {
    pub phase: SyncPhase,
    /// Zero-based batch index for push failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_index: Option<usize>,
    pub kind: ErrorKind,
    pub message: String,
}

impl SyncIssue {
    pub fn new(phase: SyncPhase, batch_index: Option<usize>, error: &BoothError) -> Self {
        Self {
            phase,
            batch_index,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for SyncIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.batch_index {
            Some(index) => write!(f, "{:?} batch {index}: {}", self.phase, self.message),
            None => write!(f, "{:?}: {}", self.phase, self.message),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushSummary {
    pub batches_sent: usize,
    pub batches_failed: usize,
    pub entries_synced: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PullSummary {
    pub received: usize,
    pub written: usize,
    pub unchanged: usize,
    pub cursor: Option<i64>,
    pub cursor_advanced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub status: CycleStatus,
    pub trigger: SyncTrigger,
    pub started_at: i64,
    pub finished_at: i64,
    pub push: PushSummary,
    /// `None` when the pull phase did not complete
    pub pull: Option<PullSummary>,
    pub errors: Vec<SyncIssue>,
}

impl SyncReport {
    pub(crate) fn begin(trigger: SyncTrigger, started_at: i64) -> Self {
        Self {
            status: CycleStatus::Success,
            trigger,
            started_at,
            finished_at: started_at,
            push: PushSummary::default(),
            pull: None,
            errors: Vec::new(),
        }
    }

    pub(crate) fn skipped(status: CycleStatus, trigger: SyncTrigger, at: i64) -> Self {
        Self {
            status,
            ..Self::begin(trigger, at)
        }
    }

    pub(crate) fn record(&mut self, issue: SyncIssue) {
        self.errors.push(issue);
    }

    pub fn entries_synced(&self) -> usize {
        self.push.entries_synced
    }

    pub fn is_success(&self) -> bool {
        self.status == CycleStatus::Success
    }

    /// Whether anything in the store changed
    pub fn made_progress(&self) -> bool {
        self.push.entries_synced > 0
            || self
                .pull
                .is_some_and(|pull| pull.written > 0 || pull.cursor_advanced)
    }

    /// Collapse the per-batch issues into a single error, if there were any
    pub fn partial_failure(&self) -> Option<BoothError> {
        if self.errors.is_empty() {
            return None;
        }
        Some(BoothError::SyncPartialFailure {
            errors: self.errors.iter().map(ToString::to_string).collect(),
        })
    }
}
