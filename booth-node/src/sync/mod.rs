//! Offline-first reconciliation with the remote authority
//!
//! - [`SyncEngine`]: one probe → push → pull cycle under a single-flight latch
//! - [`SyncScheduler`]: periodic, connectivity and manual triggers
//! - [`SyncReport`]: the tagged result of every cycle

pub mod engine;
pub mod report;
pub mod scheduler;

pub use engine::{DEFAULT_PUSH_BATCH_SIZE, SyncEngine, SyncEngineConfig, SyncStatusSnapshot};
pub use report::{
    CycleStatus, PullSummary, PushSummary, SyncIssue, SyncPhase, SyncReport, SyncTrigger,
};
pub use scheduler::{SchedulerHandle, SyncScheduler};
