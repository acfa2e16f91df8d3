//! Booth Node - offline-first voter verification booth
//!
//! # Overview
//!
//! - **Store** (`store`): embedded redb store with five collections
//! - **Audit** (`audit`): HMAC-signed, append-only verification log
//! - **Sync** (`sync`): probe → push → pull cycles against the remote authority
//! - **OTP** (`otp`): dispatched one-time passwords until verified or expired
//!
//! # Layout
//!
//! ```text
//! booth-node/src/
//! ├── store/        # BoothStore, collections, queries
//! ├── audit/        # signer + audit service
//! ├── sync/         # engine, report, scheduler
//! ├── otp.rs        # OTP ledger
//! ├── maintenance.rs# daily purge and retention
//! ├── state.rs      # BoothState wiring
//! ├── tasks.rs      # background task registry
//! ├── config.rs     # NodeConfig from env
//! ├── error.rs      # BoothError taxonomy
//! └── logger.rs     # tracing setup and log cleanup
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod logger;
pub mod maintenance;
pub mod otp;
pub mod settings;
pub mod state;
pub mod store;
pub mod sync;
pub mod tasks;

// Re-export public types
pub use audit::{AuditService, AuditSigner, AuditVerification};
pub use config::NodeConfig;
pub use error::{BoothError, BoothResult, ErrorKind};
pub use otp::{OtpLedger, OtpOutcome};
pub use settings::SettingsService;
pub use state::BoothState;
pub use store::{BoothStore, StoreError, StoreResult};
pub use sync::{
    CycleStatus, SchedulerHandle, SyncEngine, SyncReport, SyncScheduler, SyncTrigger,
};
pub use tasks::{BackgroundTasks, TaskKind};

// Re-export logger functions
pub use logger::{cleanup_old_logs, init_logger, init_logger_with_file};

pub fn print_banner() {
    println!(
        r#"
    ____              __  __
   / __ )____  ____  / /_/ /_
  / __  / __ \/ __ \/ __/ __ \
 / /_/ / /_/ / /_/ / /_/ / / /
/_____/\____/\____/\__/_/ /_/
        booth node v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
