//! Node state: every long-lived component, built once at startup and
//! passed by handle to whatever needs it.

use std::sync::Arc;

use booth_client::{CredentialStorage, RemoteApi, SessionManager};
use shared::Clock;
use shared::models::{BoothConfig, config_keys};

use crate::audit::{AuditService, AuditSigner, ConfigSecretStore};
use crate::config::NodeConfig;
use crate::error::{BoothError, BoothResult};
use crate::maintenance::{MaintenancePolicy, MaintenanceWorker};
use crate::otp::OtpLedger;
use crate::settings::SettingsService;
use crate::store::BoothStore;
use crate::sync::{SchedulerHandle, SyncEngine, SyncEngineConfig, SyncScheduler};
use crate::tasks::{BackgroundTasks, TaskKind};

pub const CREDENTIAL_FILE: &str = "credential.json";

#[derive(Debug, Clone)]
pub struct BoothState {
    config: NodeConfig,
    store: BoothStore,
    clock: Arc<dyn Clock>,
    session: Arc<SessionManager>,
    settings: SettingsService,
    audit: AuditService,
    otp: OtpLedger,
    engine: Arc<SyncEngine>,
}

impl BoothState {
    /// Open the store and wire every service.
    ///
    /// Store failures propagate: the node cannot run without it.
    pub async fn initialize(
        config: &NodeConfig,
        remote: Arc<dyn RemoteApi>,
        clock: Arc<dyn Clock>,
    ) -> BoothResult<Self> {
        let store = BoothStore::open(config.store_path())?;
        Self::with_store(config, store, remote, clock).await
    }

    /// Wire services around an already opened store
    pub async fn with_store(
        config: &NodeConfig,
        store: BoothStore,
        remote: Arc<dyn RemoteApi>,
        clock: Arc<dyn Clock>,
    ) -> BoothResult<Self> {
        let marker = store.initialize(clock.now_millis())?;
        tracing::info!(
            schema_version = marker.schema_version,
            created_at = %shared::util::format_millis(marker.created_at),
            "Store ready"
        );

        let settings = SettingsService::new(store.clone(), config.app_settings());
        let signer = AuditSigner::new(&ConfigSecretStore::new(store.clone()))?;
        let audit = AuditService::new(store.clone(), signer);
        let otp = OtpLedger::new(store.clone(), settings.clone(), clock.clone());

        let session = Arc::new(
            SessionManager::new(remote.clone(), clock.clone(), config.session_config())
                .with_storage(CredentialStorage::new(config.auth_dir(), CREDENTIAL_FILE)),
        );
        if session.restore().await {
            tracing::info!("Session restored from credential file");
        }

        let engine = Arc::new(SyncEngine::new(
            store.clone(),
            remote,
            session.clone(),
            settings.clone(),
            clock.clone(),
            SyncEngineConfig {
                push_batch_size: config.push_batch_size,
            },
        ));

        Ok(Self {
            config: config.clone(),
            store,
            clock,
            session,
            settings,
            audit,
            otp,
            engine,
        })
    }

    /// Register the sync scheduler and the maintenance worker
    pub fn start_background_tasks(&self, tasks: &mut BackgroundTasks) -> SchedulerHandle {
        let (scheduler, handle) = SyncScheduler::new(self.engine.clone(), tasks.shutdown_token());
        tasks.spawn("sync_scheduler", TaskKind::Worker, scheduler.run());

        let maintenance = MaintenanceWorker::new(
            self.audit.clone(),
            self.otp.clone(),
            self.settings.clone(),
            self.clock.clone(),
            MaintenancePolicy {
                otp_grace_secs: self.config.otp_grace_secs,
                log_dir: Some(self.config.log_dir()),
            },
            tasks.shutdown_token(),
        );
        tasks.spawn("maintenance", TaskKind::Periodic, maintenance.run());

        handle
    }

    /// Store the booth identity; sync stays "not ready" until this exists
    pub fn load_booth_config(&self, booth: &BoothConfig) -> BoothResult<()> {
        if booth.booth_id.trim().is_empty() {
            return Err(BoothError::validation("booth_id is required"));
        }
        self.store.put_config(config_keys::BOOTH_CONFIG, booth)?;
        tracing::info!(booth_id = %booth.booth_id, "Booth configuration loaded");
        Ok(())
    }

    pub fn booth_config(&self) -> BoothResult<Option<BoothConfig>> {
        Ok(self.store.get_config(config_keys::BOOTH_CONFIG)?)
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn store(&self) -> &BoothStore {
        &self.store
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn settings(&self) -> &SettingsService {
        &self.settings
    }

    pub fn audit(&self) -> &AuditService {
        &self.audit
    }

    pub fn otp(&self) -> &OtpLedger {
        &self.otp
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }
}
