//! Operator settings
//!
//! `app_settings` lives in the Config collection. Until an operator saves
//! one, the values derived from [`NodeConfig`](crate::NodeConfig) apply.
//! Every reader asks for [`SettingsService::current`] at the point of use,
//! so a saved change takes effect on the next cycle, dispatch or pass.
//! Long-running loops also wait on [`SettingsService::changed`].

use std::sync::Arc;
use std::time::Duration;

use shared::models::{AppSettings, config_keys};
use tokio::sync::Notify;

use crate::error::{BoothError, BoothResult};
use crate::store::BoothStore;

#[derive(Debug, Clone)]
pub struct SettingsService {
    store: BoothStore,
    defaults: AppSettings,
    config_notify: Arc<Notify>,
}

impl SettingsService {
    pub fn new(store: BoothStore, defaults: AppSettings) -> Self {
        Self {
            store,
            defaults,
            config_notify: Arc::new(Notify::new()),
        }
    }

    /// Saved settings, or the node defaults when none are stored or the
    /// row cannot be read
    pub fn current(&self) -> AppSettings {
        match self.store.get_config::<AppSettings>(config_keys::APP_SETTINGS) {
            Ok(Some(settings)) => settings,
            Ok(None) => self.defaults.clone(),
            Err(e) => {
                tracing::warn!("Failed to read app settings, using defaults: {e}");
                self.defaults.clone()
            }
        }
    }

    /// Validate and persist, then wake every loop waiting on [`Self::changed`]
    pub fn update(&self, settings: &AppSettings) -> BoothResult<()> {
        validate(settings)?;
        self.store.put_config(config_keys::APP_SETTINGS, settings)?;
        tracing::info!(
            auto_sync = settings.auto_sync,
            sync_interval_secs = settings.sync_interval_secs,
            otp_ttl_secs = settings.otp_ttl_secs,
            audit_retention_days = settings.audit_retention_days,
            "App settings updated"
        );
        self.config_notify.notify_waiters();
        Ok(())
    }

    /// Resolves on the next successful [`Self::update`]
    pub async fn changed(&self) {
        self.config_notify.notified().await;
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.current().sync_interval_secs.max(1))
    }
}

fn validate(settings: &AppSettings) -> BoothResult<()> {
    if settings.sync_interval_secs == 0 {
        return Err(BoothError::validation("sync_interval_secs must be at least 1"));
    }
    if settings.otp_ttl_secs <= 0 {
        return Err(BoothError::validation("otp_ttl_secs must be positive"));
    }
    // 0 keeps synced audit rows forever
    if settings.audit_retention_days < 0 {
        return Err(BoothError::validation("audit_retention_days cannot be negative"));
    }
    Ok(())
}
