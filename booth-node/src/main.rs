use std::sync::Arc;

use anyhow::Context;
use booth_client::RemoteApi;
use booth_node::{BackgroundTasks, BoothState, NodeConfig, print_banner};
use shared::SystemClock;
use shared::models::BoothConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment and logging
    dotenv::dotenv().ok();
    let config = NodeConfig::from_env();
    let log_dir = config.log_dir();
    booth_node::init_logger_with_file(&config.log_level, config.log_json, log_dir.to_str())?;

    print_banner();
    tracing::info!(
        work_dir = %config.work_dir,
        remote = %config.remote_api_url,
        environment = %config.environment,
        "Booth node starting"
    );

    // 2. Components (store failures are fatal)
    let remote: Arc<dyn RemoteApi> = Arc::new(config.client_config().build_http_client()?);
    let state = BoothState::initialize(&config, remote, Arc::new(SystemClock))
        .await
        .context("Failed to initialize booth state")?;

    bootstrap_booth_config(&state)?;
    bootstrap_session(&state).await;

    // 3. Background tasks
    let mut tasks = BackgroundTasks::new();
    let scheduler = state.start_background_tasks(&mut tasks);
    tasks.log_summary();

    let stats = state.audit().stats()?;
    tracing::info!(
        pending = stats.audit_pending,
        total = stats.verifications_total,
        voters = state.store().voter_count()?,
        online = scheduler.is_online(),
        "Booth node ready"
    );

    // 4. Graceful shutdown
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");
    tasks.shutdown().await;

    Ok(())
}

/// Seed `booth_config` from `BOOTH_ID` / `BOOTH_NAME` / `BOOTH_DISTRICT` when
/// the store has none yet
fn bootstrap_booth_config(state: &BoothState) -> anyhow::Result<()> {
    if state.booth_config()?.is_some() {
        return Ok(());
    }
    let Ok(booth_id) = std::env::var("BOOTH_ID") else {
        tracing::warn!("No booth configuration stored; sync stays idle until one is loaded");
        return Ok(());
    };

    state.load_booth_config(&BoothConfig {
        booth_name: std::env::var("BOOTH_NAME").unwrap_or_else(|_| booth_id.clone()),
        district: std::env::var("BOOTH_DISTRICT").unwrap_or_default(),
        constituency: std::env::var("BOOTH_CONSTITUENCY").ok(),
        officer_id: None,
        booth_id,
    })?;
    Ok(())
}

/// Log in with `BOOTH_USERNAME` / `BOOTH_PASSWORD` when no session was restored
async fn bootstrap_session(state: &BoothState) {
    if state.session().has_live_token().await {
        return;
    }
    let (Ok(username), Ok(password)) = (
        std::env::var("BOOTH_USERNAME"),
        std::env::var("BOOTH_PASSWORD"),
    ) else {
        tracing::warn!("Not logged in; sync stays idle until an operator logs in");
        return;
    };

    let booth_id = match state.booth_config() {
        Ok(Some(booth)) => booth.booth_id,
        _ => {
            tracing::warn!("Cannot log in without a booth configuration");
            return;
        }
    };

    // Offline at startup is normal; the operator can log in later
    if let Err(e) = state.session().login(&username, &password, &booth_id).await {
        tracing::warn!("Startup login failed: {e}");
    }
}
