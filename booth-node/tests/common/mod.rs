#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use booth_client::{AuthContext, ClientError, ClientResult, RemoteApi};
use booth_node::{BoothState, BoothStore, NodeConfig};
use shared::ManualClock;
use shared::client::{
    AuditLogBatch, AuditLogPushResponse, LoginRequest, RefreshRequest, TokenResponse,
    VoterPullResponse,
};
use shared::models::{
    AppSettings, BoothConfig, VerificationEvent, VerificationMethod, VerificationResult, VoterRecord,
};
use tempfile::TempDir;

pub const NOW_SECS: i64 = 1_700_000_000;
pub const BOOTH_ID: &str = "BOOTH-7";

/// Scriptable in-process authority that counts every call
#[derive(Default)]
pub struct FakeAuthority {
    pub offline: AtomicBool,
    pub reject_auth: AtomicBool,
    pub fail_pull: AtomicBool,
    health_delay_ms: AtomicU64,
    failing_pushes: Mutex<HashSet<usize>>,
    unauthorized_pushes: Mutex<HashSet<usize>>,
    push_ack_errors: Mutex<HashMap<usize, Vec<String>>>,
    voters: Mutex<Vec<VoterRecord>>,
    watermark: AtomicI64,
    health_calls: AtomicUsize,
    login_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    push_calls: AtomicUsize,
    pull_calls: AtomicUsize,
    pushed: Mutex<Vec<AuditLogBatch>>,
    pull_since: Mutex<Vec<Option<i64>>>,
}

impl FakeAuthority {
    /// Make the n-th push call (1-based) fail with a 500
    pub fn fail_push_call(&self, n: usize) {
        self.failing_pushes.lock().unwrap().insert(n);
    }

    /// Make the n-th push call (1-based) answer 401
    pub fn reject_push_call(&self, n: usize) {
        self.unauthorized_pushes.lock().unwrap().insert(n);
    }

    /// Make the n-th push call (1-based) answer 2xx with these row errors
    pub fn ack_push_call_with_errors(&self, n: usize, errors: Vec<String>) {
        self.push_ack_errors.lock().unwrap().insert(n, errors);
    }

    pub fn set_health_delay(&self, delay: Duration) {
        self.health_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_voters(&self, voters: Vec<VoterRecord>, watermark: i64) {
        *self.voters.lock().unwrap() = voters;
        self.watermark.store(watermark, Ordering::SeqCst);
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn push_calls(&self) -> usize {
        self.push_calls.load(Ordering::SeqCst)
    }

    pub fn pull_calls(&self) -> usize {
        self.pull_calls.load(Ordering::SeqCst)
    }

    /// Every call a sync cycle can make
    pub fn sync_calls(&self) -> usize {
        self.health_calls() + self.refresh_calls() + self.push_calls() + self.pull_calls()
    }

    pub fn pushed_ids(&self) -> Vec<u64> {
        self.pushed
            .lock()
            .unwrap()
            .iter()
            .flat_map(|batch| batch.logs.iter().map(|entry| entry.local_id))
            .collect()
    }

    pub fn pushed_batches(&self) -> Vec<AuditLogBatch> {
        self.pushed.lock().unwrap().clone()
    }

    pub fn pull_since(&self) -> Vec<Option<i64>> {
        self.pull_since.lock().unwrap().clone()
    }

    fn check_auth(&self, auth: &AuthContext) -> ClientResult<()> {
        if self.reject_auth.load(Ordering::SeqCst) {
            return Err(ClientError::Unauthorized("token revoked".into()));
        }
        assert_eq!(auth.booth_id, BOOTH_ID);
        Ok(())
    }
}

#[async_trait]
impl RemoteApi for FakeAuthority {
    async fn health(&self) -> ClientResult<()> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.health_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(ClientError::Network("connection refused".into()));
        }
        Ok(())
    }

    async fn login(&self, request: &LoginRequest) -> ClientResult<TokenResponse> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if request.password != "secret" {
            return Err(ClientError::Unauthorized("bad credentials".into()));
        }
        Ok(TokenResponse {
            access_token: format!("access-{}", request.booth_id),
            refresh_token: Some("refresh-1".to_string()),
            exp: NOW_SECS + 3600,
        })
    }

    async fn refresh(
        &self,
        _access_token: &str,
        _request: &RefreshRequest,
    ) -> ClientResult<TokenResponse> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        Err(ClientError::Unauthorized("refresh token revoked".into()))
    }

    async fn push_audit_logs(
        &self,
        auth: &AuthContext,
        batch: &AuditLogBatch,
    ) -> ClientResult<AuditLogPushResponse> {
        let call = self.push_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.check_auth(auth)?;
        if self.unauthorized_pushes.lock().unwrap().contains(&call) {
            return Err(ClientError::Unauthorized("token revoked".into()));
        }
        if self.failing_pushes.lock().unwrap().contains(&call) {
            return Err(ClientError::Server {
                status: 500,
                body: "batch store failed".into(),
            });
        }
        let errors = self
            .push_ack_errors
            .lock()
            .unwrap()
            .remove(&call)
            .unwrap_or_default();
        if errors.is_empty() {
            self.pushed.lock().unwrap().push(batch.clone());
        }
        Ok(AuditLogPushResponse {
            successful: (batch.logs.len() - errors.len().min(batch.logs.len())) as u32,
            errors,
        })
    }

    async fn pull_voters(
        &self,
        auth: &AuthContext,
        since: Option<i64>,
    ) -> ClientResult<VoterPullResponse> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        self.check_auth(auth)?;
        self.pull_since.lock().unwrap().push(since);
        if self.fail_pull.load(Ordering::SeqCst) {
            return Err(ClientError::Timeout("30s".into()));
        }
        Ok(VoterPullResponse {
            voters: self.voters.lock().unwrap().clone(),
            watermark: self.watermark.load(Ordering::SeqCst),
        })
    }
}

pub struct Harness {
    pub remote: Arc<FakeAuthority>,
    pub clock: Arc<ManualClock>,
    pub state: BoothState,
    _dir: TempDir,
}

impl Harness {
    pub fn store(&self) -> &BoothStore {
        self.state.store()
    }

    pub async fn login(&self) {
        self.state
            .session()
            .login("officer-1", "secret", BOOTH_ID)
            .await
            .unwrap();
    }

    pub fn set_settings(&self, update: impl FnOnce(&mut AppSettings)) {
        let mut settings = self.state.settings().current();
        update(&mut settings);
        self.state.settings().update(&settings).unwrap();
    }

    pub fn load_booth_config(&self) {
        self.state.load_booth_config(&booth_config()).unwrap();
    }

    pub fn record(&self, count: usize) {
        for i in 0..count {
            self.state
                .audit()
                .record(event(&format!("V{i:04}"), VerificationResult::Success))
                .unwrap();
        }
    }
}

/// Fresh node on an in-memory store, not logged in, no booth config
pub async fn harness() -> Harness {
    harness_with(|_| {}).await
}

/// Like [`harness`], with config overrides applied last
pub async fn harness_with(configure: impl FnOnce(&mut NodeConfig)) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut config = NodeConfig::with_work_dir(dir.path().to_string_lossy());
    config.push_batch_size = 50;
    config.sync_interval_secs = 300;
    config.token_refresh_margin_secs = 300;
    configure(&mut config);

    let remote = Arc::new(FakeAuthority::default());
    let clock = Arc::new(ManualClock::at_secs(NOW_SECS));
    let state = BoothState::with_store(
        &config,
        BoothStore::open_in_memory().unwrap(),
        remote.clone(),
        clock.clone(),
    )
    .await
    .unwrap();

    Harness {
        remote,
        clock,
        state,
        _dir: dir,
    }
}

/// Logged in with a booth config loaded
pub async fn ready_harness() -> Harness {
    ready(harness().await).await
}

pub async fn ready(h: Harness) -> Harness {
    h.login().await;
    h.load_booth_config();
    h
}

pub fn booth_config() -> BoothConfig {
    BoothConfig {
        booth_id: BOOTH_ID.to_string(),
        booth_name: "Ward 12 School".to_string(),
        district: "Pune".to_string(),
        constituency: None,
        officer_id: Some("officer-1".to_string()),
    }
}

pub fn event(voter_id: &str, result: VerificationResult) -> VerificationEvent {
    VerificationEvent {
        voter_id: voter_id.to_string(),
        booth_id: BOOTH_ID.to_string(),
        verification_method: VerificationMethod::Otp,
        verification_result: result,
        failure_reason: None,
        timestamp: NOW_SECS * 1000,
    }
}

pub fn voter(voter_id: &str, name: &str) -> VoterRecord {
    VoterRecord {
        voter_id: voter_id.to_string(),
        full_name: name.to_string(),
        registered_mobile: Some("9876543210".to_string()),
        district: "Pune".to_string(),
        polling_booth: BOOTH_ID.to_string(),
        is_active: true,
        last_synced_at: None,
    }
}
