//! SessionManager - bearer token lifecycle
//!
//! ```text
//! authorized(op)
//!   ├── ensure_fresh(): valid → use | inside margin → proactive refresh | dead → refresh or logout
//!   ├── op(token)
//!   └── 401 → refresh once → op(new token) → 401 again → logout + ReauthenticationRequired
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use shared::Clock;
use shared::client::{LoginRequest, RefreshRequest, TokenResponse};
use tokio::sync::{Mutex, RwLock};

use super::credential::{Credential, CredentialStorage};
use super::token::{self, DEFAULT_REFRESH_MARGIN_SECS, SessionToken};
use crate::http::{AuthContext, RemoteApi};
use crate::{ClientError, ClientResult};

/// Session tuning
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Tokens closer than this to expiry are refreshed before use
    pub refresh_margin_secs: i64,
    /// Attempts per refresh when the authority is unreachable
    pub refresh_max_attempts: u32,
    pub refresh_initial_delay: Duration,
    pub refresh_max_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_margin_secs: DEFAULT_REFRESH_MARGIN_SECS,
            refresh_max_attempts: 3,
            refresh_initial_delay: Duration::from_secs(2),
            refresh_max_delay: Duration::from_secs(30),
        }
    }
}

/// Holds the booth's credential and keeps it usable for authorized calls
pub struct SessionManager {
    remote: Arc<dyn RemoteApi>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    storage: Option<CredentialStorage>,
    state: RwLock<Option<Credential>>,
    /// Serializes refreshes so concurrent 401s trigger a single exchange
    refresh_lock: Mutex<()>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("storage", &self.storage.as_ref().map(|s| s.path()))
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(remote: Arc<dyn RemoteApi>, clock: Arc<dyn Clock>, config: SessionConfig) -> Self {
        Self {
            remote,
            clock,
            config,
            storage: None,
            state: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Persist credentials across restarts
    pub fn with_storage(mut self, storage: CredentialStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ========== Credential state ==========

    /// Load a previously saved credential; expired ones are discarded
    pub async fn restore(&self) -> bool {
        let Some(storage) = &self.storage else {
            return false;
        };
        let Some(credential) = storage.load() else {
            return false;
        };

        if token::is_expired(&credential.token, self.clock.now_secs()) {
            if let Err(e) = storage.delete() {
                tracing::warn!("Failed to delete expired credential: {e}");
            }
            tracing::info!(username = %credential.username, "Saved session expired, cleared");
            return false;
        }

        tracing::info!(username = %credential.username, booth_id = %credential.booth_id, "Restored saved session");
        *self.state.write().await = Some(credential);
        true
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
        booth_id: &str,
    ) -> ClientResult<SessionToken> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
            booth_id: booth_id.to_string(),
        };
        let token = SessionToken::from_response(self.remote.login(&request).await?);

        self.install(Credential {
            username: username.to_string(),
            booth_id: booth_id.to_string(),
            token: token.clone(),
            logged_in_at: self.clock.now_millis(),
        })
        .await;

        tracing::info!(
            target: "security",
            username = %username,
            booth_id = %booth_id,
            exp = token.exp,
            "Booth officer logged in"
        );
        Ok(token)
    }

    /// Adopt a credential obtained elsewhere (e.g. handed over by the UI)
    pub async fn install(&self, credential: Credential) {
        self.persist(&credential);
        *self.state.write().await = Some(credential);
    }

    /// Clear every locally held credential
    pub async fn logout(&self) {
        *self.state.write().await = None;
        if let Some(storage) = &self.storage
            && let Err(e) = storage.delete()
        {
            tracing::warn!("Failed to delete credential file: {e}");
        }
        tracing::info!(target: "security", "Session cleared");
    }

    pub async fn credential(&self) -> Option<Credential> {
        self.state.read().await.clone()
    }

    pub async fn token(&self) -> Option<SessionToken> {
        self.state.read().await.as_ref().map(|c| c.token.clone())
    }

    // ========== Validity ==========

    pub fn is_valid(&self, token: &SessionToken) -> bool {
        token::is_valid(token, self.config.refresh_margin_secs, self.clock.now_secs())
    }

    pub fn is_expired(&self, token: &SessionToken) -> bool {
        token::is_expired(token, self.clock.now_secs())
    }

    /// A token is held and has not strictly expired
    pub async fn has_live_token(&self) -> bool {
        match self.token().await {
            Some(token) => !self.is_expired(&token),
            None => false,
        }
    }

    /// Token to use for the next authorized call, refreshing first when it
    /// is inside the margin.
    pub async fn ensure_fresh(&self) -> ClientResult<AuthContext> {
        let credential = self.credential().await.ok_or(ClientError::NotLoggedIn)?;
        let now = self.clock.now_secs();

        if token::is_expired(&credential.token, now) {
            return match self.refresh_from(&credential.token.access_token).await {
                Ok(refreshed) => Ok(auth_context(&refreshed)),
                Err(e) if e.is_auth() => {
                    tracing::warn!("Expired token could not be refreshed: {e}");
                    self.logout().await;
                    Err(ClientError::ReauthenticationRequired)
                }
                Err(e) => Err(e),
            };
        }

        if !token::needs_refresh(&credential.token, self.config.refresh_margin_secs, now) {
            return Ok(auth_context(&credential));
        }

        match self.refresh_from(&credential.token.access_token).await {
            Ok(refreshed) => Ok(auth_context(&refreshed)),
            Err(e) => {
                tracing::warn!(
                    remaining_secs = credential.token.remaining_secs(now),
                    "Proactive token refresh failed, using current token: {e}"
                );
                Ok(auth_context(&credential))
            }
        }
    }

    /// Run `op` with a bearer token; one refresh-and-retry on 401, logout on
    /// a second consecutive failure.
    pub async fn authorized<T, F, Fut>(&self, op: F) -> ClientResult<T>
    where
        F: Fn(AuthContext) -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let ctx = self.ensure_fresh().await?;
        let stale = ctx.token.clone();

        match op(ctx).await {
            Err(ClientError::Unauthorized(reason)) => {
                tracing::warn!(reason = %reason, "Authorized call rejected, refreshing token once");

                let refreshed = match self.refresh_from(&stale).await {
                    Ok(credential) => credential,
                    Err(e) if e.is_auth() => {
                        tracing::warn!("Token refresh rejected: {e}");
                        self.logout().await;
                        return Err(ClientError::ReauthenticationRequired);
                    }
                    Err(e) => return Err(e),
                };

                match op(auth_context(&refreshed)).await {
                    Err(ClientError::Unauthorized(reason)) => {
                        tracing::warn!(reason = %reason, "Call rejected after refresh, forcing logout");
                        self.logout().await;
                        Err(ClientError::ReauthenticationRequired)
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    // ========== Refresh ==========

    /// Force a refresh of the current token
    pub async fn refresh(&self) -> ClientResult<SessionToken> {
        let current = self.token().await.ok_or(ClientError::NotLoggedIn)?;
        Ok(self.refresh_from(&current.access_token).await?.token)
    }

    /// Refresh unless another caller already replaced `stale_access`
    async fn refresh_from(&self, stale_access: &str) -> ClientResult<Credential> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.credential().await.ok_or(ClientError::NotLoggedIn)?;
        if current.token.access_token != stale_access {
            return Ok(current);
        }

        let request = RefreshRequest {
            refresh_token: current.token.refresh_token.clone(),
        };
        let response = self
            .refresh_with_retry(&current.token.access_token, &request)
            .await?;

        let mut token = SessionToken::from_response(response);
        if token.refresh_token.is_none() {
            token.refresh_token = current.token.refresh_token.clone();
        }
        let updated = Credential { token, ..current };

        self.persist(&updated);
        *self.state.write().await = Some(updated.clone());
        tracing::debug!(exp = updated.token.exp, "Token refreshed");
        Ok(updated)
    }

    /// Exponential backoff on transport failures only
    async fn refresh_with_retry(
        &self,
        access_token: &str,
        request: &RefreshRequest,
    ) -> ClientResult<TokenResponse> {
        let max_attempts = self.config.refresh_max_attempts.max(1);
        let mut delay = self.config.refresh_initial_delay;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.remote.refresh(access_token, request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_network() && attempt < max_attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Token refresh failed, retrying: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.config.refresh_max_delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn persist(&self, credential: &Credential) {
        if let Some(storage) = &self.storage
            && let Err(e) = storage.save(credential)
        {
            tracing::warn!(path = %storage.path().display(), "Failed to save credential: {e}");
        }
    }
}

fn auth_context(credential: &Credential) -> AuthContext {
    AuthContext {
        token: credential.token.access_token.clone(),
        booth_id: credential.booth_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shared::ManualClock;
    use shared::client::{AuditLogBatch, AuditLogPushResponse, VoterPullResponse};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    const NOW: i64 = 1_700_000_000;

    #[derive(Default)]
    struct FakeAuthority {
        refresh_responses: std::sync::Mutex<VecDeque<ClientResult<TokenResponse>>>,
        refresh_calls: AtomicU32,
    }

    impl FakeAuthority {
        fn push_refresh(&self, result: ClientResult<TokenResponse>) {
            self.refresh_responses.lock().unwrap().push_back(result);
        }

        fn refresh_calls(&self) -> u32 {
            self.refresh_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteApi for FakeAuthority {
        async fn health(&self) -> ClientResult<()> {
            Ok(())
        }

        async fn login(&self, request: &LoginRequest) -> ClientResult<TokenResponse> {
            Ok(TokenResponse {
                access_token: format!("login-{}", request.username),
                refresh_token: Some("r0".to_string()),
                exp: NOW + 3600,
            })
        }

        async fn refresh(
            &self,
            _access_token: &str,
            _request: &RefreshRequest,
        ) -> ClientResult<TokenResponse> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            self.refresh_responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::Unauthorized("no refresh".into())))
        }

        async fn push_audit_logs(
            &self,
            _auth: &AuthContext,
            _batch: &AuditLogBatch,
        ) -> ClientResult<AuditLogPushResponse> {
            Err(ClientError::Validation("unused".into()))
        }

        async fn pull_voters(
            &self,
            _auth: &AuthContext,
            _since: Option<i64>,
        ) -> ClientResult<VoterPullResponse> {
            Err(ClientError::Validation("unused".into()))
        }
    }

    fn fast_config() -> SessionConfig {
        SessionConfig {
            refresh_initial_delay: Duration::ZERO,
            refresh_max_delay: Duration::ZERO,
            ..SessionConfig::default()
        }
    }

    fn manager(remote: Arc<FakeAuthority>) -> SessionManager {
        SessionManager::new(remote, Arc::new(ManualClock::at_secs(NOW)), fast_config())
    }

    fn credential(access: &str, exp: i64) -> Credential {
        Credential {
            username: "officer-1".to_string(),
            booth_id: "BOOTH-7".to_string(),
            token: SessionToken {
                access_token: access.to_string(),
                refresh_token: Some("r1".to_string()),
                exp,
            },
            logged_in_at: NOW * 1000,
        }
    }

    fn token_response(access: &str, exp: i64) -> TokenResponse {
        TokenResponse {
            access_token: access.to_string(),
            refresh_token: None,
            exp,
        }
    }

    #[tokio::test]
    async fn test_margin_boundary_through_manager() {
        let session = manager(Arc::new(FakeAuthority::default()));
        let at_margin = credential("t", NOW + 300).token;
        let past_margin = credential("t", NOW + 301).token;

        assert!(!session.is_valid(&at_margin));
        assert!(!session.is_expired(&at_margin));
        assert!(session.is_valid(&past_margin));
        assert!(!session.is_expired(&past_margin));
    }

    #[tokio::test]
    async fn test_not_logged_in() {
        let session = manager(Arc::new(FakeAuthority::default()));
        assert!(!session.has_live_token().await);
        assert!(matches!(
            session.ensure_fresh().await,
            Err(ClientError::NotLoggedIn)
        ));
    }

    #[tokio::test]
    async fn test_login_persists_and_restores() {
        let dir = tempfile::TempDir::new().unwrap();
        let remote = Arc::new(FakeAuthority::default());

        let session = manager(remote.clone())
            .with_storage(CredentialStorage::new(dir.path(), "credential.json"));
        let token = session.login("officer-1", "pw", "BOOTH-7").await.unwrap();
        assert_eq!(token.access_token, "login-officer-1");

        let restarted =
            manager(remote).with_storage(CredentialStorage::new(dir.path(), "credential.json"));
        assert!(restarted.restore().await);
        assert_eq!(restarted.token().await, Some(token));
        assert_eq!(
            restarted.credential().await.unwrap().booth_id,
            "BOOTH-7".to_string()
        );
    }

    #[tokio::test]
    async fn test_restore_discards_expired_credential() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = CredentialStorage::new(dir.path(), "credential.json");
        storage.save(&credential("old", NOW - 1)).unwrap();

        let session = manager(Arc::new(FakeAuthority::default())).with_storage(storage.clone());
        assert!(!session.restore().await);
        assert!(!storage.exists());
        assert!(session.token().await.is_none());
    }

    #[tokio::test]
    async fn test_valid_token_used_without_refresh() {
        let remote = Arc::new(FakeAuthority::default());
        let session = manager(remote.clone());
        session.install(credential("t1", NOW + 3600)).await;

        let ctx = session.ensure_fresh().await.unwrap();
        assert_eq!(ctx.token, "t1");
        assert_eq!(ctx.booth_id, "BOOTH-7");
        assert_eq!(remote.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_proactive_refresh_inside_margin() {
        let remote = Arc::new(FakeAuthority::default());
        remote.push_refresh(Ok(token_response("t2", NOW + 3600)));
        let session = manager(remote.clone());
        session.install(credential("t1", NOW + 100)).await;

        let ctx = session.ensure_fresh().await.unwrap();
        assert_eq!(ctx.token, "t2");
        assert_eq!(remote.refresh_calls(), 1);

        // Refresh token carried over when the response omits one
        let token = session.token().await.unwrap();
        assert_eq!(token.refresh_token.as_deref(), Some("r1"));
        assert_eq!(token.exp, NOW + 3600);
    }

    #[tokio::test]
    async fn test_proactive_refresh_failure_keeps_live_token() {
        let remote = Arc::new(FakeAuthority::default());
        for _ in 0..3 {
            remote.push_refresh(Err(ClientError::Network("unreachable".into())));
        }
        let session = manager(remote.clone());
        session.install(credential("t1", NOW + 100)).await;

        let ctx = session.ensure_fresh().await.unwrap();
        assert_eq!(ctx.token, "t1");
        assert_eq!(remote.refresh_calls(), 3);
    }

    #[tokio::test]
    async fn test_reactive_refresh_retries_once() {
        let remote = Arc::new(FakeAuthority::default());
        remote.push_refresh(Ok(token_response("t2", NOW + 7200)));
        let session = manager(remote.clone());
        session.install(credential("t1", NOW + 3600)).await;

        let calls = Arc::new(AtomicU32::new(0));
        let result = session
            .authorized(|ctx| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if ctx.token == "t1" {
                        Err(ClientError::Unauthorized("revoked".into()))
                    } else {
                        Ok(ctx.token)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "t2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(remote.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_second_consecutive_rejection_forces_logout() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = CredentialStorage::new(dir.path(), "credential.json");
        let remote = Arc::new(FakeAuthority::default());
        remote.push_refresh(Ok(token_response("t2", NOW + 7200)));
        let session = manager(remote.clone()).with_storage(storage.clone());
        session.install(credential("t1", NOW + 3600)).await;
        assert!(storage.exists());

        let calls = Arc::new(AtomicU32::new(0));
        let result: ClientResult<()> = session
            .authorized(|_ctx| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ClientError::Unauthorized("nope".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(ClientError::ReauthenticationRequired)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(remote.refresh_calls(), 1);
        assert!(session.token().await.is_none());
        assert!(!storage.exists());
    }

    #[tokio::test]
    async fn test_rejected_refresh_forces_logout() {
        let remote = Arc::new(FakeAuthority::default());
        remote.push_refresh(Err(ClientError::Unauthorized("refresh revoked".into())));
        let session = manager(remote.clone());
        session.install(credential("t1", NOW + 3600)).await;

        let calls = Arc::new(AtomicU32::new(0));
        let result: ClientResult<()> = session
            .authorized(|_ctx| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ClientError::Unauthorized("expired".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(ClientError::ReauthenticationRequired)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(session.token().await.is_none());
    }

    #[tokio::test]
    async fn test_non_auth_errors_pass_through() {
        let remote = Arc::new(FakeAuthority::default());
        let session = manager(remote.clone());
        session.install(credential("t1", NOW + 3600)).await;

        let result: ClientResult<()> = session
            .authorized(|_ctx| async { Err(ClientError::Timeout("30s".into())) })
            .await;

        assert!(matches!(result, Err(ClientError::Timeout(_))));
        assert_eq!(remote.refresh_calls(), 0);
        assert!(session.token().await.is_some());
    }

    #[tokio::test]
    async fn test_dead_token_without_successful_refresh_logs_out() {
        let remote = Arc::new(FakeAuthority::default());
        let session = manager(remote.clone());
        session.install(credential("t1", NOW - 5)).await;

        assert!(!session.has_live_token().await);
        assert!(matches!(
            session.ensure_fresh().await,
            Err(ClientError::ReauthenticationRequired)
        ));
        assert!(session.credential().await.is_none());
    }
}
