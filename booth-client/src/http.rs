//! HTTP client for the remote authority API
//!
//! ```text
//! GET  /health                       reachability probe (short timeout)
//! POST /auth/login                   -> TokenResponse
//! POST /auth/refresh                 -> TokenResponse
//! POST /sync/audit-logs              -> AuditLogPushResponse
//! GET  /sync/voters?booth_id=&since= -> VoterPullResponse
//! ```

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use shared::client::{
    AuditLogBatch, AuditLogPushResponse, LoginRequest, RefreshRequest, TokenResponse,
    VoterPullResponse,
};

use crate::{ClientConfig, ClientError, ClientResult};

/// Header identifying the booth on every authorized call
pub const BOOTH_ID_HEADER: &str = "X-Booth-Id";

/// Credentials attached to an authorized call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub token: String,
    pub booth_id: String,
}

/// Remote authority operations used by the session and the sync engine
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Lightweight reachability check; any 2xx means reachable
    async fn health(&self) -> ClientResult<()>;

    async fn login(&self, request: &LoginRequest) -> ClientResult<TokenResponse>;

    /// Exchange the current token (and refresh token, if any) for a new one
    async fn refresh(
        &self,
        access_token: &str,
        request: &RefreshRequest,
    ) -> ClientResult<TokenResponse>;

    async fn push_audit_logs(
        &self,
        auth: &AuthContext,
        batch: &AuditLogBatch,
    ) -> ClientResult<AuditLogPushResponse>;

    /// Voter records changed after `since` (everything when `None`)
    async fn pull_voters(
        &self,
        auth: &AuthContext,
        since: Option<i64>,
    ) -> ClientResult<VoterPullResponse>;
}

/// reqwest-backed [`RemoteApi`]
#[derive(Debug, Clone)]
pub struct HttpRemoteClient {
    client: Client,
    base_url: String,
    probe_timeout: std::time::Duration,
}

impl HttpRemoteClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            probe_timeout: config.probe_timeout(),
        })
    }

    /// Base URL of the remote authority
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, req: RequestBuilder, auth: &AuthContext) -> RequestBuilder {
        req.bearer_auth(&auth.token)
            .header(BOOTH_ID_HEADER, &auth.booth_id)
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}

fn status_error(status: StatusCode, body: String) -> ClientError {
    match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized(body),
        StatusCode::FORBIDDEN => ClientError::Forbidden(body),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ClientError::Validation(body),
        _ => ClientError::Server {
            status: status.as_u16(),
            body,
        },
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteClient {
    async fn health(&self) -> ClientResult<()> {
        let response = self
            .client
            .get(self.url("health"))
            .timeout(self.probe_timeout)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(status_error(status, String::new()))
        }
    }

    async fn login(&self, request: &LoginRequest) -> ClientResult<TokenResponse> {
        let response = self
            .client
            .post(self.url("auth/login"))
            .json(request)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn refresh(
        &self,
        access_token: &str,
        request: &RefreshRequest,
    ) -> ClientResult<TokenResponse> {
        let response = self
            .client
            .post(self.url("auth/refresh"))
            .bearer_auth(access_token)
            .json(request)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn push_audit_logs(
        &self,
        auth: &AuthContext,
        batch: &AuditLogBatch,
    ) -> ClientResult<AuditLogPushResponse> {
        let req = self.client.post(self.url("sync/audit-logs")).json(batch);
        let response = self.authorized(req, auth).send().await?;
        Self::handle_response(response).await
    }

    async fn pull_voters(
        &self,
        auth: &AuthContext,
        since: Option<i64>,
    ) -> ClientResult<VoterPullResponse> {
        let mut query: Vec<(&str, String)> = vec![("booth_id", auth.booth_id.clone())];
        if let Some(since) = since {
            query.push(("since", since.to_string()));
        }

        let req = self.client.get(self.url("sync/voters")).query(&query);
        let response = self.authorized(req, auth).send().await?;
        Self::handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "expired".into()),
            ClientError::Unauthorized(_)
        ));
        assert!(matches!(
            status_error(StatusCode::UNPROCESSABLE_ENTITY, String::new()),
            ClientError::Validation(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, String::new()),
            ClientError::Server { status: 502, .. }
        ));
    }

    #[test]
    fn test_url_join_trims_slashes() {
        let client = HttpRemoteClient::new(&ClientConfig::new("http://authority.local/api/")).unwrap();
        assert_eq!(client.base_url(), "http://authority.local/api");
        assert_eq!(client.url("/sync/voters"), "http://authority.local/api/sync/voters");
    }
}
