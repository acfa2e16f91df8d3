// booth-client/tests/remote_http.rs
// HTTP contract tests against an axum mock authority

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use booth_client::{
    AuditLogBatch, AuditLogPushResponse, AuthContext, ClientConfig, ClientError, HttpRemoteClient,
    LoginRequest, RefreshRequest, RemoteApi, TokenResponse, VoterPullResponse,
};
use shared::models::{AuditLogEntry, VerificationMethod, VerificationResult, VoterRecord};

#[derive(Default)]
struct Authority {
    pushed: Mutex<Vec<AuditLogBatch>>,
    pull_queries: Mutex<Vec<HashMap<String, String>>>,
    booth_headers: Mutex<Vec<String>>,
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn login(Json(req): Json<LoginRequest>) -> Result<Json<TokenResponse>, StatusCode> {
    if req.password != "secret" {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(Json(TokenResponse {
        access_token: format!("access-{}", req.booth_id),
        refresh_token: Some("refresh-1".to_string()),
        exp: 1_900_000_000,
    }))
}

async fn refresh(
    headers: HeaderMap,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, StatusCode> {
    match (bearer(&headers).as_deref(), req.refresh_token.as_deref()) {
        (Some("access-BOOTH-7"), Some("refresh-1")) => Ok(Json(TokenResponse {
            access_token: "access-2".to_string(),
            refresh_token: None,
            exp: 1_900_003_600,
        })),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

async fn push_audit_logs(
    State(state): State<Arc<Authority>>,
    headers: HeaderMap,
    Json(batch): Json<AuditLogBatch>,
) -> Result<Json<AuditLogPushResponse>, StatusCode> {
    if bearer(&headers).as_deref() != Some("access-BOOTH-7") {
        return Err(StatusCode::UNAUTHORIZED);
    }
    if let Some(booth) = headers.get("x-booth-id").and_then(|v| v.to_str().ok()) {
        state.booth_headers.lock().unwrap().push(booth.to_string());
    }
    let successful = batch.logs.len() as u32;
    state.pushed.lock().unwrap().push(batch);
    Ok(Json(AuditLogPushResponse {
        successful,
        errors: vec![],
    }))
}

async fn pull_voters(
    State(state): State<Arc<Authority>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<VoterPullResponse>, StatusCode> {
    if bearer(&headers).is_none() {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let since: i64 = query
        .get("since")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    state.pull_queries.lock().unwrap().push(query);

    Ok(Json(VoterPullResponse {
        voters: vec![VoterRecord {
            voter_id: "ABC1234567".to_string(),
            full_name: "Asha Verma".to_string(),
            registered_mobile: None,
            district: "Pune".to_string(),
            polling_booth: "BOOTH-7".to_string(),
            is_active: true,
            last_synced_at: None,
        }],
        watermark: since + 10,
    }))
}

async fn slow_health() -> StatusCode {
    tokio::time::sleep(Duration::from_secs(5)).await;
    StatusCode::OK
}

async fn spawn_authority(state: Arc<Authority>) -> SocketAddr {
    let api = Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/sync/audit-logs", post(push_audit_logs))
        .route("/sync/voters", get(pull_voters))
        .with_state(state);
    let app = Router::new().nest("/api", api);
    serve(app).await
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr) -> HttpRemoteClient {
    ClientConfig::new(format!("http://{addr}/api"))
        .build_http_client()
        .unwrap()
}

fn auth() -> AuthContext {
    AuthContext {
        token: "access-BOOTH-7".to_string(),
        booth_id: "BOOTH-7".to_string(),
    }
}

fn entry(local_id: u64) -> AuditLogEntry {
    AuditLogEntry {
        local_id,
        voter_id: "ABC1234567".to_string(),
        booth_id: "BOOTH-7".to_string(),
        verification_method: VerificationMethod::Otp,
        verification_result: VerificationResult::Success,
        failure_reason: None,
        timestamp: 1_700_000_000_000 + local_id as i64,
        hmac_signature: "ab".repeat(32),
        is_synced: false,
        synced_at: None,
    }
}

#[tokio::test]
async fn test_health_check() {
    let addr = spawn_authority(Arc::new(Authority::default())).await;
    client_for(addr).health().await.unwrap();
}

#[tokio::test]
async fn test_login_and_refresh() {
    let addr = spawn_authority(Arc::new(Authority::default())).await;
    let client = client_for(addr);

    let token = client
        .login(&LoginRequest {
            username: "officer-1".to_string(),
            password: "secret".to_string(),
            booth_id: "BOOTH-7".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(token.access_token, "access-BOOTH-7");
    assert_eq!(token.refresh_token.as_deref(), Some("refresh-1"));

    let refreshed = client
        .refresh(
            &token.access_token,
            &RefreshRequest {
                refresh_token: token.refresh_token.clone(),
            },
        )
        .await
        .unwrap();
    assert_eq!(refreshed.access_token, "access-2");
    assert_eq!(refreshed.exp, 1_900_003_600);
}

#[tokio::test]
async fn test_bad_password_maps_to_unauthorized() {
    let addr = spawn_authority(Arc::new(Authority::default())).await;
    let err = client_for(addr)
        .login(&LoginRequest {
            username: "officer-1".to_string(),
            password: "wrong".to_string(),
            booth_id: "BOOTH-7".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized(_)));
    assert!(err.is_auth());
}

#[tokio::test]
async fn test_push_sends_bearer_and_booth_header() {
    let state = Arc::new(Authority::default());
    let addr = spawn_authority(state.clone()).await;

    let batch = AuditLogBatch {
        logs: vec![entry(1), entry(2)],
        booth_id: "BOOTH-7".to_string(),
    };
    let response = client_for(addr).push_audit_logs(&auth(), &batch).await.unwrap();
    assert!(response.is_clean());
    assert_eq!(response.successful, 2);

    let pushed = state.pushed.lock().unwrap();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].logs[1].local_id, 2);
    assert_eq!(pushed[0].booth_id, "BOOTH-7");
    assert_eq!(*state.booth_headers.lock().unwrap(), vec!["BOOTH-7".to_string()]);
}

#[tokio::test]
async fn test_push_with_stale_token_is_unauthorized() {
    let addr = spawn_authority(Arc::new(Authority::default())).await;
    let stale = AuthContext {
        token: "revoked".to_string(),
        booth_id: "BOOTH-7".to_string(),
    };
    let batch = AuditLogBatch {
        logs: vec![entry(1)],
        booth_id: "BOOTH-7".to_string(),
    };
    let err = client_for(addr)
        .push_audit_logs(&stale, &batch)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized(_)));
}

#[tokio::test]
async fn test_pull_passes_booth_and_cursor() {
    let state = Arc::new(Authority::default());
    let addr = spawn_authority(state.clone()).await;
    let client = client_for(addr);

    let first = client.pull_voters(&auth(), None).await.unwrap();
    assert_eq!(first.watermark, 10);
    assert_eq!(first.voters.len(), 1);
    assert_eq!(first.voters[0].voter_id, "ABC1234567");

    let second = client.pull_voters(&auth(), Some(first.watermark)).await.unwrap();
    assert_eq!(second.watermark, 20);

    let queries = state.pull_queries.lock().unwrap();
    assert_eq!(queries[0].get("booth_id").map(String::as_str), Some("BOOTH-7"));
    assert!(!queries[0].contains_key("since"));
    assert_eq!(queries[1].get("since").map(String::as_str), Some("10"));
}

#[tokio::test]
async fn test_health_timeout_is_network_class() {
    let app = Router::new().route("/api/health", get(slow_health));
    let addr = serve(app).await;

    let client = ClientConfig::new(format!("http://{addr}/api"))
        .with_probe_timeout_ms(200)
        .build_http_client()
        .unwrap();

    let err = client.health().await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout(_)));
    assert!(err.is_network());
}

#[tokio::test]
async fn test_unreachable_authority_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client_for(addr).health().await.unwrap_err();
    assert!(err.is_network());
}
