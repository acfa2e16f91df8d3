//! Booth Client - access to the remote voter authority
//!
//! Provides the [`RemoteApi`] seam used by the sync engine, its HTTP
//! implementation, and the session lifecycle that keeps a bearer token
//! usable for authorized calls.

pub mod config;
pub mod error;
pub mod http;
pub mod session;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use http::{AuthContext, HttpRemoteClient, RemoteApi, BOOTH_ID_HEADER};
pub use session::{Credential, CredentialStorage, SessionConfig, SessionManager, SessionToken};

// Re-export shared wire types for convenience
pub use shared::client::{
    AuditLogBatch, AuditLogPushResponse, LoginRequest, RefreshRequest, TokenResponse,
    VoterPullResponse,
};
