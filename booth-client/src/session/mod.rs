//! Session lifecycle
//!
//! Tracks the bearer token's validity, refreshes it proactively inside the
//! margin and reactively after a 401, and clears all credential state when
//! a refresh-and-retry still fails.

pub mod credential;
pub mod manager;
pub mod token;

pub use credential::{Credential, CredentialStorage};
pub use manager::{SessionConfig, SessionManager};
pub use token::{is_expired, is_valid, SessionToken, DEFAULT_REFRESH_MARGIN_SECS};
