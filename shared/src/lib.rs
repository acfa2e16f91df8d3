//! Shared types for the booth verification node
//!
//! Data model for the locally cached entities, the request/response types
//! exchanged with the remote authority, and the injectable clock used by
//! every time-sensitive component.

pub mod client;
pub mod clock;
pub mod models;
pub mod util;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use serde::{Deserialize, Serialize};
