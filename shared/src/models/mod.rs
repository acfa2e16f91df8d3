//! Data models
//!
//! Records held in the booth's local store and exchanged with the remote
//! authority. Timestamps are Unix milliseconds unless noted otherwise.

pub mod audit;
pub mod booth;
pub mod otp;
pub mod sync;
pub mod voter;

// Re-exports
pub use audit::*;
pub use booth::*;
pub use otp::*;
pub use sync::*;
pub use voter::*;
