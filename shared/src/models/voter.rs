//! Voter Model

use serde::{Deserialize, Serialize};

/// Cached voter record (authoritative copy lives on the remote side)
///
/// Only the pull phase of a sync cycle creates or overwrites these rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRecord {
    pub voter_id: String,
    pub full_name: String,
    #[serde(default)]
    pub registered_mobile: Option<String>,
    pub district: String,
    pub polling_booth: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Set locally when the row was last written by a pull
    #[serde(default)]
    pub last_synced_at: Option<i64>,
}

fn default_active() -> bool {
    true
}

impl VoterRecord {
    /// Compare everything the authority owns, ignoring local bookkeeping
    pub fn same_content(&self, other: &VoterRecord) -> bool {
        self.voter_id == other.voter_id
            && self.full_name == other.full_name
            && self.registered_mobile == other.registered_mobile
            && self.district == other.district
            && self.polling_booth == other.polling_booth
            && self.is_active == other.is_active
    }

}
