//! Bearer token and its validity rules

use serde::{Deserialize, Serialize};
use shared::client::TokenResponse;

/// Proactive refresh margin
pub const DEFAULT_REFRESH_MARGIN_SECS: i64 = 300;

/// Access token held by the booth
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Expiry as Unix seconds
    pub exp: i64,
}

impl SessionToken {
    /// Build from an auth response, falling back to the JWT `exp` claim when
    /// the response carries no usable expiry.
    pub fn from_response(resp: TokenResponse) -> Self {
        let exp = if resp.exp > 0 {
            resp.exp
        } else {
            Self::parse_jwt_exp(&resp.access_token).unwrap_or(0)
        };
        Self {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            exp,
        }
    }

    /// Seconds left before strict expiry (negative once dead)
    pub fn remaining_secs(&self, now_secs: i64) -> i64 {
        self.exp - now_secs
    }

    /// `exp` claim of a JWT (Unix seconds)
    pub fn parse_jwt_exp(token: &str) -> Option<i64> {
        // header.payload.signature
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return None;
        }

        use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
        let payload_bytes = URL_SAFE_NO_PAD.decode(parts[1]).ok()?;
        let payload: serde_json::Value = serde_json::from_slice(&payload_bytes).ok()?;
        payload.get("exp")?.as_i64()
    }
}

/// Usable for an authorized call: false once `now >= exp - margin`
pub fn is_valid(token: &SessionToken, margin_secs: i64, now_secs: i64) -> bool {
    now_secs < token.exp - margin_secs
}

/// Strict expiry, no margin
pub fn is_expired(token: &SessionToken, now_secs: i64) -> bool {
    now_secs >= token.exp
}

/// Still alive but inside the margin: refresh before the next call
pub fn needs_refresh(token: &SessionToken, margin_secs: i64, now_secs: i64) -> bool {
    !is_expired(token, now_secs) && !is_valid(token, margin_secs, now_secs)
}
