use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};

/// The record persisted for one identity.
///
/// Stored as JSON with named fields so records written by other versions
/// stay decodable; unknown fields are ignored on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl CachedToken {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>, user_id: Option<&str>) -> Self {
        Self {
            token: token.into(),
            expires_at,
            user_id: user_id.filter(|u| !u.is_empty()).map(str::to_string),
        }
    }

    pub fn encode(&self) -> CacheResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(CacheError::Encode)
    }

    pub fn decode(data: &[u8]) -> CacheResult<Self> {
        let mut record: CachedToken = serde_json::from_slice(data).map_err(CacheError::Decode)?;
        // Older writers emitted "user_id": "" instead of omitting it
        if record.user_id.as_deref() == Some("") {
            record.user_id = None;
        }
        Ok(record)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Still valid at exactly `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// True when an expected owner is given, the record names an owner,
    /// and the two differ.
    pub fn belongs_to_other(&self, expected_user_id: Option<&str>) -> bool {
        match (expected_user_id.filter(|u| !u.is_empty()), self.user_id.as_deref()) {
            (Some(expected), Some(owner)) => expected != owner,
            _ => false,
        }
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }
}

// ============================================================================
// Tests
// ============================================================================
