//! DTOs for API requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use peat_core::error::{PeatError, Result};
use peat_core::types::Identity;
use peat_scanner::{ClearSummary, ScannerStats};

/// Query string of `GET /api/scan`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanQuery {
    /// Email to scan
    pub email: Option<String>,
    /// Single username to scan
    pub username: Option<String>,
    /// Comma-separated usernames to scan
    pub usernames: Option<String>,
    /// Skip both cache tiers on read
    #[serde(default)]
    pub force_refresh: bool,
}

impl ScanQuery {
    /// Usernames from `username` and `usernames`, in request order.
    pub fn username_list(&self) -> Vec<String> {
        self.username
            .iter()
            .chain(self.usernames.iter())
            .flat_map(|raw| raw.split(','))
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Builds the identity, rejecting a missing or mixed subject.
    pub fn identity(&self) -> Result<Identity> {
        Identity::parse(self.email.as_deref(), &self.username_list())
    }
}

/// Query string of `GET /api/scan/quick`.
#[derive(Debug, Default, Deserialize)]
pub struct QuickScanQuery {
    /// Email to scan
    pub email: Option<String>,
}

impl QuickScanQuery {
    /// Builds the email identity; quick scans never take usernames.
    pub fn identity(&self) -> Result<Identity> {
        match self.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            Some(email) => Identity::email(email),
            None => Err(PeatError::ValidationError(
                "a valid email is required for a quick scan".into(),
            )),
        }
    }
}

/// Query string of `DELETE /api/cache`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearQuery {
    /// Also purge the durable tier
    #[serde(default)]
    pub include_durable: bool,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Status
    pub status: String,
    /// Version
    pub version: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Entries in the ephemeral cache
    pub cache_entries: usize,
}

/// Cache statistics response.
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheStatsResponse {
    /// Stats of both tiers
    #[serde(flatten)]
    pub stats: ScannerStats,
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
}

/// Cache purge response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    /// What was removed
    #[serde(flatten)]
    pub summary: ClearSummary,
    /// When the purge ran
    pub timestamp: DateTime<Utc>,
}
