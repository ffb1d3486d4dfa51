//! # PEAT Scanner
//!
//! Aggregates a person's public exposure into one [`ScanResult`].
//!
//! ## Features
//!
//! - **Two cache tiers**: an in-process ephemeral cache, then (for emails) a
//!   durable store with a 24 hour staleness window
//! - **Concurrent fan-out**: breach, registration and presence lookups run
//!   together, each under its own timeout
//! - **Failure isolation**: a failing source degrades to empty data and is
//!   flagged in the result metadata; only validation errors are returned
//! - **Cancellation safe**: caches are written only after every lookup settled
//! - **Quick scans**: email-only breach and registration lookups that bypass
//!   both cache tiers and cap very long breach histories
//!
//! ## Example
//!
//! ```rust,ignore
//! use peat_scanner::{Adapters, ExposureScanner};
//!
//! let scanner = ExposureScanner::new(adapters, Arc::new(EphemeralCache::new()))
//!     .with_durable(DurableCache::new(store));
//!
//! let result = scanner.resolve(Identity::email("alice@example.com")?, false).await?;
//! println!("{} breaches", result.breaches.len());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

use std::time::Duration;

use serde::{Deserialize, Serialize};

use peat_cache::CacheStats;
use peat_core::constants::{DEFAULT_NARRATIVE_TIMEOUT_SECS, DEFAULT_SOURCE_TIMEOUT_SECS};
use peat_core::error::Result;
use peat_core::types::Identity;
use peat_store::DurableStats;

mod scanner;

pub use peat_core::types::ScanResult;
pub use scanner::{Adapters, ExposureScanner};

/// Scanner configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Timeout for each breach, registration or presence lookup
    pub source_timeout: Duration,
    /// Timeout for narrative generation
    pub narrative_timeout: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            source_timeout: Duration::from_secs(DEFAULT_SOURCE_TIMEOUT_SECS),
            narrative_timeout: Duration::from_secs(DEFAULT_NARRATIVE_TIMEOUT_SECS),
        }
    }
}

impl ScannerConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-lookup timeout.
    pub fn source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    /// Sets the narrative timeout.
    pub fn narrative_timeout(mut self, timeout: Duration) -> Self {
        self.narrative_timeout = timeout;
        self
    }
}

/// One scan request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanRequest {
    /// Who to scan
    pub identity: Identity,
    /// Skip both cache tiers on read (results are still written)
    pub force_refresh: bool,
    /// Usernames to probe for an email scan, instead of the local part
    pub presence_usernames: Option<Vec<String>>,
}

impl ScanRequest {
    /// Creates a request that may be served from cache.
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            force_refresh: false,
            presence_usernames: None,
        }
    }

    /// Sets the force-refresh flag.
    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    /// Overrides the usernames probed for an email scan.
    pub fn with_presence_usernames(mut self, usernames: Vec<String>) -> Self {
        self.presence_usernames = Some(usernames);
        self
    }

    /// Validates the presence override with the same rules as a username
    /// scan.
    ///
    /// A missing or all-blank override yields `None`.
    pub fn validated_presence_usernames(&self) -> Result<Option<Vec<String>>> {
        let Some(names) = &self.presence_usernames else {
            return Ok(None);
        };
        if names.iter().all(|n| n.trim().is_empty()) {
            return Ok(None);
        }
        match Identity::usernames(names)? {
            Identity::Usernames(names) => Ok(Some(names)),
            Identity::Email(_) => Ok(None),
        }
    }
}

/// Observability snapshot of both cache tiers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerStats {
    /// Ephemeral tier
    pub ephemeral: CacheStats,
    /// Durable tier, when configured
    pub durable: Option<DurableStats>,
}

/// Outcome of an administrative cache purge.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearSummary {
    /// Entries removed from the ephemeral tier
    pub ephemeral_cleared: usize,
    /// Records removed from the durable tier, when it was cleared
    pub durable_cleared: Option<u64>,
    /// Why clearing the durable tier failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub durable_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ScanRequest {
        ScanRequest::new(Identity::Email("alice@example.com".into()))
    }

    #[test]
    fn test_presence_override_is_normalized() {
        let request = request().with_presence_usernames(vec![" alice_w ".into(), "".into(), "alice_w".into()]);
        assert_eq!(
            request.validated_presence_usernames().unwrap(),
            Some(vec!["alice_w".to_string()])
        );
    }

    #[test]
    fn test_blank_presence_override_is_ignored() {
        assert_eq!(request().validated_presence_usernames().unwrap(), None);
        let blank = request().with_presence_usernames(vec![" ".into()]);
        assert_eq!(blank.validated_presence_usernames().unwrap(), None);
    }

    #[test]
    fn test_presence_override_rejects_option_like_names() {
        for bad in ["--output", "-v", "a b", "../etc"] {
            let request = request().with_presence_usernames(vec![bad.into()]);
            assert!(request.validated_presence_usernames().is_err(), "{}", bad);
        }

        let too_many = request().with_presence_usernames((0..6).map(|i| format!("user{}", i)).collect());
        assert!(too_many.validated_presence_usernames().is_err());
    }
}
