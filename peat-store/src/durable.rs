//! Durable cache adapter.
//!
//! Applies the staleness window and per-operation timeout on top of a
//! [`DurableStore`], and absorbs every store failure: a failed read is a miss,
//! a failed write is logged and dropped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use peat_core::constants::{DEFAULT_STORE_TIMEOUT_SECS, DURABLE_MAX_AGE_HOURS};
use peat_core::error::{PeatError, Result};
use peat_core::traits::DurableStore;
use peat_core::types::{CacheSource, DurableRecord, Identity, RiskSummary, ScanResult};

/// Durable cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DurableCacheConfig {
    /// Records older than this are ignored, in hours
    pub max_age_hours: i64,
    /// Timeout for one store round trip, in seconds
    pub op_timeout_seconds: u64,
}

impl Default for DurableCacheConfig {
    fn default() -> Self {
        Self {
            max_age_hours: DURABLE_MAX_AGE_HOURS,
            op_timeout_seconds: DEFAULT_STORE_TIMEOUT_SECS,
        }
    }
}

impl DurableCacheConfig {
    /// Sets the staleness window.
    pub fn with_max_age_hours(mut self, hours: i64) -> Self {
        self.max_age_hours = hours;
        self
    }

    /// Sets the per-operation timeout.
    pub fn with_op_timeout_seconds(mut self, seconds: u64) -> Self {
        self.op_timeout_seconds = seconds;
        self
    }
}

/// Observability snapshot of the durable tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurableStats {
    /// Whether the store answered
    pub available: bool,
    /// Stored records, when the store answered
    pub total_records: Option<u64>,
    /// Staleness window in hours
    pub max_age_hours: i64,
}

/// Adapter that turns a [`DurableStore`] into the second cache tier.
///
/// Only email identities are read or written.
#[derive(Clone)]
pub struct DurableCache {
    store: Arc<dyn DurableStore>,
    config: DurableCacheConfig,
}

impl DurableCache {
    /// Creates an adapter with default configuration.
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self::with_config(store, DurableCacheConfig::default())
    }

    /// Creates an adapter with custom configuration.
    pub fn with_config(store: Arc<dyn DurableStore>, config: DurableCacheConfig) -> Self {
        Self { store, config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DurableCacheConfig {
        &self.config
    }

    async fn guarded<T>(&self, op: &'static str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let timeout = Duration::from_secs(self.config.op_timeout_seconds);
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(PeatError::SourceTimeout {
                source_name: format!("durable store {}", op),
                seconds: self.config.op_timeout_seconds,
            }),
        }
    }

    /// Reads a fresh record for an email identity.
    ///
    /// Returns the stored result stamped as served from the durable tier.
    /// Username identities, stale records and any store failure read as a miss.
    #[instrument(skip(self, identity))]
    pub async fn read(&self, identity: &Identity) -> Option<ScanResult> {
        let email = identity.as_email()?;

        let record = match self.guarded("read", self.store.find(email)).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "durable cache read failed, treating as miss");
                return None;
            }
        };

        let max_age = chrono::Duration::hours(self.config.max_age_hours);
        if !record.is_fresh(Utc::now(), max_age) {
            debug!(last_checked = %record.last_checked, "durable record is stale");
            return None;
        }

        Some(record.result.served_from(CacheSource::Durable, record.last_checked))
    }

    /// Upserts the record for an email identity.
    ///
    /// Returns true if the store accepted the write. Failures are logged and
    /// never propagated.
    #[instrument(skip(self, identity, result, risk_summary))]
    pub async fn write(&self, identity: &Identity, result: &ScanResult, risk_summary: &RiskSummary) -> bool {
        let Some(email) = identity.as_email() else {
            return false;
        };

        let record = DurableRecord::new(email, result.without_provenance(), risk_summary.clone());
        match self.guarded("write", self.store.upsert(record)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "durable cache write failed, continuing");
                false
            }
        }
    }

    /// Removes every stored record.
    pub async fn clear(&self) -> Result<u64> {
        self.guarded("clear", self.store.clear()).await
    }

    /// Returns a snapshot of the tier.
    pub async fn stats(&self) -> DurableStats {
        let total_records = match self.guarded("count", self.store.count()).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(error = %e, "durable cache count failed");
                None
            }
        };
        DurableStats {
            available: total_records.is_some(),
            total_records,
            max_age_hours: self.config.max_age_hours,
        }
    }
}
