//! Scan results, their metadata and the records derived from them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{BREACH_SCORE_WEIGHT, PASSWORD_DATA_CLASS};
use crate::error::Result;
use crate::types::{BreachRecord, Identity, ScanKind};

/// A platform on which a probed username was found.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsernameHit {
    /// Platform name, usually the host of the profile URL
    pub platform: String,
    /// Profile URL
    pub url: String,
}

impl UsernameHit {
    /// Creates a new hit.
    pub fn new(platform: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            url: url.into(),
        }
    }
}

/// A service reported by the registration probe.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRegistration {
    /// Service name, usually its domain
    pub service: String,
    /// The service rate limited the check, so the registration is unconfirmed
    #[serde(default)]
    pub rate_limited: bool,
}

impl ServiceRegistration {
    /// A confirmed registration.
    pub fn confirmed(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            rate_limited: false,
        }
    }

    /// A service that rate limited the check.
    pub fn rate_limited(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            rate_limited: true,
        }
    }
}

impl From<&str> for ServiceRegistration {
    fn from(service: &str) -> Self {
        Self::confirmed(service)
    }
}

impl From<String> for ServiceRegistration {
    fn from(service: String) -> Self {
        Self::confirmed(service)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE OUTCOME
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of one external lookup within a scan.
///
/// Separates "the source answered with nothing" from "the source failed and
/// its contribution was replaced by an empty value".
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceOutcome<T> {
    /// The source answered with data.
    Found(T),
    /// The source answered, with nothing to report.
    Empty,
    /// The source failed; its data is treated as empty.
    Degraded {
        /// Why the source failed
        reason: String,
    },
}

impl<T> SourceOutcome<Vec<T>> {
    /// Classifies the result of a list-returning lookup.
    pub fn from_lookup(result: Result<Vec<T>>) -> Self {
        match result {
            Ok(items) if items.is_empty() => SourceOutcome::Empty,
            Ok(items) => SourceOutcome::Found(items),
            Err(e) => SourceOutcome::Degraded {
                reason: e.to_string(),
            },
        }
    }
}

impl<T> SourceOutcome<T> {
    /// Builds a degraded outcome.
    pub fn degraded(reason: impl Into<String>) -> Self {
        SourceOutcome::Degraded {
            reason: reason.into(),
        }
    }

    /// Returns true if the source answered (with or without data).
    pub fn is_success(&self) -> bool {
        !matches!(self, SourceOutcome::Degraded { .. })
    }

    /// Returns the failure reason of a degraded outcome.
    pub fn degradation_reason(&self) -> Option<&str> {
        match self {
            SourceOutcome::Degraded { reason } => Some(reason),
            _ => None,
        }
    }

    /// Unwraps the data, substituting the empty default otherwise.
    pub fn into_value(self) -> T
    where
        T: Default,
    {
        match self {
            SourceOutcome::Found(value) => value,
            SourceOutcome::Empty | SourceOutcome::Degraded { .. } => T::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCAN RESULT
// ═══════════════════════════════════════════════════════════════════════════════

/// Cache tier a result was served from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheSource {
    /// The in-process ephemeral cache
    Memory,
    /// The persistent durable cache
    Durable,
}

/// Whether each external source answered during the scan.
///
/// `false` means the source failed or was not consulted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFlags {
    /// Breach lookup
    pub hibp: bool,
    /// Registration probe
    pub holehe: bool,
    /// Username presence probe
    pub sherlock: bool,
    /// Narrative generator (false when the fallback text was used)
    pub narrative: bool,
}

/// Elapsed time per scan stage, in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    /// Breach lookup
    pub breach_ms: u64,
    /// Registration probe
    pub registration_ms: u64,
    /// Username presence probe
    pub presence_ms: u64,
    /// Narrative generation
    pub narrative_ms: u64,
    /// Whole fresh scan
    pub total_ms: u64,
}

/// Metadata attached to every scan result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanMeta {
    /// When the fresh scan producing this result finished
    pub generated_at: DateTime<Utc>,
    /// Whether this copy was served from a cache tier
    #[serde(default)]
    pub cached: bool,
    /// When the served cache entry was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
    /// Tier the result was served from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_source: Option<CacheSource>,
    /// Per-source success flags
    #[serde(default)]
    pub sources: SourceFlags,
    /// Per-stage timing
    #[serde(default)]
    pub timing: StageTiming,
    /// True when at least one consulted source degraded, or the breach
    /// list was truncated
    #[serde(default)]
    pub partial: bool,
    /// True when a quick scan kept only the most recent breaches
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub breach_count_truncated: bool,
    /// Breaches reported by the source before truncation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_breaches: Option<usize>,
}

/// The merged output of one scan.
///
/// Every field has an empty default so a degraded source never changes the
/// shape of the result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Scanned email, for email scans
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Scanned (or presence-probed) usernames
    #[serde(default)]
    pub usernames: Vec<String>,
    /// Scan kind
    #[serde(default)]
    pub kind: ScanKind,
    /// Breaches, newest first
    #[serde(default)]
    pub breaches: Vec<BreachRecord>,
    /// Services the email is registered on
    #[serde(default)]
    pub registrations: Vec<String>,
    /// Services that rate limited the registration check
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rate_limited: Vec<String>,
    /// Platforms on which a username was found
    #[serde(default)]
    pub username_hits: Vec<UsernameHit>,
    /// Narrative report
    #[serde(default)]
    pub narrative: String,
    /// Set when the scan itself failed; such results are never cached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Metadata
    #[serde(default)]
    pub meta: ScanMeta,
}

impl ScanResult {
    /// Creates an empty result echoing the identity.
    pub fn new(identity: &Identity) -> Self {
        let (email, usernames) = match identity {
            Identity::Email(email) => (Some(email.clone()), Vec::new()),
            Identity::Usernames(names) => (None, names.clone()),
        };
        Self {
            email,
            usernames,
            kind: identity.kind(),
            meta: ScanMeta {
                generated_at: Utc::now(),
                ..ScanMeta::default()
            },
            ..Self::default()
        }
    }

    /// Returns true if the result holds at least one positive finding.
    pub fn has_findings(&self) -> bool {
        !self.breaches.is_empty() || !self.registrations.is_empty() || !self.username_hits.is_empty()
    }

    /// Returns true if the result may be written to a cache tier.
    pub fn is_cache_worthy(&self) -> bool {
        self.error.is_none() && self.has_findings()
    }

    /// Returns a copy stamped as served from a cache tier.
    pub fn served_from(&self, source: CacheSource, cached_at: DateTime<Utc>) -> Self {
        let mut copy = self.clone();
        copy.meta.cached = true;
        copy.meta.cached_at = Some(cached_at);
        copy.meta.cache_source = Some(source);
        copy
    }

    /// Returns a copy with cache provenance cleared, as written to a tier.
    pub fn without_provenance(&self) -> Self {
        let mut copy = self.clone();
        copy.meta.cached = false;
        copy.meta.cached_at = None;
        copy.meta.cache_source = None;
        copy
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RISK SUMMARY / DURABLE RECORD
// ═══════════════════════════════════════════════════════════════════════════════

/// Headline numbers derived from a scan result.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSummary {
    /// Breach count weighted by two
    pub average_score: u32,
    /// Breaches plus registrations plus username hits
    pub total_hits: usize,
    /// Domain of the most recent breach
    pub highest_risk_domain: Option<String>,
    /// Breaches that exposed passwords
    pub high_risk_count: usize,
}

impl RiskSummary {
    /// Derives the summary from a result whose breaches are sorted newest first.
    pub fn from_result(result: &ScanResult) -> Self {
        let breach_count = result.breaches.len();
        Self {
            average_score: (breach_count as u32).saturating_mul(BREACH_SCORE_WEIGHT),
            total_hits: breach_count + result.registrations.len() + result.username_hits.len(),
            highest_risk_domain: result
                .breaches
                .first()
                .map(|b| b.domain.clone())
                .filter(|d| !d.is_empty()),
            high_risk_count: result
                .breaches
                .iter()
                .filter(|b| b.exposes(PASSWORD_DATA_CLASS))
                .count(),
        }
    }
}

/// A scan result as persisted by the durable tier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurableRecord {
    /// Lowercased email, the record key
    pub email: String,
    /// Stored result
    pub result: ScanResult,
    /// Summary computed when the record was written
    pub risk_summary: RiskSummary,
    /// When the email was last scanned
    pub last_checked: DateTime<Utc>,
}

impl DurableRecord {
    /// Creates a record checked now.
    pub fn new(email: impl Into<String>, result: ScanResult, risk_summary: RiskSummary) -> Self {
        Self {
            email: email.into().to_lowercase(),
            result,
            risk_summary,
            last_checked: Utc::now(),
        }
    }

    /// Returns true if the record is younger than `max_age` at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now.signed_duration_since(self.last_checked) < max_age
    }
}
