//! Constants shared across PEAT crates.

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE WINDOWS
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifetime of an ephemeral cache entry, in seconds (1 hour).
pub const EPHEMERAL_TTL_SECS: u64 = 60 * 60;

/// Maximum number of entries held by the ephemeral cache.
pub const EPHEMERAL_MAX_ENTRIES: usize = 1000;

/// Fraction of entries evicted when the ephemeral cache is full.
pub const EPHEMERAL_EVICTION_FRACTION: f64 = 0.1;

/// Interval between background sweeps of expired entries, in seconds (30 minutes).
pub const EPHEMERAL_SWEEP_INTERVAL_SECS: u64 = 30 * 60;

/// A durable record is served only while younger than this, in hours.
pub const DURABLE_MAX_AGE_HOURS: i64 = 24;

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTITY LIMITS
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum number of usernames in one scan.
pub const MAX_USERNAMES: usize = 5;

/// Maximum length of a single username.
pub const MAX_USERNAME_LEN: usize = 50;

/// Minimum / maximum total email length (RFC 5321).
pub const MIN_EMAIL_LEN: usize = 5;
/// Maximum total email length (RFC 5321).
pub const MAX_EMAIL_LEN: usize = 254;

/// Maximum length of the local part of an email.
pub const MAX_EMAIL_LOCAL_LEN: usize = 64;

// ═══════════════════════════════════════════════════════════════════════════════
// SEVERITY / RISK
// ═══════════════════════════════════════════════════════════════════════════════

/// Exposed data classes that make a breach critical.
pub const CRITICAL_DATA_CLASSES: &[&str] = &["Passwords", "Credit card data", "Social security numbers"];

/// Exposed data classes that make a breach high severity.
pub const HIGH_DATA_CLASSES: &[&str] = &["Email addresses", "Usernames", "Phone numbers"];

/// Data class counted by `RiskSummary::high_risk_count`.
pub const PASSWORD_DATA_CLASS: &str = "Passwords";

/// Per-breach weight of `RiskSummary::average_score`.
pub const BREACH_SCORE_WEIGHT: u32 = 2;

/// Substrings (lowercase) that mark a data class as sensitive in narratives.
pub const SENSITIVE_DATA_MARKERS: &[&str] = &[
    "password",
    "credit card",
    "phone number",
    "physical address",
    "dates of birth",
    "social security number",
];

// ═══════════════════════════════════════════════════════════════════════════════
// EXTERNAL CALLS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default timeout for a single lookup or probe, in seconds.
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 180;

/// Default timeout for narrative generation, in seconds.
pub const DEFAULT_NARRATIVE_TIMEOUT_SECS: u64 = 60;

/// Default timeout for one durable store round trip, in seconds.
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 5;

/// Quick scans with more breaches than this keep only the most recent ones.
pub const QUICK_SCAN_BREACH_LIMIT: usize = 200;

/// Breaches kept by a truncated quick scan.
pub const QUICK_SCAN_SHOWN_BREACHES: usize = 20;

/// User agent sent to external HTTP services.
pub const USER_AGENT: &str = "PEAT-Privacy-Awareness-Tool";
