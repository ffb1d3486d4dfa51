//! Error types for PEAT.
//!
//! One error hierarchy for every crate in the workspace, built with `thiserror`.
//! Only validation errors are meant to reach callers of the scanner; the rest
//! are classified so the orchestrator can degrade instead of failing.

use thiserror::Error;

/// Result type alias using `PeatError`.
pub type Result<T> = std::result::Result<T, PeatError>;

/// Main error type for all PEAT operations.
#[derive(Debug, Error)]
pub enum PeatError {
    // ═══════════════════════════════════════════════════════════════════════════
    // VALIDATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Input validation failed.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Malformed or unsafe email address.
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    /// Malformed or unsafe username.
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // SOURCE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// An external lookup returned an unexpected response.
    #[error("{source_name} lookup failed: {reason}")]
    SourceFailed { source_name: String, reason: String },

    /// An external lookup did not answer in time.
    #[error("{source_name} timed out after {seconds}s")]
    SourceTimeout { source_name: String, seconds: u64 },

    /// A probe subprocess could not be run or exited unsuccessfully.
    #[error("Probe '{probe}' failed: {reason}")]
    ProbeFailed { probe: String, reason: String },

    /// Narrative generation failed.
    #[error("Narrative generation failed: {0}")]
    NarrativeError(String),

    /// HTTP request failed at the transport level.
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // CACHE / STORE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Reading from a cache tier failed.
    #[error("Cache read failed: {0}")]
    CacheReadFailed(String),

    /// Writing to a cache tier failed.
    #[error("Cache write failed: {0}")]
    CacheWriteFailed(String),

    /// The durable store is corrupted or unusable.
    #[error("Store error: {0}")]
    StoreError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Persisted format version mismatch.
    #[error("Format version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u8, actual: u8 },

    // ═══════════════════════════════════════════════════════════════════════════
    // CONFIGURATION / INTERNAL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl PeatError {
    /// Builds a [`PeatError::SourceFailed`] for the named source.
    pub fn source_failed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        PeatError::SourceFailed {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error is transient (retrying later may succeed).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PeatError::HttpError(_)
                | PeatError::SourceTimeout { .. }
                | PeatError::CacheReadFailed(_)
                | PeatError::CacheWriteFailed(_)
        )
    }

    /// Returns true if this is a validation error.
    ///
    /// Validation errors are the only kind the scanner returns to callers.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            PeatError::ValidationError(_)
                | PeatError::InvalidEmail(_)
                | PeatError::InvalidUsername(_)
        )
    }

    /// Returns true if this error came from an external lookup.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            PeatError::SourceFailed { .. }
                | PeatError::SourceTimeout { .. }
                | PeatError::ProbeFailed { .. }
                | PeatError::NarrativeError(_)
                | PeatError::HttpError(_)
        )
    }

    /// Returns true if this error came from a cache tier or its backing store.
    pub fn is_cache_error(&self) -> bool {
        matches!(
            self,
            PeatError::CacheReadFailed(_)
                | PeatError::CacheWriteFailed(_)
                | PeatError::StoreError(_)
                | PeatError::VersionMismatch { .. }
        )
    }
}
