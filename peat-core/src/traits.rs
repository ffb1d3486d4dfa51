//! Common traits for PEAT.
//!
//! Each external collaborator sits behind one of these traits so the scanner
//! can be tested with in-process doubles.

use async_trait::async_trait;

use crate::error::Result;
use crate::narrative::NarrativeContext;
use crate::types::{BreachRecord, DurableRecord, ServiceRegistration, UsernameHit};

// ═══════════════════════════════════════════════════════════════════════════════
// LOOKUP ADAPTERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Looks up the breach history of an email.
#[async_trait]
pub trait BreachLookup: Send + Sync {
    /// Returns the breaches the email appears in.
    ///
    /// "Not found" and rate limiting are reported as an empty list. Errors are
    /// reserved for transport and protocol failures.
    async fn lookup(&self, email: &str) -> Result<Vec<BreachRecord>>;
}

/// Probes which services an email is registered on.
#[async_trait]
pub trait RegistrationProbe: Send + Sync {
    /// Returns the services the email is registered on, plus those that
    /// rate limited the check.
    async fn probe(&self, email: &str) -> Result<Vec<ServiceRegistration>>;
}

/// Probes third-party platforms for usernames.
#[async_trait]
pub trait UsernamePresenceProbe: Send + Sync {
    /// Returns one hit per platform profile found.
    async fn probe(&self, usernames: &[String]) -> Result<Vec<UsernameHit>>;
}

/// Produces the free-text report of a scan.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// Generates the report for the given context.
    async fn generate(&self, context: &NarrativeContext) -> Result<String>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// DURABLE STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Persistent key-value store of scan results, keyed by email.
///
/// Implementations might use:
/// - In-memory storage (for testing/development)
/// - A local file (single node)
/// - A document database (production)
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Finds the record for an email.
    async fn find(&self, email: &str) -> Result<Option<DurableRecord>>;

    /// Inserts or replaces the record for its email in a single operation.
    async fn upsert(&self, record: DurableRecord) -> Result<()>;

    /// Removes every record, returning how many were removed.
    async fn clear(&self) -> Result<u64>;

    /// Returns the number of stored records.
    async fn count(&self) -> Result<u64>;
}
