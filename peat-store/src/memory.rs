//! In-memory durable store.
//!
//! Thread-safe storage suitable for development, testing and as the working
//! set of [`FileStore`](crate::FileStore). Nothing survives a restart.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, instrument};

use peat_core::error::Result;
use peat_core::traits::DurableStore;
use peat_core::types::DurableRecord;

/// In-memory store of durable records, keyed by lowercased email.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, DurableRecord>,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns all records (for export/backup), ordered by email.
    pub fn all_records(&self) -> Vec<DurableRecord> {
        let mut records: Vec<_> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.email.cmp(&b.email));
        records
    }

    /// Imports records, replacing any with the same email.
    ///
    /// Returns the number of records imported.
    pub fn import(&self, records: Vec<DurableRecord>) -> usize {
        let mut imported = 0;
        for mut record in records {
            record.email = Self::normalize(&record.email);
            if record.email.is_empty() {
                continue;
            }
            self.records.insert(record.email.clone(), record);
            imported += 1;
        }
        debug!(imported, "imported durable records");
        imported
    }

    /// Removes every record, returning how many were removed.
    pub fn clear_all(&self) -> u64 {
        let removed = self.records.len() as u64;
        self.records.clear();
        removed
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    #[instrument(skip(self))]
    async fn find(&self, email: &str) -> Result<Option<DurableRecord>> {
        Ok(self
            .records
            .get(&Self::normalize(email))
            .map(|entry| entry.value().clone()))
    }

    #[instrument(skip(self, record), fields(email = %record.email))]
    async fn upsert(&self, mut record: DurableRecord) -> Result<()> {
        record.email = Self::normalize(&record.email);
        self.records.insert(record.email.clone(), record);
        Ok(())
    }

    async fn clear(&self) -> Result<u64> {
        Ok(self.clear_all())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records.len() as u64)
    }
}
