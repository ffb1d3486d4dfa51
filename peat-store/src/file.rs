//! File-based durable store with persistence.
//!
//! Keeps records in a [`MemoryStore`] and writes them to a single file.
//! Suitable for single-node deployments where results should survive restarts.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use peat_core::error::{PeatError, Result};
use peat_core::traits::DurableStore;
use peat_core::types::DurableRecord;

use crate::MemoryStore;

/// File format magic bytes
const MAGIC: &[u8; 4] = b"PEAT";
/// Current file format version
const VERSION: u8 = 1;
/// Magic + version + count
const HEADER_LEN: usize = 13;

/// File-based durable store.
///
/// # File Format
///
/// ```text
/// magic (4 bytes): "PEAT"
/// version (1 byte): 1
/// count (8 bytes, little endian): number of records
/// records (variable): JSON array of records
/// ```
pub struct FileStore {
    /// Path to the storage file
    path: PathBuf,
    /// Working set
    memory: MemoryStore,
    /// Whether there are unsaved changes
    dirty: AtomicBool,
    /// Auto-save threshold (save after N writes)
    auto_save_threshold: u64,
    /// Writes since last save
    writes_since_save: AtomicU64,
    /// Serializes saves so snapshot, write and rename never interleave
    save_lock: Mutex<()>,
}

impl FileStore {
    /// Opens the store at the given path.
    ///
    /// An existing file is loaded; otherwise the file is created on first save.
    /// Every write is saved immediately.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            memory: MemoryStore::new(),
            dirty: AtomicBool::new(false),
            auto_save_threshold: 0,
            writes_since_save: AtomicU64::new(0),
            save_lock: Mutex::new(()),
        };

        if store.path.exists() {
            store.load().await?;
        }

        Ok(store)
    }

    /// Opens the store, saving only after every `threshold` + 1 writes.
    pub async fn with_auto_save(path: impl AsRef<Path>, threshold: u64) -> Result<Self> {
        let mut store = Self::open(path).await?;
        store.auto_save_threshold = threshold;
        Ok(store)
    }

    #[instrument(skip(self), fields(path = ?self.path))]
    async fn load(&self) -> Result<()> {
        let mut file = fs::File::open(&self.path).await.map_err(|e| {
            PeatError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to open store file: {}", e),
            ))
        })?;

        let mut contents = Vec::new();
        file.read_to_end(&mut contents).await?;

        if contents.len() < HEADER_LEN {
            return Err(PeatError::StoreError("File too short".into()));
        }
        if &contents[0..4] != MAGIC {
            return Err(PeatError::StoreError("Invalid magic bytes".into()));
        }
        let version = contents[4];
        if version != VERSION {
            return Err(PeatError::VersionMismatch {
                expected: VERSION,
                actual: version,
            });
        }

        let count_bytes: [u8; 8] = contents[5..HEADER_LEN]
            .try_into()
            .map_err(|_| PeatError::StoreError("Truncated record count".into()))?;
        let count = u64::from_le_bytes(count_bytes);
        info!(count, "Loading durable records from file");

        if contents.len() > HEADER_LEN {
            let records: Vec<DurableRecord> = serde_json::from_slice(&contents[HEADER_LEN..])?;
            if records.len() as u64 != count {
                warn!(expected = count, actual = records.len(), "record count mismatch in store file");
            }
            self.memory.import(records);
        }

        self.dirty.store(false, Ordering::SeqCst);
        debug!("Store loaded successfully");
        Ok(())
    }

    /// Saves all records to the file.
    ///
    /// Concurrent callers queue on an async lock; each takes its snapshot
    /// only once it holds the lock, so the last save always sees every
    /// write that completed before it started.
    #[instrument(skip(self), fields(path = ?self.path))]
    pub async fn save(&self) -> Result<()> {
        let _guard = self.save_lock.lock().await;

        // Reset before the snapshot so writes racing this save stay counted.
        self.dirty.store(false, Ordering::SeqCst);
        self.writes_since_save.store(0, Ordering::SeqCst);

        let records = self.memory.all_records();
        let count = records.len() as u64;

        info!(count, "Saving durable records to file");

        let serialized = serde_json::to_vec(&records).map_err(|e| {
            self.dirty.store(true, Ordering::SeqCst);
            PeatError::from(e)
        })?;

        let mut contents = Vec::with_capacity(HEADER_LEN + serialized.len());
        contents.extend_from_slice(MAGIC);
        contents.push(VERSION);
        contents.extend_from_slice(&count.to_le_bytes());
        contents.extend_from_slice(&serialized);

        // Write to a sibling temp file, then rename over the target.
        if let Err(e) = self.write_atomically(&contents).await {
            self.dirty.store(true, Ordering::SeqCst);
            return Err(e);
        }

        debug!("Store saved successfully");
        Ok(())
    }

    async fn write_atomically(&self, contents: &[u8]) -> Result<()> {
        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    /// Checks if there are unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Saves if dirty.
    pub async fn flush(&self) -> Result<()> {
        if self.is_dirty() {
            self.save().await?;
        }
        Ok(())
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns all records, ordered by email.
    pub fn all_records(&self) -> Vec<DurableRecord> {
        self.memory.all_records()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    async fn maybe_auto_save(&self) -> Result<()> {
        let writes = self.writes_since_save.fetch_add(1, Ordering::SeqCst);
        if writes >= self.auto_save_threshold {
            self.save().await?;
        }
        Ok(())
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if self.is_dirty() {
            warn!(path = ?self.path, "FileStore dropped with unsaved changes");
        }
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn find(&self, email: &str) -> Result<Option<DurableRecord>> {
        self.memory.find(email).await
    }

    async fn upsert(&self, record: DurableRecord) -> Result<()> {
        self.memory.upsert(record).await?;
        self.dirty.store(true, Ordering::SeqCst);
        self.maybe_auto_save().await
    }

    async fn clear(&self) -> Result<u64> {
        let removed = self.memory.clear_all();
        self.save().await?;
        Ok(removed)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.memory.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peat_core::types::{Identity, RiskSummary, ScanResult};
    use tempfile::tempdir;

    fn record(email: &str) -> DurableRecord {
        let identity = Identity::Email(email.to_string());
        let mut result = ScanResult::new(&identity);
        result.registrations.push("spotify.com".into());
        let summary = RiskSummary::from_result(&result);
        DurableRecord::new(email, result, summary)
    }

    #[tokio::test]
    async fn test_open_empty_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.peat");

        let store = FileStore::open(&path).await.unwrap();
        assert!(store.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.peat");

        {
            let store = FileStore::with_auto_save(&path, 100).await.unwrap();
            store.upsert(record("alice@example.com")).await.unwrap();
            store.upsert(record("bob@example.com")).await.unwrap();
            store.save().await.unwrap();
        }

        let store = FileStore::open(&path).await.unwrap();
        assert_eq!(store.len(), 2);
        let alice = store.find("alice@example.com").await.unwrap().unwrap();
        assert_eq!(alice.result.registrations, vec!["spotify.com"]);
        assert_eq!(alice.risk_summary.total_hits, 1);
    }

    #[tokio::test]
    async fn test_default_saves_every_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.peat");

        let store = FileStore::open(&path).await.unwrap();
        store.upsert(record("alice@example.com")).await.unwrap();
        assert!(!store.is_dirty());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_dirty_tracking_and_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.peat");

        let store = FileStore::with_auto_save(&path, 10).await.unwrap();
        assert!(!store.is_dirty());

        store.upsert(record("alice@example.com")).await.unwrap();
        assert!(store.is_dirty());

        store.flush().await.unwrap();
        assert!(!store.is_dirty());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_auto_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.peat");

        // Saves when the counter reaches 2, i.e. on the third write.
        let store = FileStore::with_auto_save(&path, 2).await.unwrap();
        store.upsert(record("a@example.com")).await.unwrap();
        store.upsert(record("b@example.com")).await.unwrap();
        assert!(store.is_dirty());

        store.upsert(record("c@example.com")).await.unwrap();

        let reopened = FileStore::open(&path).await.unwrap();
        assert_eq!(reopened.len(), 3);
    }

    #[tokio::test]
    async fn test_clear_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.peat");

        let store = FileStore::open(&path).await.unwrap();
        store.upsert(record("alice@example.com")).await.unwrap();
        assert_eq!(store.clear().await.unwrap(), 1);

        let reopened = FileStore::open(&path).await.unwrap();
        assert!(reopened.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.peat");
        fs::write(&path, b"invalid data").await.unwrap();

        assert!(FileStore::open(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_version_mismatch_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.peat");

        let mut contents = Vec::new();
        contents.extend_from_slice(MAGIC);
        contents.push(VERSION + 1);
        contents.extend_from_slice(&0u64.to_le_bytes());
        fs::write(&path, contents).await.unwrap();

        let err = FileStore::open(&path).await.err().unwrap();
        assert!(matches!(err, PeatError::VersionMismatch { .. }));
    }

    #[tokio::test]
    async fn test_atomic_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.peat");
        let temp_path = path.with_extension("tmp");

        let store = FileStore::open(&path).await.unwrap();
        store.upsert(record("alice@example.com")).await.unwrap();

        assert!(!temp_path.exists());
        assert!(path.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_keep_file_loadable() {
        let dir = tempdir().unwrap();

        for round in 0..8 {
            let path = dir.path().join(format!("store-{}.peat", round));
            let store = std::sync::Arc::new(FileStore::open(&path).await.unwrap());

            let mut handles = Vec::new();
            for i in 0..32 {
                let store = store.clone();
                handles.push(tokio::spawn(async move {
                    store.upsert(record(&format!("user{}@example.com", i))).await
                }));
            }
            for handle in handles {
                handle.await.unwrap().unwrap();
            }

            assert!(!store.is_dirty());
            let reopened = FileStore::open(&path).await.unwrap();
            assert_eq!(reopened.len(), 32, "round {}", round);
        }
    }
}
