//! # PEAT Store
//!
//! Durable storage of scan results, keyed by email.
//!
//! This crate provides two storage backends and the cache adapter over them:
//!
//! - **Memory**: Fast in-memory storage for development and testing
//! - **File**: Persistent file-based storage for single-node deployments
//! - **DurableCache**: Staleness window, timeouts and failure absorption
//!   on top of any [`DurableStore`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use peat_store::{DurableCache, MemoryStore};
//!
//! let cache = DurableCache::new(Arc::new(MemoryStore::new()));
//!
//! // Misses, store errors and timeouts all read as `None`
//! let hit = cache.read(&identity).await;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod durable;
mod file;
mod memory;

pub use durable::{DurableCache, DurableCacheConfig, DurableStats};
pub use file::FileStore;
pub use memory::MemoryStore;

// Re-export the trait from core
pub use peat_core::traits::DurableStore;
