//! TTL cache for PEAT scan results.
//!
//! In-process, bounded, expiring store keyed by [`ScanKey`](peat_core::ScanKey),
//! with a cancellable background sweep.

mod cache;
mod sweeper;

pub use cache::{CacheConfig, CacheStats, EphemeralCache};
pub use sweeper::SweepHandle;
