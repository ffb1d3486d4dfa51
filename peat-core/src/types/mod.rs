//! Domain types for PEAT.
//!
//! - [`Identity`] / [`ScanKey`]: what is scanned and how it is cached
//! - [`BreachRecord`]: one historical breach with its [`Severity`]
//! - [`ScanResult`]: the merged output of one scan, with [`ScanMeta`]
//! - [`RiskSummary`] / [`DurableRecord`]: what the durable tier stores

mod breach;
mod identity;
mod result;

pub use breach::*;
pub use identity::*;
pub use result::*;
