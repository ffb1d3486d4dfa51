//! # PEAT Core
//!
//! Core types, errors, and traits for the PEAT exposure aggregation engine.
//!
//! This crate provides the building blocks used by all other PEAT crates:
//!
//! - **Types**: identities, scan keys, breach records, scan results and risk summaries
//! - **Errors**: one error taxonomy, classified so callers can degrade instead of fail
//! - **Constants**: cache windows, identity limits, severity tables
//! - **Traits**: lookup adapter and durable store interfaces
//!
//! ## Example
//!
//! ```rust
//! use peat_core::{Identity, ScanKey};
//!
//! let identity = Identity::usernames(["bob", "alice"]).unwrap();
//! let key = ScanKey::derive(&identity).unwrap();
//! assert_eq!(key.as_str(), "usernames:alice,bob");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod narrative;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{PeatError, Result};
pub use narrative::{
    fallback_narrative, high_exposure_narrative, BreachInsights, NarrativeContext, RiskLevel, RiskMetrics,
};
pub use traits::*;
pub use types::*;
