//! # windb Testkit
//!
//! Test utilities for windb.
//!
//! This crate provides:
//! - Store fixtures backed by temporary state directories
//! - Property-based test generators using proptest
//! - A model harness that checks a store against a reference model
//! - Test logging setup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use windb_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_store() {
//!     with_temp_store(test_config("clicks"), |store: &mut WindowStore<str, u64>, _| {
//!         store.put_with_timestamp("k", &1, 0).unwrap();
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod harness;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::harness::*;
    pub use crate::logging::*;
    pub use windb_core::{WindowStore, WindowStoreConfig};
}

pub use fixtures::*;
pub use generators::*;
pub use harness::*;
pub use logging::*;
