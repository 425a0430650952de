//! # windb Core
//!
//! Time-windowed, segmented key-value store for stream processing state.
//!
//! This crate provides:
//! - Order-preserving binary keys of (user key, timestamp, sequence)
//! - Time segments, each backed by its own storage engine
//! - A segment ring enforcing retention by destroying old segments
//! - The [`WindowStore`] with put, fetch, flush and close
//! - Change logging and replay for recovery after restart
//!
//! ## Retention
//!
//! With `n` segments and a newest segment id `c`, the live window is
//! `(c - n, c]`. Writes that map before the window are dropped and fetches
//! over it return nothing.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod changelog;
mod config;
mod context;
mod error;
pub mod key;
pub mod segment;
mod types;
mod window;

pub use changelog::{ChangeLogSink, ChangeLogger, ChangeRecord, FileChangeLog, MemoryChangeLog};
pub use config::{WindowStoreConfig, MIN_SEGMENT_INTERVAL_MS};
pub use context::{LocalContext, RestoreFn, StoreContext};
pub use error::{CoreError, CoreResult};
pub use segment::RecoveryStats;
pub use types::SequenceNumber;
pub use window::{WindowStore, WindowStoreIter};
