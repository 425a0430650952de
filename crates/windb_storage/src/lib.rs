//! # windb Storage
//!
//! Ordered key-value engines backing windb segments.
//!
//! Each time segment of a windowed store delegates to exactly one engine.
//! Engines are **opaque ordered byte stores**: they know nothing about
//! timestamps, sequence numbers or segments.
//!
//! ## Design Principles
//!
//! - Point `get`/`put` plus ascending inclusive `range` over raw bytes
//! - Range cursors are lazy and detect a closed or destroyed engine
//! - `destroy` consumes the engine, so data is removed exactly once
//! - Must be `Send + Sync` so a store can move between threads
//!
//! ## Available Engines
//!
//! - [`MemoryEngine`] - For testing and ephemeral stores
//! - [`FileEngine`] - Log-structured persistent engine rooted at a directory
//!
//! ## Example
//!
//! ```rust
//! use windb_storage::{KvEngine, MemoryEngine};
//!
//! let mut engine = MemoryEngine::new();
//! engine.put(b"hello", b"world").unwrap();
//! assert_eq!(engine.get(b"hello").unwrap(), Some(b"world".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod error;
mod file;
pub mod frame;
mod memory;

pub use engine::{EngineProvider, KvEngine, KvPair, RangeIter};
pub use error::{StorageError, StorageResult};
pub use file::{FileEngine, FileEngineProvider, DATA_FILE, LOCK_FILE};
pub use memory::{MemoryEngine, MemoryEngineProvider};
