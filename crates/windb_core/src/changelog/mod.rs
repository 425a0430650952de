//! Change log used to rebuild a store after a restart.
//!
//! The store appends the binary key of every write to a [`ChangeLogger`],
//! which batches keys and sends `(binary key, current value)` records to a
//! [`ChangeLogSink`]. On startup the host replays the sink's records
//! through the store's restore path.

mod logger;
mod sink;

pub use logger::ChangeLogger;
pub use sink::{read_records, ChangeLogSink, ChangeRecord, FileChangeLog, MemoryChangeLog};
