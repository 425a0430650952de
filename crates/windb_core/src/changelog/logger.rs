//! Batching of change-log writes.

use super::sink::{ChangeLogSink, ChangeRecord};
use crate::error::CoreResult;
use std::collections::HashSet;
use std::fmt;
use std::mem;

/// Collects dirty binary keys and forwards their current values in batches.
///
/// Values are looked up at flush time, not at append time: a key written
/// several times between flushes is sent once with its latest value, and a
/// key whose value is gone (its segment was evicted) is not sent at all.
pub struct ChangeLogger {
    sink: Box<dyn ChangeLogSink>,
    dirty: Vec<Vec<u8>>,
    pending: HashSet<Vec<u8>>,
    max_dirty: usize,
}

impl ChangeLogger {
    /// Creates a logger that flushes once more than `max_dirty` keys are
    /// pending.
    pub fn new(sink: Box<dyn ChangeLogSink>, max_dirty: usize) -> Self {
        Self {
            sink,
            dirty: Vec::new(),
            pending: HashSet::new(),
            max_dirty,
        }
    }

    /// Marks `binary_key` as changed.
    pub fn append(&mut self, binary_key: &[u8]) {
        if self.pending.insert(binary_key.to_vec()) {
            self.dirty.push(binary_key.to_vec());
        }
    }

    /// Returns the number of pending keys.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.dirty.len()
    }

    /// Flushes if the batch is over its threshold. Returns the number of
    /// records sent.
    ///
    /// # Errors
    ///
    /// Returns an error if a value lookup or the sink fails.
    pub fn maybe_flush<F>(&mut self, getter: F) -> CoreResult<usize>
    where
        F: FnMut(&[u8]) -> CoreResult<Option<Vec<u8>>>,
    {
        if self.dirty.len() > self.max_dirty {
            self.flush(getter)
        } else {
            Ok(0)
        }
    }

    /// Sends every pending key with its current value, in first-append
    /// order, then flushes the sink. Returns the number of records sent.
    ///
    /// # Errors
    ///
    /// Returns an error if a value lookup or the sink fails. The batch is
    /// dropped either way.
    pub fn flush<F>(&mut self, mut getter: F) -> CoreResult<usize>
    where
        F: FnMut(&[u8]) -> CoreResult<Option<Vec<u8>>>,
    {
        let dirty = mem::take(&mut self.dirty);
        self.pending.clear();

        let mut sent = 0;
        for key in dirty {
            if let Some(value) = getter(&key)? {
                self.sink.send(&ChangeRecord { key, value })?;
                sent += 1;
            }
        }
        self.sink.flush()?;
        Ok(sent)
    }
}

impl fmt::Debug for ChangeLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeLogger")
            .field("pending", &self.dirty.len())
            .field("max_dirty", &self.max_dirty)
            .finish_non_exhaustive()
    }
}
