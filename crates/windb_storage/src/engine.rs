//! Ordered key-value engine trait and the range cursor shared by engines.

use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

/// A key/value pair as stored by an engine.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// An ordered byte-string store.
///
/// Keys are compared lexicographically as raw bytes. Engines are owned by
/// exactly one segment; readers obtained through [`KvEngine::range`] share
/// the engine's state and observe a close or destroy as
/// [`StorageError::Closed`].
///
/// # Invariants
///
/// - `range(from, to)` yields keys in ascending order, both bounds inclusive
/// - `put` overwrites any previous value for the same key
/// - after `close`, every operation except `destroy` fails with `Closed`
/// - `destroy` consumes the engine, so its bytes are removed exactly once
pub trait KvEngine: Send + Sync {
    /// Returns the value stored for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is closed.
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is closed or the write fails.
    fn put(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Returns a lazy ascending cursor over `[from, to]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is closed.
    fn range(&self, from: &[u8], to: &[u8]) -> StorageResult<RangeIter>;

    /// Returns a lazy ascending cursor over every stored key.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is closed.
    fn scan(&self) -> StorageResult<RangeIter>;

    /// Makes all previous writes durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Flushes and releases the engine. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    fn close(&mut self) -> StorageResult<()>;

    /// Returns whether the engine accepts operations.
    fn is_open(&self) -> bool;

    /// Returns the number of stored keys.
    fn entry_count(&self) -> usize;

    /// Closes the engine if needed and removes all of its persisted bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the data cannot be removed.
    fn destroy(self: Box<Self>) -> StorageResult<()>;
}

/// Opens engines rooted at directories.
///
/// The windowed store asks its provider for one engine per segment.
pub trait EngineProvider: Send + Sync {
    /// Opens (creating if needed) the engine rooted at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be opened.
    fn open(&self, path: &Path) -> StorageResult<Box<dyn KvEngine>>;

    /// Removes persisted data at `path` for which no engine is open.
    ///
    /// # Errors
    ///
    /// Returns an error if the data exists but cannot be removed.
    fn destroy(&self, path: &Path) -> StorageResult<()>;
}

/// In-memory ordered state shared between an engine and its cursors.
#[derive(Debug, Default)]
pub(crate) struct Tree {
    pub(crate) entries: BTreeMap<Vec<u8>, Vec<u8>>,
    pub(crate) closed: bool,
}

pub(crate) type SharedTree = Arc<RwLock<Tree>>;

impl Tree {
    pub(crate) fn shared(entries: BTreeMap<Vec<u8>, Vec<u8>>) -> SharedTree {
        Arc::new(RwLock::new(Self {
            entries,
            closed: false,
        }))
    }

    pub(crate) fn ensure_open(&self) -> StorageResult<()> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

/// A lazy ascending cursor over an inclusive key range.
///
/// The cursor holds no lock between calls: each `next()` re-seeks just
/// past the last key it returned. Writes made after the cursor was created
/// may therefore be observed if they land ahead of it.
///
/// If the owning engine is closed or destroyed while the cursor is live,
/// the next call yields `Err(StorageError::Closed)` once and the cursor
/// then ends.
#[derive(Debug)]
pub struct RangeIter {
    tree: SharedTree,
    lower: Bound<Vec<u8>>,
    upper: Bound<Vec<u8>>,
    finished: bool,
}

impl RangeIter {
    pub(crate) fn new(tree: SharedTree, from: &[u8], to: &[u8]) -> Self {
        Self {
            tree,
            lower: Bound::Included(from.to_vec()),
            upper: Bound::Included(to.to_vec()),
            finished: from > to,
        }
    }

    pub(crate) fn all(tree: SharedTree) -> Self {
        Self {
            tree,
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
            finished: false,
        }
    }

    /// Releases the cursor. Further calls to `next()` return `None`.
    pub fn close(&mut self) {
        self.finished = true;
    }

    /// Returns whether the cursor has been closed or exhausted.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Iterator for RangeIter {
    type Item = StorageResult<KvPair>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let tree = self.tree.read();
        if tree.closed {
            self.finished = true;
            return Some(Err(StorageError::Closed));
        }

        let lower = self.lower.as_ref().map(Vec::as_slice);
        let upper = self.upper.as_ref().map(Vec::as_slice);
        let found = tree
            .entries
            .range::<[u8], _>((lower, upper))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()));
        drop(tree);

        match found {
            Some((key, value)) => {
                self.lower = Bound::Excluded(key.clone());
                Some(Ok((key, value)))
            }
            None => {
                self.finished = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with(keys: &[&[u8]]) -> SharedTree {
        let entries = keys
            .iter()
            .map(|k| (k.to_vec(), k.to_vec()))
            .collect::<BTreeMap<_, _>>();
        Tree::shared(entries)
    }

    fn collect_keys(iter: RangeIter) -> Vec<Vec<u8>> {
        iter.map(|r| r.unwrap().0).collect()
    }

    #[test]
    fn range_is_inclusive_on_both_ends() {
        let tree = tree_with(&[b"a", b"b", b"c", b"d"]);
        let keys = collect_keys(RangeIter::new(tree, b"b", b"c"));
        assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn inverted_range_is_empty() {
        let tree = tree_with(&[b"a", b"b"]);
        let mut iter = RangeIter::new(tree, b"b", b"a");
        assert!(iter.is_finished());
        assert!(iter.next().is_none());
    }

    #[test]
    fn single_key_range() {
        let tree = tree_with(&[b"a", b"b", b"c"]);
        let keys = collect_keys(RangeIter::new(tree, b"b", b"b"));
        assert_eq!(keys, vec![b"b".to_vec()]);
    }

    #[test]
    fn full_scan_visits_every_key() {
        let tree = tree_with(&[b"", b"a", b"\xff\xff\xff"]);
        let keys = collect_keys(RangeIter::all(tree));
        assert_eq!(keys, vec![b"".to_vec(), b"a".to_vec(), b"\xff\xff\xff".to_vec()]);
    }

    #[test]
    fn closed_tree_fails_once_then_ends() {
        let tree = tree_with(&[b"a", b"b"]);
        let mut iter = RangeIter::new(Arc::clone(&tree), b"a", b"z");
        assert!(iter.next().unwrap().is_ok());

        tree.write().closed = true;
        assert!(matches!(iter.next(), Some(Err(StorageError::Closed))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn explicit_close_stops_iteration() {
        let tree = tree_with(&[b"a", b"b"]);
        let mut iter = RangeIter::new(tree, b"a", b"z");
        iter.close();
        assert!(iter.next().is_none());
    }
}
