//! In-memory engine for tests and ephemeral stores.

use crate::engine::{EngineProvider, KvEngine, RangeIter, SharedTree, Tree};
use crate::error::StorageResult;
use std::collections::BTreeMap;
use std::path::Path;

/// An in-memory ordered engine.
///
/// Suitable for unit tests and for stores that never need to survive a
/// restart. Nothing is persisted, so `flush` is a no-op and `destroy`
/// simply drops the data.
///
/// # Example
///
/// ```rust
/// use windb_storage::{KvEngine, MemoryEngine};
///
/// let mut engine = MemoryEngine::new();
/// engine.put(b"b", b"2").unwrap();
/// engine.put(b"a", b"1").unwrap();
///
/// let keys: Vec<_> = engine
///     .range(b"a", b"z")
///     .unwrap()
///     .map(|r| r.unwrap().0)
///     .collect();
/// assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
/// ```
#[derive(Debug)]
pub struct MemoryEngine {
    tree: SharedTree,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self {
            tree: Tree::shared(BTreeMap::new()),
        }
    }
}

impl MemoryEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvEngine for MemoryEngine {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let tree = self.tree.read();
        tree.ensure_open()?;
        Ok(tree.entries.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let mut tree = self.tree.write();
        tree.ensure_open()?;
        tree.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn range(&self, from: &[u8], to: &[u8]) -> StorageResult<RangeIter> {
        self.tree.read().ensure_open()?;
        Ok(RangeIter::new(self.tree.clone(), from, to))
    }

    fn scan(&self) -> StorageResult<RangeIter> {
        self.tree.read().ensure_open()?;
        Ok(RangeIter::all(self.tree.clone()))
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.tree.read().ensure_open()
    }

    fn close(&mut self) -> StorageResult<()> {
        self.tree.write().closed = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.tree.read().closed
    }

    fn entry_count(&self) -> usize {
        self.tree.read().entries.len()
    }

    fn destroy(self: Box<Self>) -> StorageResult<()> {
        let mut tree = self.tree.write();
        tree.closed = true;
        tree.entries.clear();
        Ok(())
    }
}

/// Provider handing out fresh [`MemoryEngine`]s.
///
/// Paths are ignored: every `open` starts empty, so memory-backed stores
/// cannot recover segments across restarts.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryEngineProvider;

impl EngineProvider for MemoryEngineProvider {
    fn open(&self, _path: &Path) -> StorageResult<Box<dyn KvEngine>> {
        Ok(Box::new(MemoryEngine::new()))
    }

    fn destroy(&self, _path: &Path) -> StorageResult<()> {
        Ok(())
    }
}
