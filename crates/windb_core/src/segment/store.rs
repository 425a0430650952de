//! A single time segment.

use crate::error::CoreResult;
use std::fmt;
use std::path::{Path, PathBuf};
use windb_storage::{EngineProvider, KvEngine, RangeIter};

/// One physical store covering `[id * interval, (id + 1) * interval)`.
///
/// Each segment owns its engine exclusively. The ring that owns the
/// segment is the only caller of [`Segment::destroy`], which consumes it.
pub struct Segment {
    id: i64,
    name: String,
    path: PathBuf,
    engine: Box<dyn KvEngine>,
}

impl Segment {
    /// Opens (creating if needed) the segment stored at `root/name`.
    pub fn open(
        provider: &dyn EngineProvider,
        root: &Path,
        name: String,
        id: i64,
    ) -> CoreResult<Self> {
        let path = root.join(&name);
        let engine = provider.open(&path)?;
        Ok(Self {
            id,
            name,
            path,
            engine,
        })
    }

    /// Returns the segment id.
    #[must_use]
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Returns the directory name of the segment.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the directory backing the segment.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the value stored under a binary key.
    pub fn get(&self, binary_key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        Ok(self.engine.get(binary_key)?)
    }

    /// Writes a raw value under a binary key.
    pub fn put(&mut self, binary_key: &[u8], value: &[u8]) -> CoreResult<()> {
        self.engine.put(binary_key, value)?;
        Ok(())
    }

    /// Returns a cursor over `[from, to]`, both inclusive.
    pub fn range(&self, from: &[u8], to: &[u8]) -> CoreResult<RangeIter> {
        Ok(self.engine.range(from, to)?)
    }

    /// Returns a cursor over every record in the segment.
    pub fn scan(&self) -> CoreResult<RangeIter> {
        Ok(self.engine.scan()?)
    }

    /// Flushes the engine.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.engine.flush()?;
        Ok(())
    }

    /// Closes the engine; open cursors start failing with `Closed`.
    pub fn close(&mut self) -> CoreResult<()> {
        self.engine.close()?;
        Ok(())
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.engine.entry_count()
    }

    /// Removes every persisted byte of the segment. Irreversible.
    pub fn destroy(self) -> CoreResult<()> {
        self.engine.destroy()?;
        Ok(())
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("entry_count", &self.entry_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windb_storage::{FileEngineProvider, MemoryEngineProvider};

    #[test]
    fn put_get_and_range() {
        let mut segment =
            Segment::open(&MemoryEngineProvider, Path::new("root"), "seg".into(), 4).unwrap();
        segment.put(b"a", b"1").unwrap();
        segment.put(b"b", b"2").unwrap();
        segment.put(b"c", b"3").unwrap();

        assert_eq!(segment.id(), 4);
        assert_eq!(segment.name(), "seg");
        assert_eq!(segment.get(b"b").unwrap(), Some(b"2".to_vec()));

        let values: Vec<Vec<u8>> = segment
            .range(b"a", b"b")
            .unwrap()
            .map(|r| r.unwrap().1)
            .collect();
        assert_eq!(values, vec![b"1".to_vec(), b"2".to_vec()]);
    }

    #[test]
    fn destroy_removes_directory() {
        let temp = tempfile::tempdir().unwrap();
        let mut segment =
            Segment::open(&FileEngineProvider, temp.path(), "197001010000".into(), 0).unwrap();
        segment.put(b"k", b"v").unwrap();
        let path = segment.path().to_path_buf();
        assert!(path.exists());

        segment.close().unwrap();
        segment.destroy().unwrap();
        assert!(!path.exists());
    }
}
