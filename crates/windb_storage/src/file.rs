//! Log-structured file engine for persistent segments.

use crate::engine::{EngineProvider, KvEngine, RangeIter, SharedTree, Tree};
use crate::error::{StorageError, StorageResult};
use crate::frame::{encode_frame, FrameReader};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the append-only data log inside an engine directory.
pub const DATA_FILE: &str = "data.log";

/// Name of the advisory lock file inside an engine directory.
pub const LOCK_FILE: &str = "LOCK";

/// A persistent engine rooted at a directory.
///
/// ```text
/// <dir>/
/// ├─ LOCK       # exclusive advisory lock, held while open
/// └─ data.log   # framed key/value records, append-only
/// ```
///
/// The ordered view lives in memory and is rebuilt by replaying
/// `data.log` on open; the last record for a key wins.
///
/// # Durability
///
/// - `put` appends to a buffered writer
/// - `flush()` drains the buffer and calls `File::sync_data()`
/// - a torn tail record left by a crash is cut off on the next open
///
/// # Example
///
/// ```no_run
/// use windb_storage::{FileEngine, KvEngine};
/// use std::path::Path;
///
/// let mut engine = FileEngine::open(Path::new("segment-dir")).unwrap();
/// engine.put(b"key", b"value").unwrap();
/// engine.flush().unwrap();
/// ```
#[derive(Debug)]
pub struct FileEngine {
    dir: PathBuf,
    tree: SharedTree,
    log: Option<BufWriter<File>>,
    lock: Option<File>,
}

impl FileEngine {
    /// Opens or creates the engine rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the directory or files cannot be created
    /// - another owner holds the directory lock (`Locked`)
    /// - a complete record fails its checksum (`ChecksumMismatch`)
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;

        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        if lock.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked(dir.display().to_string()));
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(dir.join(DATA_FILE))?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let mut entries = BTreeMap::new();
        let mut reader = FrameReader::new(&data);
        for frame in reader.by_ref() {
            let (key, value) = frame?;
            entries.insert(key.to_vec(), value.to_vec());
        }

        let valid_len = reader.valid_len();
        if valid_len < data.len() {
            warn!(
                dir = %dir.display(),
                discarded = data.len() - valid_len,
                "discarding torn tail of data log"
            );
            file.set_len(valid_len as u64)?;
            file.sync_all()?;
        }

        debug!(dir = %dir.display(), entries = entries.len(), "opened file engine");

        Ok(Self {
            dir: dir.to_path_buf(),
            tree: Tree::shared(entries),
            log: Some(BufWriter::new(file)),
            lock: Some(lock),
        })
    }

    /// Returns the engine's root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn log_mut(&mut self) -> StorageResult<&mut BufWriter<File>> {
        self.log.as_mut().ok_or(StorageError::Closed)
    }
}

impl KvEngine for FileEngine {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let tree = self.tree.read();
        tree.ensure_open()?;
        Ok(tree.entries.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.tree.read().ensure_open()?;
        let frame = encode_frame(key, value)?;
        self.log_mut()?.write_all(&frame)?;
        self.tree.write().entries.insert(key.to_vec(), value.to_vec());
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
        let log = self.log_mut()?;
        log.flush()?;
        log.get_ref().sync_data()?;
        Ok(())
    }

    fn close(&mut self) -> StorageResult<()> {
        if self.log.is_none() {
            return Ok(());
        }

        let flushed = self.flush();
        {
            let mut tree = self.tree.write();
            tree.closed = true;
            tree.entries.clear();
        }
        self.log = None;
        if let Some(lock) = self.lock.take() {
            let _ = lock.unlock();
        }
        flushed
    }

    fn is_open(&self) -> bool {
        self.log.is_some()
    }

    fn entry_count(&self) -> usize {
        self.tree.read().entries.len()
    }

    fn destroy(mut self: Box<Self>) -> StorageResult<()> {
        self.close()?;
        remove_engine_dir(&self.dir)
    }
}

fn remove_engine_dir(dir: &Path) -> StorageResult<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Provider opening a [`FileEngine`] per directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileEngineProvider;

impl EngineProvider for FileEngineProvider {
    fn open(&self, path: &Path) -> StorageResult<Box<dyn KvEngine>> {
        Ok(Box::new(FileEngine::open(path)?))
    }

    fn destroy(&self, path: &Path) -> StorageResult<()> {
        remove_engine_dir(path)
    }
}
