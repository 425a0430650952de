//! Change-log sinks.

use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use windb_storage::frame::{encode_frame, FrameReader};

/// One replicated write: a binary key and its raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    /// Binary key (user key, timestamp, sequence number).
    pub key: Vec<u8>,
    /// Raw encoded value.
    pub value: Vec<u8>,
}

impl ChangeRecord {
    /// Creates a record.
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Destination of change-log records.
///
/// Records are handed over in the order they must be replayed.
pub trait ChangeLogSink: Send {
    /// Queues one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn send(&mut self, record: &ChangeRecord) -> CoreResult<()>;

    /// Makes every queued record durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> CoreResult<()>;
}

/// In-memory sink. Clones share the same record list.
#[derive(Debug, Clone, Default)]
pub struct MemoryChangeLog {
    inner: Arc<Mutex<MemoryLogState>>,
}

#[derive(Debug, Default)]
struct MemoryLogState {
    records: Vec<ChangeRecord>,
    flushes: usize,
}

impl MemoryChangeLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every record sent so far.
    #[must_use]
    pub fn records(&self) -> Vec<ChangeRecord> {
        self.inner.lock().records.clone()
    }

    /// Returns the number of records sent so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    /// Returns whether no record was sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns how many times the log was flushed.
    #[must_use]
    pub fn flush_count(&self) -> usize {
        self.inner.lock().flushes
    }
}

impl ChangeLogSink for MemoryChangeLog {
    fn send(&mut self, record: &ChangeRecord) -> CoreResult<()> {
        self.inner.lock().records.push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> CoreResult<()> {
        self.inner.lock().flushes += 1;
        Ok(())
    }
}

/// Append-only change log file.
///
/// Records use the storage frame format, so a write torn by a crash is cut
/// off on the next open and ignored by [`read_records`].
#[derive(Debug)]
pub struct FileChangeLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileChangeLog {
    /// Opens (creating if needed) the log at `path` for appending.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or a torn tail cannot
    /// be truncated.
    pub fn open(path: impl Into<PathBuf>) -> CoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        let mut reader = FrameReader::new(&data);
        for frame in reader.by_ref() {
            frame.map_err(|e| corruption(&path, &e))?;
        }
        let valid_len = reader.valid_len();
        if valid_len < data.len() {
            warn!(
                path = %path.display(),
                discarded = data.len() - valid_len,
                "discarding torn tail of change log"
            );
            file.set_len(valid_len as u64)?;
        }

        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Returns the log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChangeLogSink for FileChangeLog {
    fn send(&mut self, record: &ChangeRecord) -> CoreResult<()> {
        let frame = encode_frame(&record.key, &record.value)?;
        self.writer.write_all(&frame)?;
        Ok(())
    }

    fn flush(&mut self) -> CoreResult<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }
}

/// Reads every complete record of the change log at `path`, in log order.
///
/// A missing file is an empty log.
///
/// # Errors
///
/// Returns `ChangeLogCorruption` if a complete record fails its checksum.
pub fn read_records(path: &Path) -> CoreResult<Vec<ChangeRecord>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    FrameReader::new(&data)
        .map(|frame| {
            frame
                .map(|(key, value)| ChangeRecord::new(key, value))
                .map_err(|e| corruption(path, &e))
        })
        .collect()
}

fn corruption(path: &Path, err: &windb_storage::StorageError) -> CoreError {
    CoreError::change_log_corruption(format!("{}: {err}", path.display()))
}
