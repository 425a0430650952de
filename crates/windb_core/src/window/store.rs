//! The windowed store.

use super::iterator::WindowStoreIter;
use crate::changelog::ChangeLogger;
use crate::config::WindowStoreConfig;
use crate::context::StoreContext;
use crate::error::{CoreError, CoreResult};
use crate::key::{seqnum_from_binary_key, to_binary_key};
use crate::segment::{RecoveryStats, SegmentNamer, SegmentRing};
use crate::types::SequenceNumber;
use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, trace};
use windb_codec::{Decode, Encode};

/// A time-windowed, segmented key-value store.
///
/// Each key holds a bounded history of timestamped values. Time is split
/// into segments of [`WindowStoreConfig::segment_interval_ms`]; at most
/// `num_segments` of them are live, and older ones are destroyed as newer
/// timestamps arrive. Writes older than the retention window are dropped
/// and fetches over expired time return nothing; neither is an error.
///
/// The store has a single owner: all mutating operations take `&mut self`.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use windb_core::{LocalContext, WindowStore, WindowStoreConfig};
/// use windb_storage::MemoryEngineProvider;
///
/// let dir = tempfile::tempdir().unwrap();
/// let context = Arc::new(LocalContext::with_engine_provider(
///     dir.path(),
///     Arc::new(MemoryEngineProvider),
/// ));
///
/// let config = WindowStoreConfig::new("clicks").retention_period_ms(120_000);
/// let mut store: WindowStore<str, i64> = WindowStore::new(config).unwrap();
/// store.init(context).unwrap();
///
/// store.put_with_timestamp("user-1", &1, 59_000).unwrap();
/// store.put_with_timestamp("user-1", &2, 61_000).unwrap();
///
/// let values: Vec<(i64, i64)> = store
///     .fetch("user-1", 0, 120_000)
///     .unwrap()
///     .collect::<Result<_, _>>()
///     .unwrap();
/// assert_eq!(values, vec![(59_000, 1), (61_000, 2)]);
/// ```
pub struct WindowStore<K: ?Sized, V> {
    config: WindowStoreConfig,
    namer: SegmentNamer,
    seqnum: SequenceNumber,
    recovery: RecoveryStats,
    state: Option<OpenState>,
    _types: PhantomData<fn(&K) -> V>,
}

struct OpenState {
    context: Arc<dyn StoreContext>,
    ring: SegmentRing,
    change_log: Option<ChangeLogger>,
}

impl<K, V> WindowStore<K, V>
where
    K: Encode + ?Sized,
    V: Encode + Decode,
{
    /// Creates a closed store. Call [`init`](Self::init) before use.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration is invalid.
    pub fn new(config: WindowStoreConfig) -> CoreResult<Self> {
        config.validate()?;
        let namer = SegmentNamer::new(config.segment_interval_ms());
        Ok(Self {
            config,
            namer,
            seqnum: SequenceNumber::ZERO,
            recovery: RecoveryStats::default(),
            state: None,
            _types: PhantomData,
        })
    }

    /// Returns the store name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &WindowStoreConfig {
        &self.config
    }

    /// Returns the segment width in milliseconds.
    #[must_use]
    pub fn segment_interval_ms(&self) -> i64 {
        self.namer.interval_ms()
    }

    /// Always `true`: segments are backed by engines that may persist.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        true
    }

    /// Returns whether the store is initialized and not closed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Opens the store inside `context`.
    ///
    /// Reopens the segments found in the store directory, registers with
    /// the context (which replays the change log through the restore path)
    /// and flushes. Calling `init` on an open store does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the change log
    /// cannot be replayed, or a segment operation fails.
    pub fn init(&mut self, context: Arc<dyn StoreContext>) -> CoreResult<()> {
        if self.state.is_some() {
            return Ok(());
        }
        let name = self.config.name.clone();

        let mut ring = SegmentRing::new(
            name.as_str(),
            context.root_dir_for(&name),
            self.namer,
            self.config.num_segments,
            context.engine_provider(),
        );
        let recovery = ring.recover()?;

        let mut restored = 0usize;
        let mut last_seq = None;
        context.register(&name, self.config.logging_enabled, &mut |key, value| {
            if ring.put_raw(key, value)? {
                restored += 1;
            }
            last_seq = Some(seqnum_from_binary_key(key)?);
            Ok(())
        })?;
        ring.flush_all()?;

        // continue numbering after both the reopened segments and the replayed records
        if self.config.retain_duplicates {
            let stored = ring.max_seqnum()?;
            if let Some(seq) = stored.max(last_seq) {
                self.seqnum = self.seqnum.max(seq);
            }
        }

        let change_log = if self.config.logging_enabled {
            Some(ChangeLogger::new(
                context.change_log_sink(&name)?,
                self.config.change_log_max_dirty,
            ))
        } else {
            None
        };

        debug!(
            store = %name,
            opened = recovery.opened,
            skipped = recovery.skipped,
            expired_removed = recovery.expired_removed,
            restored,
            current_segment = ?ring.current_segment_id(),
            "initialized window store"
        );

        self.recovery = recovery;
        self.state = Some(OpenState {
            context,
            ring,
            change_log,
        });
        Ok(())
    }

    /// Writes `value` for `key` at the context's current stream time.
    ///
    /// # Errors
    ///
    /// See [`put_with_timestamp`](Self::put_with_timestamp).
    pub fn put(&mut self, key: &K, value: &V) -> CoreResult<()> {
        let timestamp = self.open()?.context.timestamp();
        self.put_with_timestamp(key, value, timestamp)
    }

    /// Writes `value` for `key` at `timestamp`.
    ///
    /// Writes older than the retention window, or with a negative
    /// timestamp, are dropped silently.
    ///
    /// # Errors
    ///
    /// Returns `StoreNotOpen` before `init` or after `close`, a codec error
    /// if the key or value cannot be encoded, or a storage error.
    pub fn put_with_timestamp(&mut self, key: &K, value: &V, timestamp: i64) -> CoreResult<()> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| CoreError::store_not_open(&self.config.name))?;
        let key_bytes = key.encode()?;
        let value_bytes = value.encode()?;

        if timestamp < 0 {
            trace!(store = %self.config.name, timestamp, "dropping write before the epoch");
            return Ok(());
        }

        let segment_id = self.namer.segment_id(timestamp);
        state.ring.advance(segment_id)?;
        let Some(segment) = state.ring.resolve(segment_id)? else {
            trace!(store = %self.config.name, timestamp, segment_id, "dropping expired write");
            return Ok(());
        };

        let seq = if self.config.retain_duplicates {
            self.seqnum = self.seqnum.next();
            self.seqnum
        } else {
            SequenceNumber::ZERO
        };
        let binary_key = to_binary_key(&key_bytes, timestamp, seq);
        segment.put(&binary_key, &value_bytes)?;

        if let Some(logger) = state.change_log.as_mut() {
            logger.append(&binary_key);
            let ring = &state.ring;
            logger.maybe_flush(|k| ring.get_raw(k))?;
        }
        Ok(())
    }

    /// Writes an already-encoded record, as replayed from the change log.
    ///
    /// The segment is derived from the timestamp inside `binary_key`; no
    /// sequence number is allocated and nothing is logged.
    ///
    /// # Errors
    ///
    /// Returns `StoreNotOpen`, `MalformedKey` or a storage error.
    pub fn put_internal(&mut self, binary_key: &[u8], value: &[u8]) -> CoreResult<()> {
        self.open_mut()?.ring.put_raw(binary_key, value)?;
        Ok(())
    }

    /// Reads the raw value stored under an encoded binary key.
    ///
    /// Never creates a segment.
    ///
    /// # Errors
    ///
    /// Returns `StoreNotOpen`, `MalformedKey` or a storage error.
    pub fn get_raw(&self, binary_key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        self.open()?.ring.get_raw(binary_key)
    }

    /// Returns the values of `key` with timestamps in `[time_from, time_to]`,
    /// in ascending timestamp order.
    ///
    /// Values sharing a timestamp (with duplicates retained) come out in
    /// sequence-number order. Segments that are not live are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StoreNotOpen`, a codec error for the key, or a storage
    /// error. Errors while iterating are yielded by the iterator.
    pub fn fetch(&self, key: &K, time_from: i64, time_to: i64) -> CoreResult<WindowStoreIter<V>> {
        let state = self.open()?;
        let key_bytes = key.encode()?;
        if time_to < time_from || time_to < 0 {
            return Ok(WindowStoreIter::empty());
        }

        let segment_from = self.namer.segment_id(time_from.max(0));
        let segment_to = self.namer.segment_id(time_to);
        let lower = to_binary_key(&key_bytes, time_from, SequenceNumber::ZERO);
        let upper = to_binary_key(&key_bytes, time_to, SequenceNumber::MAX);

        let cursors = state
            .ring
            .live_in_range(segment_from, segment_to)
            .into_iter()
            .map(|segment| segment.range(&lower, &upper))
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(WindowStoreIter::new(key_bytes, cursors))
    }

    /// Flushes every live segment, then the change log.
    ///
    /// # Errors
    ///
    /// Returns `StoreNotOpen` or the first flush failure.
    pub fn flush(&mut self) -> CoreResult<()> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| CoreError::store_not_open(&self.config.name))?;
        Self::flush_state(state)
    }

    /// Flushes and closes the store. Closing a closed store does nothing.
    ///
    /// Segment data is kept; a later [`init`](Self::init) reopens it.
    ///
    /// # Errors
    ///
    /// Returns the first flush or close failure. Segments are closed even
    /// if the flush fails.
    pub fn close(&mut self) -> CoreResult<()> {
        let Some(mut state) = self.state.take() else {
            return Ok(());
        };
        let flushed = Self::flush_state(&mut state);
        let closed = state.ring.close_all();
        info!(store = %self.config.name, "closed window store");
        flushed.and(closed)
    }

    /// Returns the directory name of a segment.
    ///
    /// # Errors
    ///
    /// Returns `SegmentName` for ids outside the calendar range.
    pub fn segment_name(&self, segment_id: i64) -> CoreResult<String> {
        self.namer.name_of(segment_id)
    }

    /// Parses a segment directory name; `None` if it is not one.
    #[must_use]
    pub fn segment_id_from_name(&self, name: &str) -> Option<i64> {
        self.namer.id_from_name(name)
    }

    /// Returns the ids of the live segments. Empty when closed.
    #[must_use]
    pub fn segment_ids(&self) -> BTreeSet<i64> {
        self.state
            .as_ref()
            .map(|state| state.ring.segment_ids())
            .unwrap_or_default()
    }

    /// Returns the highest segment id seen, if any.
    #[must_use]
    pub fn current_segment_id(&self) -> Option<i64> {
        self.state
            .as_ref()
            .and_then(|state| state.ring.current_segment_id())
    }

    /// Returns what the last recovery scan found.
    #[must_use]
    pub fn recovery_stats(&self) -> RecoveryStats {
        self.recovery
    }

    fn flush_state(state: &mut OpenState) -> CoreResult<()> {
        state.ring.flush_all()?;
        if let Some(logger) = state.change_log.as_mut() {
            let ring = &state.ring;
            logger.flush(|k| ring.get_raw(k))?;
        }
        Ok(())
    }

    fn open(&self) -> CoreResult<&OpenState> {
        self.state
            .as_ref()
            .ok_or_else(|| CoreError::store_not_open(&self.config.name))
    }

    fn open_mut(&mut self) -> CoreResult<&mut OpenState> {
        self.state
            .as_mut()
            .ok_or_else(|| CoreError::store_not_open(&self.config.name))
    }
}

impl<K: ?Sized, V> fmt::Debug for WindowStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowStore")
            .field("name", &self.config.name)
            .field("segment_interval_ms", &self.namer.interval_ms())
            .field("open", &self.state.is_some())
            .field("segments", &self.state.as_ref().map(|s| &s.ring))
            .finish_non_exhaustive()
    }
}
