//! Fixed-capacity ring of live segments.
//!
//! Slot `i` holds at most one segment whose id satisfies
//! `id mod num_segments == i`. The ring owns segment lifecycle: it creates
//! segments on demand, reopens them during recovery and destroys them once
//! they fall out of the retention window
//! `(current - num_segments, current]`.

use super::naming::SegmentNamer;
use super::store::Segment;
use crate::error::CoreResult;
use crate::key::{seqnum_from_binary_key, timestamp_from_binary_key};
use crate::types::SequenceNumber;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use windb_storage::EngineProvider;

/// Outcome of the best-effort recovery scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Segments reopened from existing directories.
    pub opened: usize,
    /// Entries that were not segment directories or could not be opened.
    pub skipped: usize,
    /// Segment directories deleted because they were already expired.
    pub expired_removed: usize,
}

/// The ring buffer of segments for one store.
pub struct SegmentRing {
    store_name: String,
    root: PathBuf,
    namer: SegmentNamer,
    provider: Arc<dyn EngineProvider>,
    slots: Vec<Option<Segment>>,
    current: Option<i64>,
}

impl SegmentRing {
    /// Creates an empty ring rooted at `root`.
    ///
    /// `num_segments` must be at least 1.
    pub fn new(
        store_name: impl Into<String>,
        root: impl Into<PathBuf>,
        namer: SegmentNamer,
        num_segments: usize,
        provider: Arc<dyn EngineProvider>,
    ) -> Self {
        let mut slots = Vec::with_capacity(num_segments);
        slots.resize_with(num_segments, || None);
        Self {
            store_name: store_name.into(),
            root: root.into(),
            namer,
            provider,
            slots,
            current: None,
        }
    }

    /// Returns the ring capacity.
    #[must_use]
    pub fn num_segments(&self) -> usize {
        self.slots.len()
    }

    /// Returns the store root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the namer used for segment directories.
    #[must_use]
    pub fn namer(&self) -> &SegmentNamer {
        &self.namer
    }

    /// Returns the highest segment id seen so far.
    #[must_use]
    pub fn current_segment_id(&self) -> Option<i64> {
        self.current
    }

    /// Returns whether `segment_id` lies outside the retention window.
    #[must_use]
    pub fn is_expired(&self, segment_id: i64) -> bool {
        self.current
            .is_some_and(|current| segment_id <= current.saturating_sub(self.capacity()))
    }

    /// Raises the high-water mark to `segment_id` and evicts expired
    /// segments. Returns the number of evicted segments.
    ///
    /// # Errors
    ///
    /// Returns an error if an expired segment cannot be destroyed.
    pub fn advance(&mut self, segment_id: i64) -> CoreResult<usize> {
        if self.current.is_some_and(|current| segment_id <= current) {
            return Ok(0);
        }
        self.current = Some(segment_id);
        self.cleanup()
    }

    /// Returns the live segment for `segment_id`, creating it if needed.
    ///
    /// Returns `None` for negative or expired ids. If the slot is taken by
    /// another segment that is still live, nothing is created and `None` is
    /// returned; the slot's segment is never handed out for a different id.
    ///
    /// # Errors
    ///
    /// Returns an error if eviction or opening the segment fails.
    pub fn resolve(&mut self, segment_id: i64) -> CoreResult<Option<&mut Segment>> {
        if segment_id < 0 || self.is_expired(segment_id) {
            return Ok(None);
        }
        let slot = self.slot_of(segment_id);

        if self.slots[slot]
            .as_ref()
            .is_some_and(|segment| segment.id() != segment_id)
        {
            self.cleanup()?;
        }

        match self.slots[slot].as_ref().map(Segment::id) {
            Some(occupant) if occupant != segment_id => {
                warn!(
                    store = %self.store_name,
                    segment_id,
                    occupant,
                    "segment slot held by a live segment"
                );
                return Ok(None);
            }
            Some(_) => {}
            None => {
                let name = self.namer.name_of(segment_id)?;
                let segment = Segment::open(self.provider.as_ref(), &self.root, name, segment_id)?;
                debug!(store = %self.store_name, segment_id, name = segment.name(), "opened segment");
                self.slots[slot] = Some(segment);
            }
        }

        Ok(self.slots[slot].as_mut())
    }

    /// Returns the live segment for `segment_id` without creating it.
    #[must_use]
    pub fn live(&self, segment_id: i64) -> Option<&Segment> {
        if segment_id < 0 || self.is_expired(segment_id) {
            return None;
        }
        self.slots[self.slot_of(segment_id)]
            .as_ref()
            .filter(|segment| segment.id() == segment_id)
    }

    /// Returns the live segments with ids in `[from, to]`, ascending.
    #[must_use]
    pub fn live_in_range(&self, from: i64, to: i64) -> Vec<&Segment> {
        let mut segments: Vec<&Segment> = self
            .slots
            .iter()
            .flatten()
            .filter(|segment| (from..=to).contains(&segment.id()) && !self.is_expired(segment.id()))
            .collect();
        segments.sort_by_key(|segment| segment.id());
        segments
    }

    /// Reads a raw value by binary key without creating a segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is malformed or the read fails.
    pub fn get_raw(&self, binary_key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        let timestamp = timestamp_from_binary_key(binary_key)?;
        if timestamp < 0 {
            return Ok(None);
        }
        match self.live(self.namer.segment_id(timestamp)) {
            Some(segment) => segment.get(binary_key),
            None => Ok(None),
        }
    }

    /// Writes a raw record whose timestamp is embedded in `binary_key`.
    ///
    /// Returns `false` if the record was dropped at the retention boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is malformed or the write fails.
    pub fn put_raw(&mut self, binary_key: &[u8], value: &[u8]) -> CoreResult<bool> {
        let timestamp = timestamp_from_binary_key(binary_key)?;
        if timestamp < 0 {
            return Ok(false);
        }
        let segment_id = self.namer.segment_id(timestamp);
        self.advance(segment_id)?;
        match self.resolve(segment_id)? {
            Some(segment) => {
                segment.put(binary_key, value)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Closes and destroys every segment outside the retention window.
    /// Returns the number of evicted segments.
    ///
    /// # Errors
    ///
    /// Returns the first failure to close or destroy a segment. Slots are
    /// cleared before destruction, so a failed segment is not retried.
    pub fn cleanup(&mut self) -> CoreResult<usize> {
        let mut evicted = 0;
        for slot in 0..self.slots.len() {
            let expired = self.slots[slot]
                .as_ref()
                .is_some_and(|segment| self.is_expired(segment.id()));
            if !expired {
                continue;
            }
            if let Some(mut segment) = self.slots[slot].take() {
                info!(
                    store = %self.store_name,
                    segment_id = segment.id(),
                    name = segment.name(),
                    "evicting expired segment"
                );
                segment.close()?;
                segment.destroy()?;
                evicted += 1;
            }
        }
        Ok(evicted)
    }

    /// Returns the highest sequence number stored in any live segment.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment cannot be read or holds a malformed key.
    pub fn max_seqnum(&self) -> CoreResult<Option<SequenceNumber>> {
        let mut max = None;
        for segment in self.slots.iter().flatten() {
            for entry in segment.scan()? {
                let (key, _) = entry?;
                let seq = seqnum_from_binary_key(&key)?;
                max = max.max(Some(seq));
            }
        }
        Ok(max)
    }

    /// Returns the ids of all live segments.
    #[must_use]
    pub fn segment_ids(&self) -> BTreeSet<i64> {
        self.slots.iter().flatten().map(Segment::id).collect()
    }

    /// Flushes every live segment.
    ///
    /// # Errors
    ///
    /// Returns the first flush failure.
    pub fn flush_all(&mut self) -> CoreResult<()> {
        for segment in self.slots.iter_mut().flatten() {
            segment.flush()?;
        }
        Ok(())
    }

    /// Closes every live segment and empties the ring. Data is kept.
    ///
    /// # Errors
    ///
    /// Returns the first close failure; remaining segments are still closed.
    pub fn close_all(&mut self) -> CoreResult<()> {
        let mut first_error = None;
        for slot in &mut self.slots {
            if let Some(mut segment) = slot.take() {
                if let Err(err) = segment.close() {
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Scans the root directory and reopens the segments found there.
    ///
    /// The scan is best effort: entries that are not segment directories
    /// or cannot be opened are skipped and counted. The high-water mark is
    /// raised to the newest segment found, and directories that are already
    /// outside the retention window are deleted instead of opened.
    ///
    /// # Errors
    ///
    /// Returns an error only if a missing root directory cannot be created.
    pub fn recover(&mut self) -> CoreResult<RecoveryStats> {
        let mut stats = RecoveryStats::default();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(&self.root)?;
                return Ok(stats);
            }
            Err(err) => {
                warn!(store = %self.store_name, root = %self.root.display(), error = %err, "cannot list store directory");
                return Ok(stats);
            }
        };

        let mut skipped_names = Vec::new();
        let mut ids = Vec::new();
        for entry in entries {
            let Ok(entry) = entry else {
                stats.skipped += 1;
                continue;
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            match self.namer.id_from_name(&name) {
                Some(id) if is_dir => ids.push(id),
                _ => skipped_names.push(name),
            }
        }
        ids.sort_unstable();

        if let Some(&newest) = ids.last() {
            self.advance(newest)?;
        }

        for id in ids {
            if self.is_expired(id) {
                let path = self.root.join(self.namer.name_of(id)?);
                match self.provider.destroy(&path) {
                    Ok(()) => stats.expired_removed += 1,
                    Err(err) => {
                        warn!(store = %self.store_name, segment_id = id, error = %err, "cannot remove expired segment");
                        stats.skipped += 1;
                    }
                }
                continue;
            }
            match self.resolve(id) {
                Ok(Some(_)) => stats.opened += 1,
                Ok(None) => stats.skipped += 1,
                Err(err) => {
                    warn!(store = %self.store_name, segment_id = id, error = %err, "cannot reopen segment");
                    stats.skipped += 1;
                }
            }
        }

        stats.skipped += skipped_names.len();
        if !skipped_names.is_empty() {
            warn!(
                store = %self.store_name,
                count = skipped_names.len(),
                names = ?skipped_names,
                "skipped non-segment entries during recovery"
            );
        }
        debug!(store = %self.store_name, ?stats, "recovery scan finished");
        Ok(stats)
    }

    fn capacity(&self) -> i64 {
        i64::try_from(self.slots.len()).unwrap_or(i64::MAX)
    }

    fn slot_of(&self, segment_id: i64) -> usize {
        // rem_euclid is in [0, capacity)
        segment_id.rem_euclid(self.capacity()) as usize
    }
}

impl fmt::Debug for SegmentRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentRing")
            .field("store_name", &self.store_name)
            .field("root", &self.root)
            .field("current", &self.current)
            .field("segments", &self.segment_ids())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::to_binary_key;
    use windb_storage::{FileEngineProvider, MemoryEngineProvider};

    const MINUTE: i64 = 60_000;

    fn memory_ring(num_segments: usize) -> SegmentRing {
        SegmentRing::new(
            "ring",
            "unused",
            SegmentNamer::new(MINUTE),
            num_segments,
            Arc::new(MemoryEngineProvider),
        )
    }

    fn file_ring(root: &Path, num_segments: usize) -> SegmentRing {
        SegmentRing::new(
            "ring",
            root,
            SegmentNamer::new(MINUTE),
            num_segments,
            Arc::new(FileEngineProvider),
        )
    }

    #[test]
    fn advance_evicts_outside_window() {
        let mut ring = memory_ring(3);
        for id in 0..3 {
            ring.advance(id).unwrap();
            assert!(ring.resolve(id).unwrap().is_some());
        }
        assert_eq!(ring.segment_ids(), BTreeSet::from([0, 1, 2]));

        assert_eq!(ring.advance(3).unwrap(), 1);
        assert_eq!(ring.segment_ids(), BTreeSet::from([1, 2]));
        assert!(ring.is_expired(0));
        assert!(!ring.is_expired(1));
    }

    #[test]
    fn advance_is_monotonic() {
        let mut ring = memory_ring(3);
        ring.advance(10).unwrap();
        ring.advance(4).unwrap();
        assert_eq!(ring.current_segment_id(), Some(10));
    }

    #[test]
    fn expired_ids_never_resolve() {
        let mut ring = memory_ring(3);
        ring.advance(10).unwrap();
        assert!(ring.resolve(7).unwrap().is_none());
        assert!(ring.resolve(8).unwrap().is_some());
        assert!(ring.resolve(-1).unwrap().is_none());
    }

    #[test]
    fn stale_slot_triggers_cleanup() {
        let mut ring = memory_ring(3);
        ring.resolve(0).unwrap();
        // raise the mark without evicting, as recovery of an older ring would
        ring.current = Some(3);
        assert!(ring.resolve(3).unwrap().is_some());
        assert_eq!(ring.segment_ids(), BTreeSet::from([3]));
    }

    #[test]
    fn live_conflict_is_not_handed_out() {
        let mut ring = memory_ring(3);
        assert!(ring.resolve(4).unwrap().is_some());
        // no high-water mark yet, so segment 4 is still live
        assert!(ring.resolve(1).unwrap().is_none());
        assert_eq!(ring.segment_ids(), BTreeSet::from([4]));
    }

    #[test]
    fn live_does_not_create() {
        let mut ring = memory_ring(3);
        assert!(ring.live(0).is_none());
        ring.resolve(0).unwrap();
        assert_eq!(ring.live(0).map(Segment::id), Some(0));
        assert_eq!(ring.segment_ids().len(), 1);
    }

    #[test]
    fn live_in_range_is_ordered() {
        let mut ring = memory_ring(4);
        for id in [5, 3, 4, 6] {
            ring.advance(id).unwrap();
            ring.resolve(id).unwrap();
        }
        let ids: Vec<i64> = ring.live_in_range(0, 100).iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![3, 4, 5, 6]);
        let ids: Vec<i64> = ring.live_in_range(4, 5).iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![4, 5]);
    }

    #[test]
    fn put_raw_and_get_raw() {
        let mut ring = memory_ring(3);
        let key = to_binary_key(b"k", 61_000, SequenceNumber::ZERO);
        assert!(ring.put_raw(&key, b"v").unwrap());
        assert_eq!(ring.current_segment_id(), Some(1));
        assert_eq!(ring.get_raw(&key).unwrap(), Some(b"v".to_vec()));

        let old = to_binary_key(b"k", 0, SequenceNumber::ZERO);
        ring.advance(5).unwrap();
        assert!(!ring.put_raw(&old, b"v").unwrap());
        assert_eq!(ring.get_raw(&old).unwrap(), None);
    }

    #[test]
    fn eviction_removes_directories() {
        let temp = tempfile::tempdir().unwrap();
        let mut ring = file_ring(temp.path(), 2);
        ring.advance(0).unwrap();
        ring.resolve(0).unwrap();
        let first = temp.path().join(ring.namer().name_of(0).unwrap());
        assert!(first.exists());

        ring.advance(2).unwrap();
        assert!(!first.exists());
    }

    #[test]
    fn recover_reopens_and_prunes() {
        let temp = tempfile::tempdir().unwrap();
        {
            let mut ring = file_ring(temp.path(), 3);
            for id in [0, 1, 2] {
                let key = to_binary_key(b"k", id * MINUTE, SequenceNumber::ZERO);
                ring.put_raw(&key, b"v").unwrap();
            }
            ring.close_all().unwrap();
        }
        // a directory from a later run, making segment 0 and 1 expire
        let namer = SegmentNamer::new(MINUTE);
        fs::create_dir(temp.path().join(namer.name_of(4).unwrap())).unwrap();
        fs::create_dir(temp.path().join("not-a-segment")).unwrap();
        fs::write(temp.path().join("202401010000"), b"file, not dir").unwrap();

        let mut ring = file_ring(temp.path(), 3);
        let stats = ring.recover().unwrap();

        assert_eq!(ring.current_segment_id(), Some(4));
        assert_eq!(ring.segment_ids(), BTreeSet::from([2, 4]));
        assert_eq!(
            stats,
            RecoveryStats {
                opened: 2,
                skipped: 2,
                expired_removed: 2,
            }
        );
        assert!(!temp.path().join(namer.name_of(0).unwrap()).exists());

        let key = to_binary_key(b"k", 2 * MINUTE, SequenceNumber::ZERO);
        assert_eq!(ring.get_raw(&key).unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn max_seqnum_spans_segments() {
        let mut ring = memory_ring(3);
        assert_eq!(ring.max_seqnum().unwrap(), None);

        for (ts, seq) in [(0, 4), (MINUTE, 9), (2 * MINUTE, 2)] {
            let key = to_binary_key(b"k", ts, SequenceNumber::new(seq));
            ring.put_raw(&key, b"v").unwrap();
        }
        assert_eq!(ring.max_seqnum().unwrap(), Some(SequenceNumber::new(9)));
    }

    #[test]
    fn recover_skips_off_grid_names() {
        let temp = tempfile::tempdir().unwrap();
        let namer = SegmentNamer::new(2 * MINUTE);
        fs::create_dir(temp.path().join(namer.name_of(1).unwrap())).unwrap();
        // minute 1 lies inside segment 0 but is not its name
        fs::create_dir(temp.path().join("197001010001")).unwrap();

        let mut ring = SegmentRing::new(
            "ring",
            temp.path(),
            namer,
            3,
            Arc::new(FileEngineProvider),
        );
        let stats = ring.recover().unwrap();

        assert_eq!(ring.segment_ids(), BTreeSet::from([1]));
        assert_eq!(stats.opened, 1);
        assert_eq!(stats.skipped, 1);
        assert!(temp.path().join("197001010001").is_dir());
    }

    #[test]
    fn recover_creates_missing_root() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("store");
        let mut ring = file_ring(&root, 3);
        assert_eq!(ring.recover().unwrap(), RecoveryStats::default());
        assert!(root.is_dir());
        assert_eq!(ring.current_segment_id(), None);
    }
}
