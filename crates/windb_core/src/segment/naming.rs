//! Reversible segment directory names.
//!
//! A segment is stored under a directory named after the UTC minute at
//! which it starts, formatted `yyyyMMddHHmm` (for example `202401311730`).
//! Recovery lists the store directory and parses these names back into
//! segment ids.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, NaiveDateTime, Utc};

const NAME_FORMAT: &str = "%Y%m%d%H%M";
const NAME_LEN: usize = 12;

/// Converts between segment ids and directory names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentNamer {
    interval_ms: i64,
}

impl SegmentNamer {
    /// Creates a namer for segments `interval_ms` wide.
    ///
    /// The interval must be at least one minute.
    #[must_use]
    pub const fn new(interval_ms: i64) -> Self {
        Self { interval_ms }
    }

    /// Returns the segment width in milliseconds.
    #[must_use]
    pub const fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    /// Returns the segment id covering `timestamp`.
    #[must_use]
    pub const fn segment_id(&self, timestamp: i64) -> i64 {
        timestamp.div_euclid(self.interval_ms)
    }

    /// Formats the directory name of a segment.
    ///
    /// # Errors
    ///
    /// Returns `SegmentName` if the segment's start time is outside the
    /// calendar range.
    pub fn name_of(&self, segment_id: i64) -> CoreResult<String> {
        let start_ms = segment_id
            .checked_mul(self.interval_ms)
            .ok_or(CoreError::SegmentName { id: segment_id })?;
        let start = DateTime::<Utc>::from_timestamp_millis(start_ms)
            .ok_or(CoreError::SegmentName { id: segment_id })?;
        Ok(start.format(NAME_FORMAT).to_string())
    }

    /// Parses a directory name back into a segment id.
    ///
    /// Names are minute-granular while segments need not start on a whole
    /// minute; the id is recovered by rounding up, which is exact for any
    /// interval of at least one minute. Returns `None` for anything that is
    /// not a segment name, including minute names that do not fall on the
    /// segment grid.
    #[must_use]
    pub fn id_from_name(&self, name: &str) -> Option<i64> {
        if name.len() != NAME_LEN || !name.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let minute = NaiveDateTime::parse_from_str(name, NAME_FORMAT).ok()?;
        let start_ms = minute.and_utc().timestamp_millis();
        if start_ms < 0 {
            return None;
        }
        let id = start_ms
            .checked_add(self.interval_ms - 1)?
            .checked_div(self.interval_ms)?;
        // only the canonical name of a segment maps back to it
        (self.name_of(id).ok()? == name).then_some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MINUTE: i64 = 60_000;

    #[test]
    fn epoch_is_segment_zero() {
        let namer = SegmentNamer::new(MINUTE);
        assert_eq!(namer.name_of(0).unwrap(), "197001010000");
        assert_eq!(namer.id_from_name("197001010000"), Some(0));
    }

    #[test]
    fn names_are_utc_minutes() {
        let namer = SegmentNamer::new(60 * MINUTE);
        // 2024-01-31T17:00:00Z
        let id = 1_706_720_400_000 / (60 * MINUTE);
        assert_eq!(namer.name_of(id).unwrap(), "202401311700");
    }

    #[test]
    fn unaligned_interval_round_trips() {
        let namer = SegmentNamer::new(100_000);
        for id in 0..50 {
            let name = namer.name_of(id).unwrap();
            assert_eq!(namer.id_from_name(&name), Some(id), "name {name}");
        }
    }

    #[test]
    fn rejects_non_segment_names() {
        let namer = SegmentNamer::new(MINUTE);
        assert_eq!(namer.id_from_name("LOCK"), None);
        assert_eq!(namer.id_from_name("20240131170"), None);
        assert_eq!(namer.id_from_name("2024013117000"), None);
        assert_eq!(namer.id_from_name("202413311700"), None);
        assert_eq!(namer.id_from_name("20240131x700"), None);
    }

    #[test]
    fn segment_id_floors() {
        let namer = SegmentNamer::new(MINUTE);
        assert_eq!(namer.segment_id(0), 0);
        assert_eq!(namer.segment_id(59_999), 0);
        assert_eq!(namer.segment_id(60_000), 1);
        assert_eq!(namer.segment_id(-1), -1);
    }

    #[test]
    fn huge_ids_fail_cleanly() {
        let namer = SegmentNamer::new(MINUTE);
        assert!(matches!(
            namer.name_of(i64::MAX / 2),
            Err(CoreError::SegmentName { .. })
        ));
    }

    #[test]
    fn off_grid_names_are_rejected() {
        let namer = SegmentNamer::new(2 * MINUTE);
        assert_eq!(namer.id_from_name("197001010002"), Some(1));
        assert_eq!(namer.id_from_name("197001010001"), None);

        let hourly = SegmentNamer::new(60 * MINUTE);
        assert_eq!(hourly.id_from_name("202401311700"), Some(474_089));
        assert_eq!(hourly.id_from_name("202401311730"), None);
    }

    #[test]
    fn huge_interval_does_not_overflow() {
        let namer = SegmentNamer::new(i64::MAX);
        assert_eq!(namer.id_from_name("197001010000"), Some(0));
        assert_eq!(namer.id_from_name("197001010001"), None);
        assert_eq!(namer.id_from_name("202401010000"), None);
        assert_eq!(namer.segment_id(1_706_720_400_000), 0);
    }

    proptest! {
        #[test]
        fn name_round_trip(
            interval in MINUTE..(48 * 60 * MINUTE),
            id in 0i64..1_000_000,
        ) {
            let namer = SegmentNamer::new(interval);
            prop_assume!(id.checked_mul(interval).is_some_and(|ms| ms < 253_402_300_799_000));
            let name = namer.name_of(id).unwrap();
            prop_assert_eq!(namer.id_from_name(&name), Some(id));
        }
    }
}
